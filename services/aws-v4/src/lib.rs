//! AWS SigV4 signing for s3pipe.
//!
//! - [`signature`] holds the pure building blocks: canonical request,
//!   credential scope, signing key and authorization header.
//! - [`RequestSigner`] signs an `http` request head in two phases so that
//!   the payload hash can be supplied after the head has been captured.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use s3pipe_aws_v4::{Credential, PayloadHash, RequestSigner};
//!
//! # fn main() -> s3pipe_core::Result<()> {
//! let (mut parts, _) = http::Request::get("https://examplebucket.s3.amazonaws.com/test.txt")
//!     .body(())
//!     .unwrap()
//!     .into_parts();
//!
//! let signer = RequestSigner::new("s3", "us-east-1");
//! let now = Utc.with_ymd_and_hms(2013, 5, 24, 0, 0, 0).unwrap();
//! let pending = signer.prepare(&parts, now)?;
//! let signed = pending.finalize(PayloadHash::Unsigned, &Credential::new("ak", "sk"))?;
//! signed.apply(&mut parts.headers)?;
//! # Ok(())
//! # }
//! ```

mod constants;
pub use constants::{
    AWS_ACCESS_KEY_ID, AWS_DEFAULT_REGION, AWS_QUERY_ENCODE_SET, AWS_REGION,
    AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN, AWS_URI_ENCODE_SET, UNSIGNED_PAYLOAD,
    X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};

mod credential;
pub use credential::Credential;

pub mod signature;
pub use signature::PayloadHash;

mod sign_request;
pub use sign_request::{PendingSignature, RequestSigner, SignedHeaders};

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
//! Signed requests and streaming uploads for S3 compatible stores.
//!
//! This crate re-exports the workspace crates behind features:
//!
//! - `aws`: SigV4 signing from [`s3pipe_aws_v4`].
//! - `s3`: the S3 client from [`s3pipe_s3`].
//! - `default-context`: [`default_context`], a [`Context`] that sends
//!   requests with reqwest and reads the process environment.

pub use s3pipe_core::*;

#[cfg(feature = "default-context")]
mod context;
#[cfg(feature = "default-context")]
pub use context::default_context;

#[cfg(feature = "aws")]
pub mod aws {
    pub use s3pipe_aws_v4::*;
}

#[cfg(feature = "s3")]
pub mod s3 {
    pub use s3pipe_s3::*;
}

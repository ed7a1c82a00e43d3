//! Multipart uploads.
//!
//! [`MultipartUploadSession`] holds the state of one upload and tells its
//! caller which requests to send through [`Action`]s. [`MultipartUpload`]
//! drives a session against a [`Client`](crate::Client).

mod session;
pub use session::{Action, MultipartUploadSession, SessionState};
mod upload;
pub use upload::MultipartUpload;

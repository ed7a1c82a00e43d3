//! S3 client for s3pipe.
//!
//! [`Client`] signs every request with [`s3pipe_aws_v4`] and sends it through
//! the [`HttpSend`](s3pipe_core::HttpSend) of its [`Context`](s3pipe_core::Context).
//! Beside single object calls it offers two ways to write large objects:
//!
//! - [`MultipartUpload`] writes an initiated multipart upload with a bounded
//!   number of part uploads in flight.
//! - [`Client::put_object_stream`] takes a stream of unknown length and picks
//!   between `PutObject` and a multipart upload.
//!
//! ```no_run
//! use bytes::Bytes;
//! use s3pipe_core::Context;
//! use s3pipe_s3::{Client, Config, PutObjectRequest};
//!
//! # async fn example(ctx: Context) -> s3pipe_s3::Result<()> {
//! let config = Config::default()
//!     .with_region("eu-west-1")
//!     .with_credential("access_key_id", "secret_access_key");
//! let client = Client::new(ctx, config)?;
//!
//! client
//!     .put_object("bucket", "hello.txt", Bytes::from("hello"), &PutObjectRequest::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod adaptive;
mod client;
pub use client::Client;
mod config;
pub use config::Config;
pub mod constants;
mod error;
pub use error::{Error, HttpError, Result};
mod model;
pub use model::*;
pub mod multipart;
pub use multipart::MultipartUpload;
pub mod rebuffer;
pub use rebuffer::{rebuffered, ChunkRebuffer, ChunkSink};
mod request;
pub use request::S3Request;
pub mod xml;

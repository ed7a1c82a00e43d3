//! Core components for signing and sending requests to S3 compatible stores.
//!
//! This crate provides the foundational types shared by the s3pipe crates.
//!
//! ## Overview
//!
//! - **Context**: a container holding the transport ([`HttpSend`]), the
//!   environment ([`Env`]) and the signing [`time::Clock`].
//! - **Body**: a request body that is either fully buffered or streamed
//!   while the request is in flight.
//! - **Error**: a single error type with an [`ErrorKind`] describing why
//!   signing or sending failed.
//!
//! ## Example
//!
//! ```no_run
//! use s3pipe_core::{Context, HttpSend, OsEnv, Result};
//! use async_trait::async_trait;
//! use bytes::Bytes;
//!
//! #[derive(Debug)]
//! struct MyHttpSend;
//!
//! #[async_trait]
//! impl HttpSend for MyHttpSend {
//!     async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
//!         todo!()
//!     }
//! }
//!
//! let ctx = Context::new().with_http_send(MyHttpSend).with_env(OsEnv);
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: Cryptographic hashing utilities
//! - [`time`]: Time formatting and the injectable clock
//! - [`utils`]: General utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod body;
pub use body::{Body, BodySender};
mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};
mod error;
pub use error::{Error, ErrorKind, Result};

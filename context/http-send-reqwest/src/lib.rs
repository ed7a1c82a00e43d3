//! [`HttpSend`] implementation backed by [`reqwest`].
//!
//! Both buffered and streaming request bodies are supported. Streaming
//! bodies are handed to reqwest as they are produced, so a multi-gigabyte
//! upload never sits in memory at once.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqwest::{Client, Request};
use s3pipe_core::{Body, Error, HttpSend, Result};

/// Transport sending requests through a shared [`reqwest::Client`].
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn execute(&self, req: Request) -> Result<http::Response<Bytes>> {
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::unexpected("failed to send http request").with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::unexpected("failed to read http response body").with_source(e))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::request_invalid("failed to build http request").with_source(e))?;
        self.execute(req).await
    }

    async fn http_send_body(&self, req: http::Request<Body>) -> Result<http::Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let body = match body {
            Body::Bytes(bs) => reqwest::Body::from(bs),
            Body::Stream(s) => reqwest::Body::wrap_stream(s),
        };

        let req = Request::try_from(http::Request::from_parts(parts, body))
            .map_err(|e| Error::request_invalid("failed to build http request").with_source(e))?;
        self.execute(req).await
    }
}

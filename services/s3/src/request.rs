use crate::{Error, Result};
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Request, Response, Uri};
use log::{debug, error};
use s3pipe_aws_v4::{Credential, PayloadHash, RequestSigner};
use s3pipe_core::{Body, BodySender, Context};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Chunks buffered between [`S3Request::write`] and the transport.
const STREAM_BUFFER: usize = 1;

/// One outgoing request, signed right before its payload leaves.
///
/// The head can be changed through [`S3Request::headers_mut`] until the first
/// [`write`](S3Request::write) or the [`end`](S3Request::end) signs it.
/// After that the head is frozen.
///
/// Signing fails open: if the signer returns an error, it is logged and the
/// request is sent unsigned so that the store reports the authentication
/// failure. The one exception is streaming a request whose payload must be
/// signed, which is returned to the caller and sends nothing.
pub struct S3Request {
    action: &'static str,
    head: Option<Parts>,
    ctx: Context,
    signer: RequestSigner,
    credential: Option<Credential>,
    sign_payload: bool,
    timeout: Duration,
    signed: bool,
    stream: Option<Streaming>,
}

struct Streaming {
    sender: BodySender,
    response: JoinHandle<Result<Response<Bytes>>>,
}

impl S3Request {
    /// Wrap a request head.
    ///
    /// `credential` set to `None` sends the request anonymously.
    pub fn new(
        action: &'static str,
        head: Parts,
        ctx: Context,
        signer: RequestSigner,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            action,
            head: Some(head),
            ctx,
            signer,
            credential,
            sign_payload: false,
            timeout: Duration::from_secs(10),
            signed: false,
            stream: None,
        }
    }

    /// Hash buffered payloads into the signature.
    pub fn with_sign_payload(mut self, sign_payload: bool) -> Self {
        self.sign_payload = sign_payload;
        self
    }

    /// Set the timeout for the whole exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the operation, used in errors and logs.
    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Whether the head has been signed (or the signing attempt has been made).
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Headers of the request.
    pub fn headers(&self) -> Option<&HeaderMap> {
        self.head.as_ref().map(|p| &p.headers)
    }

    /// Target of the request, `None` once it has been sent.
    pub fn uri(&self) -> Option<&Uri> {
        self.head.as_ref().map(|p| &p.uri)
    }

    /// Mutable headers, rejected once the request has been signed.
    pub fn headers_mut(&mut self) -> Result<&mut HeaderMap> {
        match (self.signed, self.head.as_mut()) {
            (false, Some(head)) => Ok(&mut head.headers),
            _ => Err(Error::Signing(s3pipe_core::Error::request_invalid(
                "headers cannot be changed after the request has been signed",
            ))),
        }
    }

    /// Stream one chunk of the payload.
    ///
    /// The first call signs the head with `UNSIGNED-PAYLOAD` and starts the
    /// transport. Every call waits until the transport has room for the chunk.
    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        if self.sign_payload {
            return Err(Error::Signing(s3pipe_core::Error::config_invalid(
                "cannot stream a request whose payload must be signed",
            )));
        }

        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.start_stream()?,
        };
        if let Err(err) = stream.sender.send(chunk).await {
            // The transport dropped the body, its own error explains why.
            return match stream.response.await {
                Ok(Err(e)) => Err(e),
                Ok(Ok(_)) | Err(_) => Err(Error::Transport(err)),
            };
        }
        self.stream = Some(stream);
        Ok(())
    }

    /// Finish the request and wait for the response.
    ///
    /// Without a prior [`write`](S3Request::write), the head is signed here
    /// with the hash of `body` if payload signing is on, and the whole body is
    /// sent at once.
    pub async fn end(mut self, body: Option<Bytes>) -> Result<Response<Bytes>> {
        let body = body.unwrap_or_default();

        if let Some(mut stream) = self.stream.take() {
            if !body.is_empty() {
                if let Err(err) = stream.sender.send(body).await {
                    return match stream.response.await {
                        Ok(Err(e)) => Err(e),
                        Ok(Ok(_)) | Err(_) => Err(Error::Transport(err)),
                    };
                }
            }
            stream.sender.close();
            return stream.response.await.map_err(|e| {
                Error::Transport(
                    s3pipe_core::Error::unexpected("request task failed").with_source(e),
                )
            })?;
        }

        let payload = if self.sign_payload {
            PayloadHash::of(&body)
        } else {
            PayloadHash::Unsigned
        };
        self.sign(payload);

        let head = self.take_head()?;
        send(
            self.ctx.clone(),
            self.action,
            self.timeout,
            Request::from_parts(head, Body::Bytes(body)),
        )
        .await
    }

    fn start_stream(&mut self) -> Result<Streaming> {
        self.sign(PayloadHash::Unsigned);

        let head = self.take_head()?;
        let (sender, body) = Body::channel(STREAM_BUFFER);
        let req = Request::from_parts(head, body);
        let response = tokio::spawn(send(self.ctx.clone(), self.action, self.timeout, req));

        Ok(Streaming { sender, response })
    }

    fn take_head(&mut self) -> Result<Parts> {
        self.head.take().ok_or_else(|| {
            Error::Transport(s3pipe_core::Error::unexpected(
                "request has already been sent",
            ))
        })
    }

    /// Sign the head at most once.
    fn sign(&mut self, payload: PayloadHash) {
        if self.signed {
            return;
        }
        self.signed = true;

        let Some(cred) = &self.credential else {
            debug!("no credential configured, sending {} anonymously", self.action);
            return;
        };
        let Some(head) = self.head.as_mut() else {
            return;
        };

        let result = self
            .signer
            .prepare(head, self.ctx.now())
            .and_then(|pending| pending.finalize(payload, cred))
            .and_then(|signed| signed.apply(&mut head.headers));
        if let Err(err) = result {
            error!(
                "failed to sign request for {}, sending it unsigned: {err}",
                self.action
            );
        }
    }
}

impl Drop for S3Request {
    /// A streamed request dropped before `end` is cancelled instead of
    /// committing a truncated body.
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("{} dropped before end, cancelling the request", self.action);
            stream.response.abort();
        }
    }
}

async fn send(
    ctx: Context,
    action: &'static str,
    timeout: Duration,
    req: Request<Body>,
) -> Result<Response<Bytes>> {
    debug!("sending {action}: {} {}", req.method(), req.uri());
    match tokio::time::timeout(timeout, ctx.http_send_body(req)).await {
        Ok(resp) => resp.map_err(Error::Transport),
        Err(_) => Err(Error::Timeout { action, timeout }),
    }
}

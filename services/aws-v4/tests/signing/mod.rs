mod special_chars;
mod standard;

use anyhow::Result;
use bytes::Bytes;
use http::{Request, StatusCode};
use log::debug;
use s3pipe_aws_v4::{Credential, PayloadHash, RequestSigner};
use s3pipe_core::Context;
use s3pipe_http_send_reqwest::ReqwestHttpSend;
use std::env;

/// Load static credential from environment variables
pub fn load_static_credential() -> Result<Credential> {
    let access_key =
        env::var("S3PIPE_AWS_V4_ACCESS_KEY").expect("S3PIPE_AWS_V4_ACCESS_KEY must be set");
    let secret_key =
        env::var("S3PIPE_AWS_V4_SECRET_KEY").expect("S3PIPE_AWS_V4_SECRET_KEY must be set");
    let session_token = env::var("S3PIPE_AWS_V4_SESSION_TOKEN").ok();

    Ok(Credential {
        access_key_id: access_key,
        secret_access_key: secret_key,
        session_token,
    })
}

/// Initialize test environment
pub fn init_signing_test() -> Option<(Context, RequestSigner, String)> {
    let _ = env_logger::builder().is_test(true).try_init();
    let _ = dotenv::dotenv();

    if env::var("S3PIPE_AWS_V4_TEST").ok().as_deref() != Some("on") {
        return None;
    }

    let region = env::var("S3PIPE_AWS_V4_REGION").expect("S3PIPE_AWS_V4_REGION must be set");
    let service = env::var("S3PIPE_AWS_V4_SERVICE").unwrap_or_else(|_| "s3".to_string());
    let url = env::var("S3PIPE_AWS_V4_URL").expect("S3PIPE_AWS_V4_URL must be set");

    let context = Context::new().with_http_send(ReqwestHttpSend::default());
    let signer = RequestSigner::new(&service, &region);

    Some((context, signer, url))
}

/// Sign the request with its payload hash and send it.
pub async fn send_signed_request(
    ctx: &Context,
    signer: &RequestSigner,
    req: Request<Bytes>,
    payload: PayloadHash,
    cred: &Credential,
) -> Result<(StatusCode, String)> {
    let (mut parts, body) = req.into_parts();
    signer
        .sign(&mut parts, payload, cred, ctx.now())
        .expect("sign request must succeed");
    let req = Request::from_parts(parts, body);

    debug!("signed request: {req:?}");

    let resp = ctx.http_send(req).await?;
    let status = resp.status();
    let body = String::from_utf8_lossy(resp.body()).to_string();

    debug!("response status: {status}, body: {body}");
    Ok((status, body))
}

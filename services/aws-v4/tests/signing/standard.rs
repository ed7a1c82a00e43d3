use super::{init_signing_test, load_static_credential, send_signed_request};
use anyhow::Result;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{Method, Request, StatusCode};
use log::warn;
use pretty_assertions::assert_eq;
use s3pipe_aws_v4::signature::{
    authorization_header, signature, signing_key, string_to_sign, CanonicalHeaders,
    CanonicalRequest, CredentialScope,
};
use s3pipe_aws_v4::{Credential, PayloadHash, RequestSigner};
use std::str::FromStr;

/// The signer must agree with the engine functions composed by hand.
#[test]
fn test_signer_matches_engine() -> Result<()> {
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let cred = Credential::new("access_key_id", "secret_access_key");
    let body = b"Hello, World!";

    let (mut parts, _) = Request::put("https://bucket.s3.amazonaws.com/dir/hello.txt?tagging")
        .header("Content-Type", "text/plain")
        .body(())?
        .into_parts();
    RequestSigner::new("s3", "eu-central-1").sign(&mut parts, PayloadHash::of(body), &cred, now)?;

    let scope = CredentialScope::new(now, "eu-central-1", "s3")?;
    let payload = PayloadHash::of(body);
    let headers = CanonicalHeaders::from_pairs([
        ("content-type", "text/plain"),
        ("host", "bucket.s3.amazonaws.com"),
        ("x-amz-content-sha256", payload.as_str()),
        ("x-amz-date", "20240102T030405Z"),
    ]);
    let creq = CanonicalRequest::new("PUT", "/dir/hello.txt", Some("tagging"), headers, payload);
    let sts = string_to_sign(now, &scope, &creq)?;
    let sig = signature(&signing_key("secret_access_key", &scope), &sts);
    let expected = authorization_header("access_key_id", &scope, &creq.signed_headers(), &sig);

    assert_eq!(parts.headers["authorization"].to_str()?, expected);
    Ok(())
}

#[tokio::test]
async fn test_head_object() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("S3PIPE_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential()?;

    let mut req = Request::new(Bytes::new());
    *req.method_mut() = Method::HEAD;
    *req.uri_mut() = http::Uri::from_str(&format!("{}/{}", url, "not_exist_file"))?;

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, PayloadHash::Unsigned, &cred).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object_with_signed_payload() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("S3PIPE_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential()?;
    let body = Bytes::from_static(b"Hello, World!");

    let mut req = Request::new(body.clone());
    *req.method_mut() = Method::PUT;
    *req.uri_mut() = http::Uri::from_str(&format!("{}/{}", url, "put_object_test"))?;

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, PayloadHash::of(&body), &cred).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_list_bucket() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("S3PIPE_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential()?;

    let mut req = Request::new(Bytes::new());
    *req.method_mut() = Method::GET;
    *req.uri_mut() =
        http::Uri::from_str(&format!("{url}?list-type=2&delimiter=/&encoding-type=url"))?;

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, PayloadHash::Unsigned, &cred).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

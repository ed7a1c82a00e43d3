use super::{init_signing_test, load_static_credential, send_signed_request};
use anyhow::Result;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{Method, Request, StatusCode};
use log::warn;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use pretty_assertions::assert_eq;
use s3pipe_aws_v4::{Credential, PayloadHash, RequestSigner};
use std::str::FromStr;

const SPECIAL_NAME: &str = "!@#$%^&*()_+-=;:'><,/?.txt";

/// Paths that are already encoded must not be encoded a second time.
#[test]
fn test_encoded_and_plain_path_sign_the_same() -> Result<()> {
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let cred = Credential::new("access_key_id", "secret_access_key");
    let signer = RequestSigner::new("s3", "us-east-1");

    let sign = |uri: &str| -> Result<String> {
        let (mut parts, _) = Request::head(uri).body(())?.into_parts();
        signer.sign(&mut parts, PayloadHash::Unsigned, &cred, now)?;
        Ok(parts.headers["authorization"].to_str()?.to_string())
    };

    assert_eq!(
        sign("https://bucket.s3.amazonaws.com/a%3Ab/c%20d.txt")?,
        sign("https://bucket.s3.amazonaws.com/a:b/c%20d.txt")?
    );
    Ok(())
}

#[tokio::test]
async fn test_head_object_with_special_characters() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("S3PIPE_AWS_V4_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential()?;

    let mut req = Request::new(Bytes::new());
    *req.method_mut() = Method::HEAD;
    *req.uri_mut() = http::Uri::from_str(&format!(
        "{}/{}",
        url,
        utf8_percent_encode(SPECIAL_NAME, NON_ALPHANUMERIC)
    ))?;

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, PayloadHash::Unsigned, &cred).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

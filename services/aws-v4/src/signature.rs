//! Pure building blocks of [Signature Version 4](https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_aws-signing.html).
//!
//! Nothing in this module performs I/O or keeps state between calls, so every
//! function can be checked against fixed vectors.

use crate::constants::{
    AWS4_HMAC_SHA256, AWS4_REQUEST, AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, UNSIGNED_PAYLOAD,
};
use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use s3pipe_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use s3pipe_core::time::{format_date, format_iso8601, DateTime};
use s3pipe_core::{Error, Result};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Write};

/// Hash of the request payload as it appears in the canonical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadHash {
    /// The body is not hashed, rendered as `UNSIGNED-PAYLOAD`.
    Unsigned,
    /// Hex encoded SHA256 of the whole body.
    Signed(String),
}

impl PayloadHash {
    /// Hash the given payload.
    pub fn of(payload: &[u8]) -> Self {
        PayloadHash::Signed(hash_payload(payload))
    }

    /// The value placed into the canonical request and `x-amz-content-sha256`.
    pub fn as_str(&self) -> &str {
        match self {
            PayloadHash::Unsigned => UNSIGNED_PAYLOAD,
            PayloadHash::Signed(v) => v,
        }
    }
}

impl Display for PayloadHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex encoded SHA256 of the payload.
pub fn hash_payload(payload: &[u8]) -> String {
    hex_sha256(payload)
}

/// Canonicalize a request path.
///
/// The path is decoded first so that already encoded input is not encoded twice,
/// then every byte except the unreserved set and `/` is percent encoded.
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let decoded = percent_decode_str(path).decode_utf8_lossy();
    utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string()
}

/// Canonicalize a raw query string.
///
/// Parameters are split on `&` and the first `=`, trimmed, decoded and encoded
/// again, then sorted by key. The sort is stable: values of a repeated key keep
/// the order they had in the input.
pub fn canonical_query_string(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };

    let mut params: Vec<(String, String)> = raw
        .split('&')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (query_escape(k.trim()), query_escape(v.trim()))
        })
        .collect();
    params.sort_by(|l, r| l.0.cmp(&r.0));

    let mut f = String::with_capacity(raw.len());
    for (idx, (k, v)) in params.iter().enumerate() {
        if idx > 0 {
            f.push('&');
        }
        f.push_str(k);
        f.push('=');
        f.push_str(v);
    }
    f
}

fn query_escape(s: &str) -> String {
    let decoded = percent_decode_str(s).decode_utf8_lossy();
    utf8_percent_encode(&decoded, &AWS_QUERY_ENCODE_SET).to_string()
}

/// Headers folded into their canonical form.
///
/// Names are lower-cased and sorted, values are trimmed with inner runs of
/// spaces collapsed, and repeated headers keep all values in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalHeaders(BTreeMap<String, Vec<String>>);

impl CanonicalHeaders {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every header of a [`HeaderMap`].
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let mut v = Self::new();
        for (name, value) in headers {
            v.append(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
        }
        v
    }

    /// Fold `(name, value)` pairs. Names may differ only in case.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut v = Self::new();
        for (name, value) in pairs {
            v.append(name, value);
        }
        v
    }

    /// Add one more value for `name`.
    pub fn append(&mut self, name: &str, value: &str) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(normalize_value(value));
    }

    /// Replace all values of `name` with `value`.
    pub fn set(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.to_ascii_lowercase(), vec![normalize_value(value)]);
    }

    /// Check whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    /// Folded value of `name`, with multiple values joined by `,`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(&name.to_ascii_lowercase()).map(|v| v.join(","))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No header present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted header names joined by `;`.
    pub fn signed_headers(&self) -> String {
        self.0.keys().map(String::as_str).collect::<Vec<_>>().join(";")
    }
}

impl Display for CanonicalHeaders {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, values) in &self.0 {
            writeln!(f, "{}:{}", name, values.join(","))?;
        }
        Ok(())
    }
}

fn normalize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_is_space = false;
    for c in value.trim().chars() {
        if c == ' ' {
            if !last_is_space {
                out.push(c);
            }
            last_is_space = true;
        } else {
            out.push(c);
            last_is_space = false;
        }
    }
    out
}

/// The canonical form of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    uri: String,
    query: String,
    headers: CanonicalHeaders,
    payload_hash: PayloadHash,
}

impl CanonicalRequest {
    /// Build a canonical request from raw, not yet canonicalized parts.
    pub fn new(
        method: &str,
        path: &str,
        raw_query: Option<&str>,
        headers: CanonicalHeaders,
        payload_hash: PayloadHash,
    ) -> Self {
        Self {
            method: method.to_string(),
            uri: canonical_uri(path),
            query: canonical_query_string(raw_query),
            headers,
            payload_hash,
        }
    }

    /// Folded headers taking part in the signature.
    pub fn headers(&self) -> &CanonicalHeaders {
        &self.headers
    }

    /// Sorted header names joined by `;`.
    pub fn signed_headers(&self) -> String {
        self.headers.signed_headers()
    }

    /// Hex encoded SHA256 of the canonical request.
    pub fn hash(&self) -> String {
        hex_sha256(self.to_string().as_bytes())
    }
}

impl Display for CanonicalRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.uri)?;
        writeln!(f, "{}", self.query)?;
        writeln!(f, "{}", self.headers)?;
        writeln!(f, "{}", self.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

/// Build the canonical request string in one call.
pub fn canonical_request(
    method: &str,
    path: &str,
    raw_query: Option<&str>,
    headers: &HeaderMap,
    payload_hash: &PayloadHash,
) -> String {
    CanonicalRequest::new(
        method,
        path,
        raw_query,
        CanonicalHeaders::from_header_map(headers),
        payload_hash.clone(),
    )
    .to_string()
}

/// `date/region/service/aws4_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    date: String,
    region: String,
    service: String,
}

impl CredentialScope {
    /// Build the scope for the given signing time.
    ///
    /// Region and service must not be blank.
    pub fn new(time: DateTime, region: &str, service: &str) -> Result<Self> {
        if region.trim().is_empty() {
            return Err(Error::config_invalid(
                "region must be set to build a credential scope",
            ));
        }
        if service.trim().is_empty() {
            return Err(Error::config_invalid(
                "service must be set to build a credential scope",
            ));
        }

        Ok(Self {
            date: format_date(time),
            region: region.to_string(),
            service: service.to_string(),
        })
    }

    /// Date part, formatted as `YYYYMMDD`.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Region part.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service part.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Display for CredentialScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.date, self.region, self.service, AWS4_REQUEST
        )
    }
}

/// Derive the signing key for a scope.
///
/// `HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")`
pub fn signing_key(secret: &str, scope: &CredentialScope) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), scope.date.as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), scope.region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), scope.service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), AWS4_REQUEST.as_bytes())
}

/// Build the string to sign.
///
/// ```text
/// AWS4-HMAC-SHA256
/// 20220313T072004Z
/// 20220313/<region>/<service>/aws4_request
/// <hashed_canonical_request>
/// ```
///
/// Fails if the canonical request carries no `host` header.
pub fn string_to_sign(
    time: DateTime,
    scope: &CredentialScope,
    creq: &CanonicalRequest,
) -> Result<String> {
    if !creq.headers().contains("host") {
        return Err(Error::request_invalid(
            "headers must include the host header",
        ));
    }

    let mut f = String::with_capacity(128);
    writeln!(f, "{AWS4_HMAC_SHA256}")?;
    writeln!(f, "{}", format_iso8601(time))?;
    writeln!(f, "{scope}")?;
    write!(f, "{}", creq.hash())?;
    Ok(f)
}

/// Hex encoded signature of the string to sign.
pub fn signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex_hmac_sha256(signing_key, string_to_sign.as_bytes())
}

/// Value of the `Authorization` header.
pub fn authorization_header(
    access_key_id: &str,
    scope: &CredentialScope,
    signed_headers: &str,
    signature: &str,
) -> String {
    format!(
        "{AWS4_HMAC_SHA256} Credential={access_key_id}/{scope}, SignedHeaders={signed_headers}, Signature={signature}"
    )
}

//! XML documents exchanged with the store.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Body of a failed request.
#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub resource: String,
    pub request_id: String,
    pub host_id: String,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct InitiateMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Request body of `CompleteMultipartUpload`.
#[derive(Default, Debug, Clone, Serialize)]
#[serde(rename = "CompleteMultipartUpload", rename_all = "PascalCase")]
pub struct CompleteMultipartUpload {
    pub part: Vec<CompletePart>,
}

#[derive(Default, Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CompletePart {
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct CompleteMultipartUploadResult {
    pub location: String,
    pub bucket: String,
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct CopyObjectResult {
    #[serde(rename = "ETag")]
    pub etag: String,
    pub last_modified: String,
}

/// Result of `ListObjectsV2`.
#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: String,
    pub key_count: u64,
    pub max_keys: u64,
    pub is_truncated: bool,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    pub continuation_token: Option<String>,
    pub next_continuation_token: Option<String>,
    pub start_after: Option<String>,
    pub contents: Vec<Contents>,
    pub common_prefixes: Vec<CommonPrefix>,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct Contents {
    pub key: String,
    pub last_modified: String,
    #[serde(rename = "ETag")]
    pub etag: String,
    pub size: u64,
    pub storage_class: Option<String>,
    pub owner: Option<Owner>,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    pub display_name: String,
}

#[derive(Default, Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "PascalCase")]
pub struct CommonPrefix {
    pub prefix: String,
}

pub(crate) fn from_bytes<T: serde::de::DeserializeOwned>(bs: &Bytes) -> Result<T> {
    let s = std::str::from_utf8(bs).map_err(|e| {
        Error::Transport(
            s3pipe_core::Error::unexpected("response body is not valid utf-8").with_source(e),
        )
    })?;
    Ok(quick_xml::de::from_str(s)?)
}

pub(crate) fn to_string<T: Serialize>(v: &T) -> Result<String> {
    Ok(quick_xml::se::to_string(v)?)
}

/// Decode an error document, if the body is one.
///
/// A `200 OK` from `CompleteMultipartUpload` may still carry an `<Error>`
/// document, so success bodies are checked too.
pub(crate) fn parse_error(bs: &Bytes) -> Option<ErrorResponse> {
    let s = std::str::from_utf8(bs).ok()?;
    if !s.contains("<Error") {
        return None;
    }
    quick_xml::de::from_str::<ErrorResponse>(s)
        .ok()
        .filter(|e| !e.code.is_empty())
}

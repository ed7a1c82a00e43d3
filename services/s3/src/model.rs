//! Request options and response headers of the supported operations.

use crate::constants::*;
use bytes::Bytes;
use http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES,
    IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_UNMODIFIED_SINCE, LAST_MODIFIED, RANGE,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Canned ACLs accepted in `x-amz-acl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannedAcl {
    Private,
    PublicRead,
    PublicReadWrite,
    AwsExecRead,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
    LogDeliveryWrite,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AwsExecRead => "aws-exec-read",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
            CannedAcl::LogDeliveryWrite => "log-delivery-write",
        }
    }
}

impl Display for CannedAcl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Standard,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    ReducedRedundancy,
    Glacier,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

/// Whether a copy keeps the source's metadata or tags, or replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Copy,
    Replace,
}

impl Directive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Directive::Copy => "COPY",
            Directive::Replace => "REPLACE",
        }
    }
}

/// Grants sent next to, or instead of, a canned ACL.
#[derive(Debug, Clone, Default)]
pub struct AclHeaders {
    pub acl: Option<CannedAcl>,
    pub grant_read: Option<String>,
    pub grant_write: Option<String>,
    pub grant_read_acp: Option<String>,
    pub grant_write_acp: Option<String>,
    pub grant_full_control: Option<String>,
}

impl AclHeaders {
    fn write_to(&self, w: &mut HeaderWriter<'_>) -> crate::Result<()> {
        w.opt(X_AMZ_ACL, self.acl.as_ref().map(CannedAcl::as_str))?;
        w.opt(X_AMZ_GRANT_READ, self.grant_read.as_deref())?;
        w.opt(X_AMZ_GRANT_WRITE, self.grant_write.as_deref())?;
        w.opt(X_AMZ_GRANT_READ_ACP, self.grant_read_acp.as_deref())?;
        w.opt(X_AMZ_GRANT_WRITE_ACP, self.grant_write_acp.as_deref())?;
        w.opt(X_AMZ_GRANT_FULL_CONTROL, self.grant_full_control.as_deref())
    }
}

/// Standard headers describing the stored object.
#[derive(Debug, Clone, Default)]
pub struct ObjectHeaders {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_type: Option<String>,
    pub expires: Option<String>,
    pub storage_class: Option<StorageClass>,
    pub website_redirect_location: Option<String>,
    /// User metadata, sent as `x-amz-meta-{name}`.
    pub meta: BTreeMap<String, String>,
}

impl ObjectHeaders {
    fn write_to(&self, w: &mut HeaderWriter<'_>) -> crate::Result<()> {
        w.opt(CACHE_CONTROL.as_str(), self.cache_control.as_deref())?;
        w.opt(CONTENT_DISPOSITION.as_str(), self.content_disposition.as_deref())?;
        w.opt(CONTENT_ENCODING.as_str(), self.content_encoding.as_deref())?;
        w.opt(CONTENT_TYPE.as_str(), self.content_type.as_deref())?;
        w.opt(EXPIRES.as_str(), self.expires.as_deref())?;
        w.opt(
            X_AMZ_STORAGE_CLASS,
            self.storage_class.as_ref().map(StorageClass::as_str),
        )?;
        w.opt(
            X_AMZ_WEBSITE_REDIRECT_LOCATION,
            self.website_redirect_location.as_deref(),
        )?;
        for (k, v) in &self.meta {
            w.opt(&format!("{X_AMZ_META_PREFIX}{}", k.to_lowercase()), Some(v.as_str()))?;
        }
        Ok(())
    }
}

/// Options of `PutObject`.
#[derive(Debug, Clone, Default)]
pub struct PutObjectRequest {
    pub object: ObjectHeaders,
    pub acl: AclHeaders,
    pub content_md5: Option<String>,
    pub tagging: Option<String>,
}

impl PutObjectRequest {
    pub(crate) fn write_headers(&self, headers: &mut HeaderMap) -> crate::Result<()> {
        let mut w = HeaderWriter(headers);
        self.object.write_to(&mut w)?;
        self.acl.write_to(&mut w)?;
        w.opt("content-md5", self.content_md5.as_deref())?;
        w.opt(X_AMZ_TAGGING, self.tagging.as_deref())
    }
}

/// Conditional and range headers shared by `GetObject` and `HeadObject`.
#[derive(Debug, Clone, Default)]
pub struct ReadConditions {
    pub range: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
}

impl ReadConditions {
    pub(crate) fn write_headers(&self, headers: &mut HeaderMap) -> crate::Result<()> {
        let mut w = HeaderWriter(headers);
        w.opt(RANGE.as_str(), self.range.as_deref())?;
        w.opt(IF_MATCH.as_str(), self.if_match.as_deref())?;
        w.opt(IF_NONE_MATCH.as_str(), self.if_none_match.as_deref())?;
        w.opt(IF_MODIFIED_SINCE.as_str(), self.if_modified_since.as_deref())?;
        w.opt(IF_UNMODIFIED_SINCE.as_str(), self.if_unmodified_since.as_deref())
    }
}

/// Options of `GetObject`.
#[derive(Debug, Clone, Default)]
pub struct GetObjectRequest {
    pub conditions: ReadConditions,
    pub response_cache_control: Option<String>,
    pub response_content_disposition: Option<String>,
    pub response_content_encoding: Option<String>,
    pub response_content_language: Option<String>,
    pub response_content_type: Option<String>,
    pub response_expires: Option<String>,
}

impl GetObjectRequest {
    pub(crate) fn query(&self) -> BTreeMap<&'static str, String> {
        let mut q = BTreeMap::new();
        let pairs = [
            ("response-cache-control", &self.response_cache_control),
            ("response-content-disposition", &self.response_content_disposition),
            ("response-content-encoding", &self.response_content_encoding),
            ("response-content-language", &self.response_content_language),
            ("response-content-type", &self.response_content_type),
            ("response-expires", &self.response_expires),
        ];
        for (k, v) in pairs {
            if let Some(v) = trimmed(v.as_deref()) {
                q.insert(k, v.to_string());
            }
        }
        q
    }
}

/// Options of `HeadObject`.
pub type HeadObjectRequest = ReadConditions;

/// Options of `DeleteObject`.
#[derive(Debug, Clone, Default)]
pub struct DeleteObjectRequest {
    pub mfa: Option<String>,
}

impl DeleteObjectRequest {
    pub(crate) fn write_headers(&self, headers: &mut HeaderMap) -> crate::Result<()> {
        HeaderWriter(headers).opt(X_AMZ_MFA, self.mfa.as_deref())
    }
}

/// Options of `CopyObject`.
#[derive(Debug, Clone, Default)]
pub struct CopyObjectRequest {
    pub copy_source_if_match: Option<String>,
    pub copy_source_if_none_match: Option<String>,
    pub copy_source_if_modified_since: Option<String>,
    pub copy_source_if_unmodified_since: Option<String>,
    pub metadata_directive: Option<Directive>,
    pub tagging_directive: Option<Directive>,
    pub storage_class: Option<StorageClass>,
    pub website_redirect_location: Option<String>,
    pub acl: AclHeaders,
}

impl CopyObjectRequest {
    pub(crate) fn write_headers(&self, headers: &mut HeaderMap) -> crate::Result<()> {
        let mut w = HeaderWriter(headers);
        w.opt(X_AMZ_COPY_SOURCE_IF_MATCH, self.copy_source_if_match.as_deref())?;
        w.opt(
            X_AMZ_COPY_SOURCE_IF_NONE_MATCH,
            self.copy_source_if_none_match.as_deref(),
        )?;
        w.opt(
            X_AMZ_COPY_SOURCE_IF_MODIFIED_SINCE,
            self.copy_source_if_modified_since.as_deref(),
        )?;
        w.opt(
            X_AMZ_COPY_SOURCE_IF_UNMODIFIED_SINCE,
            self.copy_source_if_unmodified_since.as_deref(),
        )?;
        w.opt(
            X_AMZ_METADATA_DIRECTIVE,
            self.metadata_directive.as_ref().map(Directive::as_str),
        )?;
        w.opt(
            X_AMZ_TAGGING_DIRECTIVE,
            self.tagging_directive.as_ref().map(Directive::as_str),
        )?;
        w.opt(
            X_AMZ_STORAGE_CLASS,
            self.storage_class.as_ref().map(StorageClass::as_str),
        )?;
        w.opt(
            X_AMZ_WEBSITE_REDIRECT_LOCATION,
            self.website_redirect_location.as_deref(),
        )?;
        self.acl.write_to(&mut w)
    }
}

/// Options of `ListObjectsV2`.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsRequest {
    pub continuation_token: Option<String>,
    pub delimiter: Option<String>,
    pub encoding_type: Option<String>,
    pub fetch_owner: Option<bool>,
    pub max_keys: Option<u32>,
    pub prefix: Option<String>,
    pub start_after: Option<String>,
}

impl ListObjectsRequest {
    pub(crate) fn query(&self) -> BTreeMap<&'static str, String> {
        let mut q = BTreeMap::from([("list-type", "2".to_string())]);
        let pairs = [
            ("continuation-token", &self.continuation_token),
            ("delimiter", &self.delimiter),
            ("encoding-type", &self.encoding_type),
            ("prefix", &self.prefix),
            ("start-after", &self.start_after),
        ];
        for (k, v) in pairs {
            if let Some(v) = trimmed(v.as_deref()) {
                q.insert(k, v.to_string());
            }
        }
        if let Some(v) = self.fetch_owner {
            q.insert("fetch-owner", v.to_string());
        }
        if let Some(v) = self.max_keys {
            q.insert("max-keys", v.to_string());
        }
        q
    }
}

/// Options of `CreateMultipartUpload`.
#[derive(Debug, Clone, Default)]
pub struct InitMultipartUploadRequest {
    pub object: ObjectHeaders,
    pub acl: AclHeaders,
    pub tagging: Option<String>,
}

impl InitMultipartUploadRequest {
    pub(crate) fn write_headers(&self, headers: &mut HeaderMap) -> crate::Result<()> {
        let mut w = HeaderWriter(headers);
        self.object.write_to(&mut w)?;
        self.acl.write_to(&mut w)?;
        w.opt(X_AMZ_TAGGING, self.tagging.as_deref())
    }
}

/// Options of [`Client::put_object_stream`](crate::Client::put_object_stream).
#[derive(Debug, Clone, Default)]
pub struct AdaptiveUploadRequest {
    pub object: ObjectHeaders,
    pub acl: AclHeaders,
    pub tagging: Option<String>,
    /// Overrides the configured multipart buffer size. Raised to the store minimum.
    pub buffer_size: Option<usize>,
    /// Overrides the configured number of part uploads in flight.
    pub write_queue_max_size: Option<usize>,
}

impl AdaptiveUploadRequest {
    pub(crate) fn to_put_object(&self) -> PutObjectRequest {
        PutObjectRequest {
            object: self.object.clone(),
            acl: self.acl.clone(),
            content_md5: None,
            tagging: self.tagging.clone(),
        }
    }

    pub(crate) fn to_init_multipart(&self) -> InitMultipartUploadRequest {
        InitMultipartUploadRequest {
            object: self.object.clone(),
            acl: self.acl.clone(),
            tagging: self.tagging.clone(),
        }
    }
}

/// Headers every response may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonResponseHeaders {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub date: Option<String>,
    pub server: Option<String>,
    pub request_id: Option<String>,
    pub id_2: Option<String>,
    pub version_id: Option<String>,
    pub delete_marker: Option<bool>,
    pub server_side_encryption: Option<String>,
}

impl CommonResponseHeaders {
    pub(crate) fn from_header_map(headers: &HeaderMap) -> Self {
        Self {
            content_length: header_str(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()),
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
            etag: header_string(headers, ETAG),
            date: header_string(headers, http::header::DATE.as_str()),
            server: header_string(headers, http::header::SERVER.as_str()),
            request_id: header_string(headers, X_AMZ_REQUEST_ID),
            id_2: header_string(headers, X_AMZ_ID_2),
            version_id: header_string(headers, X_AMZ_VERSION_ID),
            delete_marker: header_str(headers, X_AMZ_DELETE_MARKER).and_then(|v| v.parse().ok()),
            server_side_encryption: header_string(headers, X_AMZ_SERVER_SIDE_ENCRYPTION),
        }
    }
}

/// Headers returned by `PutObject`.
pub type PutObjectResponseHeaders = CommonResponseHeaders;

/// Headers describing a stored object, returned by `GetObject` and `HeadObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectResponseHeaders {
    pub common: CommonResponseHeaders,
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub expires: Option<String>,
    pub expiration: Option<String>,
    pub storage_class: Option<String>,
    pub website_redirect_location: Option<String>,
    /// User metadata with the `x-amz-meta-` prefix removed.
    pub meta: BTreeMap<String, String>,
}

impl ObjectResponseHeaders {
    pub(crate) fn from_header_map(headers: &HeaderMap) -> Self {
        let meta = headers
            .iter()
            .filter_map(|(k, v)| {
                let name = k.as_str().strip_prefix(X_AMZ_META_PREFIX)?;
                Some((name.to_string(), v.to_str().ok()?.to_string()))
            })
            .collect();

        Self {
            common: CommonResponseHeaders::from_header_map(headers),
            last_modified: header_string(headers, LAST_MODIFIED.as_str()),
            cache_control: header_string(headers, CACHE_CONTROL.as_str()),
            content_disposition: header_string(headers, CONTENT_DISPOSITION.as_str()),
            content_encoding: header_string(headers, CONTENT_ENCODING.as_str()),
            expires: header_string(headers, EXPIRES.as_str()),
            expiration: header_string(headers, X_AMZ_EXPIRATION),
            storage_class: header_string(headers, X_AMZ_STORAGE_CLASS),
            website_redirect_location: header_string(headers, X_AMZ_WEBSITE_REDIRECT_LOCATION),
            meta,
        }
    }
}

/// Headers returned by `CopyObject`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyObjectResponseHeaders {
    pub common: CommonResponseHeaders,
    pub expiration: Option<String>,
    pub copy_source_version_id: Option<String>,
}

impl CopyObjectResponseHeaders {
    pub(crate) fn from_header_map(headers: &HeaderMap) -> Self {
        Self {
            common: CommonResponseHeaders::from_header_map(headers),
            expiration: header_string(headers, X_AMZ_EXPIRATION),
            copy_source_version_id: header_string(headers, X_AMZ_COPY_SOURCE_VERSION_ID),
        }
    }
}

/// Headers returned by `CreateMultipartUpload`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitMultipartUploadResponseHeaders {
    pub common: CommonResponseHeaders,
    pub abort_date: Option<String>,
    pub abort_rule_id: Option<String>,
}

impl InitMultipartUploadResponseHeaders {
    pub(crate) fn from_header_map(headers: &HeaderMap) -> Self {
        Self {
            common: CommonResponseHeaders::from_header_map(headers),
            abort_date: header_string(headers, X_AMZ_ABORT_DATE),
            abort_rule_id: header_string(headers, X_AMZ_ABORT_RULE_ID),
        }
    }
}

/// Result and headers of `CreateMultipartUpload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMultipartUploadResponse {
    pub headers: InitMultipartUploadResponseHeaders,
    pub result: crate::xml::InitiateMultipartUploadResult,
}

/// Result and headers of `CopyObject`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectResponse {
    pub headers: CopyObjectResponseHeaders,
    pub result: crate::xml::CopyObjectResult,
}

/// Body and headers of `GetObject`.
#[derive(Debug, Clone)]
pub struct GetObjectResponse {
    pub headers: ObjectResponseHeaders,
    pub body: Bytes,
}

/// Which path an adaptive upload took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdaptiveUploadResponse {
    /// The stream fit into one part and was sent with `PutObject`.
    Single(CommonResponseHeaders),
    /// The stream was sent as a multipart upload.
    Multipart(crate::xml::CompleteMultipartUploadResult),
}

/// Appends trimmed, non-empty values.
struct HeaderWriter<'a>(&'a mut HeaderMap);

impl HeaderWriter<'_> {
    fn opt(&mut self, name: &str, value: Option<&str>) -> crate::Result<()> {
        let Some(value) = trimmed(value) else {
            return Ok(());
        };
        let name =
            HeaderName::try_from(name).map_err(|e| crate::Error::Config(e.into()))?;
        let value =
            HeaderValue::try_from(value).map_err(|e| crate::Error::Config(e.into()))?;
        self.0.append(name, value);
        Ok(())
    }
}

fn trimmed(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    header_str(headers, name).map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_put_object_headers() {
        let req = PutObjectRequest {
            object: ObjectHeaders {
                content_type: Some(" text/plain ".to_string()),
                cache_control: Some("".to_string()),
                storage_class: Some(StorageClass::ReducedRedundancy),
                meta: BTreeMap::from([("Owner".to_string(), "alice".to_string())]),
                ..Default::default()
            },
            acl: AclHeaders {
                acl: Some(CannedAcl::BucketOwnerFullControl),
                ..Default::default()
            },
            tagging: Some("k=v".to_string()),
            ..Default::default()
        };

        let mut headers = HeaderMap::new();
        req.write_headers(&mut headers).unwrap();

        assert_eq!(headers["content-type"], "text/plain");
        assert!(headers.get("cache-control").is_none());
        assert_eq!(headers[X_AMZ_STORAGE_CLASS], "REDUCED_REDUNDANCY");
        assert_eq!(headers["x-amz-meta-owner"], "alice");
        assert_eq!(headers[X_AMZ_ACL], "bucket-owner-full-control");
        assert_eq!(headers[X_AMZ_TAGGING], "k=v");
    }

    #[test]
    fn test_list_objects_query() {
        let q = ListObjectsRequest {
            prefix: Some("photos/".to_string()),
            max_keys: Some(100),
            delimiter: Some(" ".to_string()),
            ..Default::default()
        }
        .query();

        assert_eq!(
            q.into_iter().collect::<Vec<_>>(),
            vec![
                ("list-type", "2".to_string()),
                ("max-keys", "100".to_string()),
                ("prefix", "photos/".to_string()),
            ]
        );
    }

    #[test]
    fn test_object_response_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_static("\"abc\""));
        headers.insert("content-length", HeaderValue::from_static("11"));
        headers.insert("x-amz-meta-owner", HeaderValue::from_static("alice"));
        headers.insert("x-amz-request-id", HeaderValue::from_static("318BC8BC148832E5"));
        headers.insert("x-amz-delete-marker", HeaderValue::from_static("true"));

        let out = ObjectResponseHeaders::from_header_map(&headers);

        assert_eq!(out.common.etag.as_deref(), Some("\"abc\""));
        assert_eq!(out.common.content_length, Some(11));
        assert_eq!(out.common.request_id.as_deref(), Some("318BC8BC148832E5"));
        assert_eq!(out.common.delete_marker, Some(true));
        assert_eq!(out.meta.get("owner").map(String::as_str), Some("alice"));
    }

    #[test]
    fn test_canned_acl_strings() {
        let all = [
            CannedAcl::Private,
            CannedAcl::PublicRead,
            CannedAcl::PublicReadWrite,
            CannedAcl::AwsExecRead,
            CannedAcl::AuthenticatedRead,
            CannedAcl::BucketOwnerRead,
            CannedAcl::BucketOwnerFullControl,
            CannedAcl::LogDeliveryWrite,
        ];
        let strings: Vec<_> = all.iter().map(ToString::to_string).collect();

        assert_eq!(
            strings,
            vec![
                "private",
                "public-read",
                "public-read-write",
                "aws-exec-read",
                "authenticated-read",
                "bucket-owner-read",
                "bucket-owner-full-control",
                "log-delivery-write",
            ]
        );
    }
}

use crate::constants::*;
use crate::model::*;
use crate::multipart::MultipartUpload;
use crate::xml::{
    self, CompleteMultipartUpload, CompleteMultipartUploadResult, CompletePart,
    InitiateMultipartUploadResult, ListBucketResult,
};
use crate::{Config, Error, HttpError, Result, S3Request};
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderValue, Method, Request, Response};
use log::{debug, warn};
use percent_encoding::utf8_percent_encode;
use s3pipe_aws_v4::{Credential, RequestSigner};
use s3pipe_core::Context;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Client for an S3 compatible store.
///
/// Cloning is cheap, every clone shares the same context and config.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    ctx: Context,
    config: Config,
    signer: RequestSigner,
    credential: Option<Credential>,
    hostname: String,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("hostname", &self.inner.hostname)
            .finish()
    }
}

impl Client {
    /// Create a client, validating `config`.
    pub fn new(ctx: Context, config: Config) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let hostname = config.hostname().map_err(Error::Config)?;
        let region = config.region().map_err(Error::Config)?;
        let signer = RequestSigner::new(&config.service, region);
        let credential = config.credential();
        if credential.is_none() {
            debug!("no credential configured, requests to {hostname} will be anonymous");
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                ctx,
                signer,
                credential,
                hostname,
                config,
            }),
        })
    }

    /// Config this client was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Host every request is sent to.
    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    /// Build a signed-on-send request for `/{bucket}/{key}`.
    ///
    /// `Host` is set to the resolved hostname. Query parameters are sent
    /// sorted by name, parameters with an empty value are sent bare.
    pub fn request(
        &self,
        action: &'static str,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        query: &BTreeMap<&str, String>,
    ) -> Result<S3Request> {
        let mut uri = format!(
            "{}://{}/{}",
            self.inner.config.scheme,
            self.inner.hostname,
            utf8_percent_encode(bucket, &S3_PATH_ENCODE_SET)
        );
        if let Some(key) = key {
            uri.push('/');
            uri.push_str(&utf8_percent_encode(key, &S3_PATH_ENCODE_SET).to_string());
        }
        for (idx, (k, v)) in query.iter().enumerate() {
            uri.push(if idx == 0 { '?' } else { '&' });
            uri.push_str(&utf8_percent_encode(k, &S3_QUERY_ENCODE_SET).to_string());
            if !v.is_empty() {
                uri.push('=');
                uri.push_str(&utf8_percent_encode(v, &S3_QUERY_ENCODE_SET).to_string());
            }
        }

        let head = Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, self.inner.hostname.as_str())
            .body(())
            .map_err(|e| Error::Config(e.into()))?
            .into_parts()
            .0;

        Ok(self.wrap(action, head))
    }

    fn wrap(&self, action: &'static str, head: Parts) -> S3Request {
        S3Request::new(
            action,
            head,
            self.inner.ctx.clone(),
            self.inner.signer.clone(),
            self.inner.credential.clone(),
        )
        .with_sign_payload(self.inner.config.sign_payload)
        .with_timeout(self.inner.config.global_timeout)
    }

    async fn send(&self, mut req: S3Request, body: Option<Bytes>) -> Result<Response<Bytes>> {
        let action = req.action();
        if let Some(body) = &body {
            req.headers_mut()?
                .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        let resp = req.end(body).await?;
        check_response(action, resp)
    }

    /// Upload an object in one request.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        opts: &PutObjectRequest,
    ) -> Result<PutObjectResponseHeaders> {
        let req = self.put_object_request(bucket, key, opts)?;
        let resp = self.send(req, Some(body)).await?;
        Ok(PutObjectResponseHeaders::from_header_map(resp.headers()))
    }

    /// Build a `PutObject` request to stream the body through [`S3Request::write`].
    ///
    /// The store needs to know the length up front, set `Content-Length`
    /// through [`S3Request::headers_mut`] before the first write.
    pub fn put_object_request(
        &self,
        bucket: &str,
        key: &str,
        opts: &PutObjectRequest,
    ) -> Result<S3Request> {
        let mut req = self.request("putObject", Method::PUT, bucket, Some(key), &BTreeMap::new())?;
        opts.write_headers(req.headers_mut()?)?;
        Ok(req)
    }

    /// Download an object.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        opts: &GetObjectRequest,
    ) -> Result<GetObjectResponse> {
        let mut req = self.request("getObject", Method::GET, bucket, Some(key), &opts.query())?;
        opts.conditions.write_headers(req.headers_mut()?)?;

        let resp = self.send(req, None).await?;
        Ok(GetObjectResponse {
            headers: ObjectResponseHeaders::from_header_map(resp.headers()),
            body: resp.into_body(),
        })
    }

    /// Fetch the headers of an object.
    pub async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        opts: &HeadObjectRequest,
    ) -> Result<ObjectResponseHeaders> {
        let mut req =
            self.request("headObject", Method::HEAD, bucket, Some(key), &BTreeMap::new())?;
        opts.write_headers(req.headers_mut()?)?;

        let resp = self.send(req, None).await?;
        Ok(ObjectResponseHeaders::from_header_map(resp.headers()))
    }

    /// Delete an object.
    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        opts: &DeleteObjectRequest,
    ) -> Result<CommonResponseHeaders> {
        let mut req =
            self.request("deleteObject", Method::DELETE, bucket, Some(key), &BTreeMap::new())?;
        opts.write_headers(req.headers_mut()?)?;

        let resp = self.send(req, None).await?;
        Ok(CommonResponseHeaders::from_header_map(resp.headers()))
    }

    /// Copy `/{src_bucket}/{src_key}` to `/{dst_bucket}/{dst_key}` on the server side.
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        opts: &CopyObjectRequest,
    ) -> Result<CopyObjectResponse> {
        let mut req = self.request(
            "copyObject",
            Method::PUT,
            dst_bucket,
            Some(dst_key),
            &BTreeMap::new(),
        )?;
        let headers = req.headers_mut()?;
        let source = format!(
            "/{}/{}",
            utf8_percent_encode(src_bucket, &S3_PATH_ENCODE_SET),
            utf8_percent_encode(src_key, &S3_PATH_ENCODE_SET)
        );
        headers.insert(
            X_AMZ_COPY_SOURCE,
            HeaderValue::try_from(source).map_err(|e| Error::Config(e.into()))?,
        );
        opts.write_headers(headers)?;

        let resp = check_error_document("copyObject", self.send(req, None).await?)?;
        Ok(CopyObjectResponse {
            headers: CopyObjectResponseHeaders::from_header_map(resp.headers()),
            result: xml::from_bytes(resp.body())?,
        })
    }

    /// List one page of objects with `ListObjectsV2`.
    pub async fn list_objects_v2(
        &self,
        bucket: &str,
        opts: &ListObjectsRequest,
    ) -> Result<ListBucketResult> {
        let req = self.request("listObjectsV2", Method::GET, bucket, None, &opts.query())?;

        let resp = self.send(req, None).await?;
        xml::from_bytes(resp.body())
    }

    /// Start a multipart upload.
    pub async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        opts: &InitMultipartUploadRequest,
    ) -> Result<InitMultipartUploadResponse> {
        let query = BTreeMap::from([("uploads", String::new())]);
        let mut req =
            self.request("initMultipartUpload", Method::POST, bucket, Some(key), &query)?;
        opts.write_headers(req.headers_mut()?)?;

        let resp = self.send(req, None).await?;
        let result: InitiateMultipartUploadResult = xml::from_bytes(resp.body())?;
        debug!("initiated multipart upload {} for {bucket}/{key}", result.upload_id);
        Ok(InitMultipartUploadResponse {
            headers: InitMultipartUploadResponseHeaders::from_header_map(resp.headers()),
            result,
        })
    }

    /// Start a multipart upload and wrap it in a [`MultipartUpload`] writer.
    pub async fn multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        opts: &InitMultipartUploadRequest,
    ) -> Result<MultipartUpload> {
        let init = self.initiate_multipart_upload(bucket, key, opts).await?;
        MultipartUpload::new(self.clone(), bucket, key, &init.result.upload_id)
    }

    /// Upload one part, returning its ETag.
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String> {
        let query = BTreeMap::from([
            ("partNumber", part_number.to_string()),
            ("uploadId", upload_id.to_string()),
        ]);
        let req = self.request("uploadPart", Method::PUT, bucket, Some(key), &query)?;

        let resp = self.send(req, Some(body)).await?;
        resp.headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| {
                Error::multipart(
                    upload_id,
                    format!("response of part {part_number} has no etag"),
                )
            })
    }

    /// Finish a multipart upload. `parts` must be ordered by part number.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletePart],
    ) -> Result<CompleteMultipartUploadResult> {
        let query = BTreeMap::from([("uploadId", upload_id.to_string())]);
        let mut req =
            self.request("completeMultipartUpload", Method::POST, bucket, Some(key), &query)?;
        req.headers_mut()?
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));

        let content = xml::to_string(&CompleteMultipartUpload {
            part: parts.to_vec(),
        })?;
        let resp = self.send(req, Some(Bytes::from(content))).await?;
        let resp = check_error_document("completeMultipartUpload", resp)?;
        xml::from_bytes(resp.body())
    }

    /// Abort a multipart upload, dropping the parts uploaded so far.
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        let query = BTreeMap::from([("uploadId", upload_id.to_string())]);
        let req = self.request("abortMultipartUpload", Method::DELETE, bucket, Some(key), &query)?;

        self.send(req, None).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into [`HttpError`].
fn check_response(action: &'static str, resp: Response<Bytes>) -> Result<Response<Bytes>> {
    let status = resp.status();
    if !status.is_success() {
        warn!("error occurred on {action}, status: {status}");
        debug!("response: {}", String::from_utf8_lossy(resp.body()));
        return Err(HttpError {
            status,
            action,
            error: xml::parse_error(resp.body()),
        }
        .into());
    }

    debug!("{action} succeeded with status {status}");
    Ok(resp)
}

/// Still check the body of a 2xx, S3 might return an error with status code 200.
///
/// https://docs.aws.amazon.com/AmazonS3/latest/API/API_CompleteMultipartUpload.html#API_CompleteMultipartUpload_Example_4
fn check_error_document(
    action: &'static str,
    resp: Response<Bytes>,
) -> Result<Response<Bytes>> {
    let status = resp.status();
    if let Some(error) = xml::parse_error(resp.body()) {
        warn!("error occurred on {action}, status: {status}, code: {}", error.code);
        return Err(HttpError {
            status,
            action,
            error: Some(error),
        }
        .into());
    }
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use pretty_assertions::assert_eq;

    fn client(config: Config) -> Client {
        Client::new(Context::new(), config).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Client::new(Context::new(), Config::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_request_uri_and_host() {
        let c = client(Config::default().with_region("eu-west-1"));
        let query = BTreeMap::from([
            ("uploadId", "VXBsb2Fk+ID".to_string()),
            ("partNumber", "2".to_string()),
        ]);

        let req = c
            .request("uploadPart", Method::PUT, "bucket", Some("dir/my file.txt"), &query)
            .unwrap();
        let headers = req.headers().unwrap();

        assert_eq!(headers[HOST], "s3-eu-west-1.amazonaws.com");
        assert_eq!(
            req.uri().unwrap().to_string(),
            "https://s3-eu-west-1.amazonaws.com/bucket/dir/my%20file.txt?partNumber=2&uploadId=VXBsb2Fk%2BID"
        );
        assert!(!req.is_signed());
    }

    #[test]
    fn test_check_response_keeps_success() {
        let resp = Response::new(Bytes::from_static(b"<ListBucketResult/>"));
        assert!(check_response("listObjectsV2", resp).is_ok());
    }

    #[test]
    fn test_check_response_decodes_error() {
        let mut resp = Response::new(Bytes::from_static(
            b"<Error><Code>NoSuchBucket</Code><Message>The specified bucket does not exist</Message><RequestId>4442587FB7D0A2F9</RequestId></Error>",
        ));
        *resp.status_mut() = StatusCode::NOT_FOUND;

        let err = check_response("getObject", resp).unwrap_err();
        let Error::Http(err) = err else {
            panic!("expected http error, got {err:?}");
        };
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.action, "getObject");
        assert_eq!(err.error.unwrap().code, "NoSuchBucket");
    }

    #[test]
    fn test_check_response_error_in_ok_body() {
        let resp = Response::new(Bytes::from_static(
            b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>InternalError</Code><Message>We encountered an internal error. Please try again.</Message></Error>",
        ));

        let resp = check_response("completeMultipartUpload", resp).unwrap();
        let err = check_error_document("completeMultipartUpload", resp).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.error_response().unwrap().code, "InternalError");
    }

    #[test]
    fn test_check_response_undecodable_error_body() {
        let mut resp = Response::new(Bytes::from_static(b"<html>bad gateway</html>"));
        *resp.status_mut() = StatusCode::BAD_GATEWAY;

        let err = check_response("putObject", resp).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(err.error_response().is_none());
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use s3pipe_core::time::FixedClock;
use s3pipe_core::{Context, HttpSend};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn path(&self) -> &str {
        let rest = self.uri.split_once("://").map_or(self.uri.as_str(), |(_, r)| r);
        let path = rest.find('/').map_or("/", |i| &rest[i..]);
        path.split('?').next().unwrap_or(path)
    }

    /// Value of query parameter `key`, `Some("")` for bare keys.
    pub fn query(&self, key: &str) -> Option<String> {
        let (_, query) = self.uri.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then(|| v.to_string())
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Canned answer of the mock.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
    delay: Option<Duration>,
}

impl Reply {
    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type Handler = dyn Fn(&Recorded) -> Reply + Send + Sync;

/// [`HttpSend`] that records requests and answers through a handler.
#[derive(Clone)]
pub struct MockHttpSend {
    requests: Arc<Mutex<Vec<Recorded>>>,
    handler: Arc<Handler>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Debug for MockHttpSend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockHttpSend")
            .field("requests", &self.requests.lock().unwrap().len())
            .finish()
    }
}

impl MockHttpSend {
    pub fn new(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            requests: Arc::default(),
            handler: Arc::new(handler),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    /// Answer every request with `200 OK` and an empty body.
    pub fn ok() -> Self {
        Self::new(|_| Reply::ok())
    }

    /// Answer requests with `replies` in order, then with `500`.
    pub fn replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let queue = Mutex::new(replies.into_iter().collect::<VecDeque<_>>());
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Reply::status(StatusCode::INTERNAL_SERVER_ERROR))
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, f: impl Fn(&Recorded) -> bool) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| f(r)).count()
    }

    /// Highest number of requests the mock was answering at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> Context {
        Context::new()
            .with_http_send(self.clone())
            .with_clock(FixedClock(
                Utc.with_ymd_and_hms(2013, 5, 24, 0, 0, 0).unwrap(),
            ))
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: Request<Bytes>) -> s3pipe_core::Result<Response<Bytes>> {
        let (parts, body) = req.into_parts();
        let recorded = Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        };
        let reply = (self.handler)(&recorded);
        self.requests.lock().unwrap().push(recorded);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut resp = Response::builder().status(reply.status);
        for (name, value) in reply.headers {
            resp = resp.header(name, value);
        }
        Ok(resp.body(reply.body)?)
    }
}

/// Handler of a store that accepts multipart uploads.
///
/// Parts get the ETag `etag-{n}`. `delay` picks the latency of each part.
pub fn multipart_store(
    delay: impl Fn(u32) -> Duration + Send + Sync + 'static,
) -> impl Fn(&Recorded) -> Reply + Send + Sync + 'static {
    move |req| {
        let upload_id = req.query("uploadId");
        if req.method == Method::POST && req.query("uploads").is_some() {
            Reply::ok().body(
                "<InitiateMultipartUploadResult>\
                 <Bucket>bucket</Bucket><Key>key</Key><UploadId>upload-1</UploadId>\
                 </InitiateMultipartUploadResult>",
            )
        } else if req.method == Method::PUT && upload_id.is_some() {
            let n: u32 = req
                .query("partNumber")
                .and_then(|n| n.parse().ok())
                .unwrap_or_default();
            Reply::ok()
                .header("etag", format!("etag-{n}"))
                .delay(delay(n))
        } else if req.method == Method::POST && upload_id.is_some() {
            Reply::ok().body(
                "<CompleteMultipartUploadResult>\
                 <Location>https://s3.amazonaws.com/bucket/key</Location>\
                 <Bucket>bucket</Bucket><Key>key</Key><ETag>\"final-etag\"</ETag>\
                 </CompleteMultipartUploadResult>",
            )
        } else if req.method == Method::DELETE && upload_id.is_some() {
            Reply::status(StatusCode::NO_CONTENT)
        } else {
            Reply::ok().header("etag", "\"single-etag\"")
        }
    }
}

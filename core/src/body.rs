use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::stream::{self, BoxStream};
use futures::{future, SinkExt, StreamExt};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Body of an outgoing request.
///
/// A body is either fully buffered or a stream of chunks whose total
/// length is unknown when the request head is sent.
pub enum Body {
    /// The whole payload is known up front.
    Bytes(Bytes),
    /// The payload is produced while the request is in flight.
    Stream(BoxStream<'static, Result<Bytes>>),
}

impl Body {
    /// Create an empty body.
    pub fn empty() -> Self {
        Body::Bytes(Bytes::new())
    }

    /// Create a streaming body from any stream of chunks.
    pub fn from_stream(s: impl futures::Stream<Item = Result<Bytes>> + Send + 'static) -> Self {
        Body::Stream(s.boxed())
    }

    /// Create a streaming body fed through a bounded channel.
    ///
    /// At most `buffer` chunks wait in the channel before
    /// [`BodySender::send`] starts to wait for the transport. The body ends
    /// when the sender is closed. A sender dropped without [`BodySender::close`]
    /// ends the body with an error instead.
    pub fn channel(buffer: usize) -> (BodySender, Body) {
        let (tx, rx) = mpsc::channel(buffer);
        let closed = Arc::new(AtomicBool::new(false));

        let finished = closed.clone();
        let tail = stream::once(async move {
            if finished.load(Ordering::Acquire) {
                None
            } else {
                Some(Err(Error::unexpected(
                    "request body sender dropped before close",
                )))
            }
        })
        .filter_map(future::ready);

        (
            BodySender { tx, closed },
            Body::from_stream(rx.map(Ok).chain(tail)),
        )
    }

    /// Collect the whole body into memory.
    pub async fn collect(self) -> Result<Bytes> {
        match self {
            Body::Bytes(bs) => Ok(bs),
            Body::Stream(mut s) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bs: Bytes) -> Self {
        Body::Bytes(bs)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bs: Vec<u8>) -> Self {
        Body::Bytes(bs.into())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Bytes(bs) => f.debug_tuple("Bytes").field(&bs.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Writing half of [`Body::channel`].
#[derive(Debug)]
pub struct BodySender {
    tx: mpsc::Sender<Bytes>,
    closed: Arc<AtomicBool>,
}

impl BodySender {
    /// Send one chunk, waiting while the channel is full.
    pub async fn send(&mut self, chunk: Bytes) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|e| Error::unexpected("request body receiver has been dropped").with_source(e))
    }

    /// Close the body so the transport can finish the request.
    pub fn close(mut self) {
        self.closed.store(true, Ordering::Release);
        self.tx.close_channel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_channel_body_collects_in_order() -> Result<()> {
        let (mut tx, body) = Body::channel(4);

        tx.send(Bytes::from_static(b"hello ")).await?;
        tx.send(Bytes::from_static(b"world")).await?;
        tx.close();

        assert_eq!(body.collect().await?, Bytes::from_static(b"hello world"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dropped_sender_fails_the_body() -> Result<()> {
        let (mut tx, body) = Body::channel(4);

        tx.send(Bytes::from_static(b"first half ")).await?;
        drop(tx);

        let err = body.collect().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unexpected);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (mut tx, body) = Body::channel(1);
        drop(body);

        let err = tx.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unexpected);
    }
}

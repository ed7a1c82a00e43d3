//! Regroup arbitrary writes into chunks of a minimum size.
//!
//! [`ChunkRebuffer`] is push based: callers write bytes, and chunks of at
//! least `min_chunk_size` bytes are delivered to a [`ChunkSink`]. The last
//! chunk may be smaller. A stream that ends without any data still delivers
//! exactly one empty chunk.
//!
//! [`Rebuffered`] applies the same rules to a [`Stream`] of byte chunks.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::{Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// Receiver of rebuffered chunks.
pub trait ChunkSink {
    /// Error raised by the sink.
    type Error;

    /// Take one chunk. On error the chunk is kept and delivered again on resume.
    fn on_chunk(&mut self, chunk: Bytes) -> Result<(), Self::Error>;

    /// Called once, after the last chunk.
    fn on_end(&mut self) -> Result<(), Self::Error>;
}

impl ChunkSink for Vec<Bytes> {
    type Error = Infallible;

    fn on_chunk(&mut self, chunk: Bytes) -> Result<(), Self::Error> {
        self.push(chunk);
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ChunkSink for VecDeque<Bytes> {
    type Error = Infallible;

    fn on_chunk(&mut self, chunk: Bytes) -> Result<(), Self::Error> {
        self.push_back(chunk);
        Ok(())
    }

    fn on_end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Delivery state of a [`ChunkRebuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebufferState {
    /// Chunks go to the sink as soon as they are cut.
    Flowing,
    /// Chunks are queued until `resume`.
    Paused,
    /// The sink received the end signal.
    Ended,
}

/// Error of [`ChunkRebuffer`] writes.
#[derive(Debug)]
pub enum RebufferError<E> {
    /// The sink rejected a chunk or the end signal. Delivery is paused.
    Sink(E),
    /// Data was written after `end`.
    Ended,
}

impl<E: Display> Display for RebufferError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RebufferError::Sink(e) => write!(f, "chunk sink failed: {e}"),
            RebufferError::Ended => f.write_str("write after end"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RebufferError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RebufferError::Sink(e) => Some(e),
            RebufferError::Ended => None,
        }
    }
}

/// Read handle on the number of chunks a [`ChunkRebuffer`] has delivered.
#[derive(Debug, Clone, Default)]
pub struct ChunkCounter(Arc<AtomicU64>);

impl ChunkCounter {
    /// Chunks delivered so far.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

type Inspector = Box<dyn FnMut(&Bytes) + Send>;

/// Regroups writes of any size into chunks of at least `min_chunk_size`
/// bytes and hands them to a [`ChunkSink`] in write order.
///
/// Only the last chunk may be smaller. A rebuffer that saw no data still
/// delivers one empty chunk on `end`.
pub struct ChunkRebuffer<S: ChunkSink> {
    sink: S,
    min_chunk_size: usize,
    buffer: BytesMut,
    queue: VecDeque<Bytes>,
    inspector: Option<Inspector>,
    paused: bool,
    end_requested: bool,
    end_delivered: bool,
    emitted: bool,
    delivered: ChunkCounter,
}

impl<S: ChunkSink + Debug> Debug for ChunkRebuffer<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRebuffer")
            .field("sink", &self.sink)
            .field("min_chunk_size", &self.min_chunk_size)
            .field("buffered", &self.buffer.len())
            .field("queued", &self.queue.len())
            .field("state", &self.state())
            .finish()
    }
}

impl<S: ChunkSink> ChunkRebuffer<S> {
    /// Deliver to `sink` in chunks of at least `min_chunk_size` bytes.
    pub fn new(sink: S, min_chunk_size: usize) -> Self {
        Self {
            sink,
            min_chunk_size,
            buffer: BytesMut::with_capacity(min_chunk_size),
            queue: VecDeque::new(),
            inspector: None,
            paused: false,
            end_requested: false,
            end_delivered: false,
            emitted: false,
            delivered: ChunkCounter::default(),
        }
    }

    /// Call `inspector` with every chunk when it is cut, before it is queued.
    pub fn with_inspector(mut self, inspector: impl FnMut(&Bytes) + Send + 'static) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    /// Current delivery state.
    pub fn state(&self) -> RebufferState {
        if self.end_delivered {
            RebufferState::Ended
        } else if self.paused {
            RebufferState::Paused
        } else {
            RebufferState::Flowing
        }
    }

    /// Append `data`, delivering a chunk once the minimum size is reached.
    pub fn write(&mut self, data: &[u8]) -> Result<(), RebufferError<S::Error>> {
        if self.end_requested {
            return Err(RebufferError::Ended);
        }

        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= self.min_chunk_size {
            self.flush();
        }
        self.deliver()
    }

    /// Flush what is left and signal the end to the sink.
    ///
    /// Calling `end` again is a no-op apart from retrying a pending delivery.
    pub fn end(&mut self) -> Result<(), RebufferError<S::Error>> {
        if !self.end_requested {
            self.end_requested = true;
            if !self.buffer.is_empty() || !self.emitted {
                self.flush();
            }
        }
        self.deliver()
    }

    /// Stop delivering. Writes keep being buffered.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Deliver queued chunks in order, then continue flowing.
    pub fn resume(&mut self) -> Result<(), RebufferError<S::Error>> {
        self.paused = false;
        self.deliver()
    }

    /// Chunks the sink accepted so far.
    pub fn chunks_delivered(&self) -> u64 {
        self.delivered.get()
    }

    /// Counter that can be read from other threads.
    pub fn chunk_counter(&self) -> ChunkCounter {
        self.delivered.clone()
    }

    /// Chunks cut but not yet delivered.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Bytes waiting for the next cut.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Borrow the sink mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Drop the rebuffer and return its sink. Buffered data is lost.
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn flush(&mut self) {
        let chunk = self.buffer.split().freeze();
        self.emitted = true;
        if let Some(inspector) = self.inspector.as_mut() {
            inspector(&chunk);
        }
        self.queue.push_back(chunk);
    }

    fn deliver(&mut self) -> Result<(), RebufferError<S::Error>> {
        while !self.paused {
            let Some(chunk) = self.queue.pop_front() else {
                break;
            };
            if let Err(err) = self.sink.on_chunk(chunk.clone()) {
                self.queue.push_front(chunk);
                self.paused = true;
                return Err(RebufferError::Sink(err));
            }
            self.delivered.0.fetch_add(1, Ordering::Relaxed);
        }

        if !self.paused && self.queue.is_empty() && self.end_requested && !self.end_delivered {
            if let Err(err) = self.sink.on_end() {
                self.paused = true;
                return Err(RebufferError::Sink(err));
            }
            self.end_delivered = true;
        }
        Ok(())
    }
}

/// Stream adapter returned by [`rebuffered`].
pub struct Rebuffered<S> {
    inner: S,
    rebuffer: ChunkRebuffer<VecDeque<Bytes>>,
    done: bool,
}

/// Regroup the chunks of `stream` into chunks of at least `min_chunk_size` bytes.
pub fn rebuffered<S>(stream: S, min_chunk_size: usize) -> Rebuffered<S> {
    Rebuffered {
        inner: stream,
        rebuffer: ChunkRebuffer::new(VecDeque::new(), min_chunk_size),
        done: false,
    }
}

impl<S, E> Stream for Rebuffered<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(chunk) = this.rebuffer.sink_mut().pop_front() {
                return Poll::Ready(Some(Ok(chunk)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            let result = match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(bs)) => this.rebuffer.write(&bs),
                Some(Err(err)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.done = true;
                    this.rebuffer.end()
                }
            };
            match result {
                Ok(()) => {}
                Err(RebufferError::Sink(never)) => match never {},
                // `done` stops polling the inner stream once it has ended.
                Err(RebufferError::Ended) => {}
            }
        }
    }
}

use crate::constants::{MULTIPART_DEFAULT_MAX_OUTSTANDING, MULTIPART_MIN_PART_SIZE};
use crate::xml::CompletePart;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// Lifecycle of a [`MultipartUploadSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Taking writes and dispatching parts.
    Accumulating,
    /// Every part is acknowledged, the complete call is in flight.
    Completing,
    /// The store assembled the object.
    Completed,
    /// An abort is in flight.
    Aborting,
    /// The abort call returned. No further parts are accepted.
    Aborted,
    /// A part or the complete call failed.
    Failed,
}

/// I/O the session asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Upload `body` as part `part_number`.
    UploadPart { part_number: u32, body: Bytes },
    /// Complete the upload with `parts`, ordered by part number.
    Complete { parts: Vec<CompletePart> },
    /// Abort the upload.
    Abort,
    /// The write queue drained below half its bound, writes can continue.
    Drain,
}

/// State of one multipart upload, without any I/O.
///
/// The session cuts written bytes into parts, tracks the ETags of the parts
/// that finished, and decides when the upload can be completed. Part numbers
/// start at 1 and follow write order. Completions may arrive in any order.
///
/// All methods take `&mut self`: the session is meant to be owned by the one
/// task that drives the upload.
pub struct MultipartUploadSession {
    bucket: String,
    key: String,
    upload_id: String,
    parts: BTreeMap<u32, String>,
    buffer: BytesMut,
    buffer_size: usize,
    max_outstanding: usize,
    next_part_number: u32,
    outstanding: usize,
    end_requested: bool,
    abort_on_failure: bool,
    abort_requested: bool,
    queue_was_full: bool,
    state: SessionState,
}

impl Debug for MultipartUploadSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartUploadSession")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("upload_id", &self.upload_id)
            .field("parts", &self.parts.len())
            .field("buffered", &self.buffer.len())
            .field("next_part_number", &self.next_part_number)
            .field("outstanding", &self.outstanding)
            .field("end_requested", &self.end_requested)
            .field("state", &self.state)
            .finish()
    }
}

impl MultipartUploadSession {
    /// Track the upload `upload_id` of `bucket/key` with the default part
    /// size and write queue bound.
    pub fn new(bucket: &str, key: &str, upload_id: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            parts: BTreeMap::new(),
            buffer: BytesMut::new(),
            buffer_size: MULTIPART_MIN_PART_SIZE,
            max_outstanding: MULTIPART_DEFAULT_MAX_OUTSTANDING,
            next_part_number: 1,
            outstanding: 0,
            end_requested: false,
            abort_on_failure: true,
            abort_requested: false,
            queue_was_full: false,
            state: SessionState::Accumulating,
        }
    }

    /// Set the part size. Values below the store minimum are raised to it.
    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size.max(MULTIPART_MIN_PART_SIZE);
    }

    /// Ask for an abort when a part fails. On by default.
    pub fn set_abort_on_failure(&mut self, abort: bool) {
        self.abort_on_failure = abort;
    }

    /// Bound the number of part uploads in flight. `n` must be at least 2.
    pub fn set_write_queue_max_size(&mut self, n: usize) -> Result<()> {
        if n < 2 {
            return Err(Error::Config(s3pipe_core::Error::config_invalid(format!(
                "write queue max size must be at least 2, got {n}"
            ))));
        }
        self.max_outstanding = n;
        Ok(())
    }

    /// More part uploads are in flight than the bound allows.
    pub fn write_queue_full(&self) -> bool {
        self.outstanding > self.max_outstanding
    }

    /// The queue went over its bound and has not drained to half of it yet.
    pub fn awaiting_drain(&self) -> bool {
        self.queue_was_full
    }

    /// Bucket of the upload.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key of the upload.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Id the store handed out when the upload was initiated.
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Size at which the buffer is cut into a part.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// ETags of acknowledged parts by part number.
    pub fn parts(&self) -> &BTreeMap<u32, String> {
        &self.parts
    }

    /// Parts dispatched but not yet reported finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Number the next dispatched part will get.
    pub fn next_part_number(&self) -> u32 {
        self.next_part_number
    }

    /// `end` was called.
    pub fn is_end_requested(&self) -> bool {
        self.end_requested
    }

    /// Append `data`, cutting a part once the buffer reaches the part size.
    pub fn write(&mut self, data: &[u8]) -> Result<Vec<Action>> {
        self.ensure_accumulating()?;
        if self.end_requested {
            return Err(Error::multipart(&self.upload_id, "write after end"));
        }
        Ok(self.push(data).into_iter().collect())
    }

    /// Request the end of the upload.
    ///
    /// What is left in the buffer goes out as the last part. An upload that
    /// never dispatched a part sends one empty part, so that the complete call
    /// always lists at least one part.
    pub fn end(&mut self) -> Result<Vec<Action>> {
        self.ensure_accumulating()?;
        if self.end_requested {
            return Ok(Vec::new());
        }
        self.end_requested = true;

        let mut actions = Vec::new();
        if !self.buffer.is_empty() || self.next_part_number == 1 {
            actions.extend(self.push(&[]));
        }
        actions.extend(self.try_complete());
        Ok(actions)
    }

    /// Record the ETag of a finished part.
    pub fn part_completed(&mut self, part_number: u32, etag: impl Into<String>) -> Vec<Action> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.state != SessionState::Accumulating {
            return Vec::new();
        }
        self.parts.insert(part_number, etag.into());

        let mut actions = Vec::new();
        if self.queue_was_full && self.outstanding <= self.max_outstanding / 2 {
            self.queue_was_full = false;
            actions.push(Action::Drain);
        }
        actions.extend(self.try_complete());
        actions
    }

    /// Record a failed part. Returns [`Action::Abort`] if the upload should be aborted.
    pub fn part_failed(&mut self, part_number: u32) -> Option<Action> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if matches!(self.state, SessionState::Aborted | SessionState::Completed) {
            return None;
        }
        log::debug!("part {part_number} of upload {} failed", self.upload_id);
        self.state = SessionState::Failed;

        if self.abort_on_failure {
            self.abort()
        } else {
            None
        }
    }

    /// Request an abort. Only the first request returns [`Action::Abort`].
    pub fn abort(&mut self) -> Option<Action> {
        if self.abort_requested
            || matches!(self.state, SessionState::Completed | SessionState::Aborted)
        {
            return None;
        }
        self.abort_requested = true;
        if self.state != SessionState::Failed {
            self.state = SessionState::Aborting;
        }
        Some(Action::Abort)
    }

    /// The abort call finished, whatever its outcome.
    pub fn abort_finished(&mut self) {
        self.state = SessionState::Aborted;
    }

    /// The complete call succeeded.
    pub fn completed(&mut self) {
        self.state = SessionState::Completed;
    }

    /// The complete call failed.
    pub fn complete_failed(&mut self) {
        self.state = SessionState::Failed;
    }

    fn ensure_accumulating(&self) -> Result<()> {
        if self.state == SessionState::Accumulating {
            Ok(())
        } else {
            Err(Error::multipart(
                &self.upload_id,
                format!("upload is {:?}", self.state),
            ))
        }
    }

    fn push(&mut self, data: &[u8]) -> Option<Action> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() < self.buffer_size && !self.end_requested {
            return None;
        }

        let part_number = self.next_part_number;
        self.next_part_number += 1;
        self.outstanding += 1;
        if self.write_queue_full() {
            self.queue_was_full = true;
        }
        Some(Action::UploadPart {
            part_number,
            body: self.buffer.split().freeze(),
        })
    }

    fn try_complete(&mut self) -> Option<Action> {
        if self.state != SessionState::Accumulating
            || !self.end_requested
            || self.parts.len() != (self.next_part_number - 1) as usize
        {
            return None;
        }

        self.state = SessionState::Completing;
        Some(Action::Complete {
            parts: self
                .parts
                .iter()
                .map(|(n, etag)| CompletePart {
                    part_number: *n,
                    etag: etag.clone(),
                })
                .collect(),
        })
    }
}

use super::{Action, MultipartUploadSession, SessionState};
use crate::xml::{CompleteMultipartUploadResult, CompletePart};
use crate::{Client, Error, Result};
use bytes::Bytes;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::task::JoinHandle;

/// A part upload running on its own task.
///
/// Dropping it aborts the task.
struct PartTask {
    part_number: u32,
    handle: JoinHandle<Result<String>>,
}

impl Future for PartTask {
    type Output = (u32, Result<String>);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let result = ready!(Pin::new(&mut this.handle).poll(cx));
        let result = result.unwrap_or_else(|err| {
            Err(Error::Transport(
                s3pipe_core::Error::unexpected("part upload task failed").with_source(err),
            ))
        });
        Poll::Ready((this.part_number, result))
    }
}

impl Drop for PartTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Writer for an initiated multipart upload.
///
/// Written bytes are cut into parts and uploaded concurrently, each part on
/// its own task so uploads make progress while the caller is busy. `write`
/// returns as soon as the part is dispatched, unless more uploads are in
/// flight than the write queue allows, in which case it waits until no more
/// than half the bound are left. `end` flushes the rest and completes the upload once every
/// part is acknowledged.
///
/// When a part fails and `abort_on_failure` is set, the upload is aborted and
/// the part's error is returned. Dropping the writer cancels the part uploads
/// still running.
pub struct MultipartUpload {
    client: Client,
    session: MultipartUploadSession,
    uploads: FuturesUnordered<PartTask>,
}

impl Debug for MultipartUpload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartUpload")
            .field("session", &self.session)
            .field("in_flight", &self.uploads.len())
            .finish()
    }
}

impl MultipartUpload {
    /// Attach to the upload `upload_id`, using the client's multipart settings.
    pub fn new(client: Client, bucket: &str, key: &str, upload_id: &str) -> Result<Self> {
        let mut session = MultipartUploadSession::new(bucket, key, upload_id);
        session.set_buffer_size(client.config().multipart_buffer_size);
        session.set_write_queue_max_size(client.config().multipart_max_outstanding)?;
        session.set_abort_on_failure(client.config().abort_on_failure);

        Ok(Self {
            client,
            session,
            uploads: FuturesUnordered::new(),
        })
    }

    pub fn upload_id(&self) -> &str {
        self.session.upload_id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// ETags of the parts acknowledged so far.
    pub fn parts(&self) -> &BTreeMap<u32, String> {
        self.session.parts()
    }

    pub fn write_queue_full(&self) -> bool {
        self.session.write_queue_full()
    }

    /// Part uploads dispatched but not finished yet.
    pub fn outstanding(&self) -> usize {
        self.session.outstanding()
    }

    pub fn set_write_queue_max_size(&mut self, n: usize) -> Result<()> {
        self.session.set_write_queue_max_size(n)
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.session.set_buffer_size(size)
    }

    /// Buffer `data`, dispatching a part when the buffer is full.
    pub async fn write(&mut self, data: Bytes) -> Result<()> {
        let actions = self.session.write(&data)?;
        self.dispatch(actions);
        self.reap_finished().await?;

        while self.session.awaiting_drain() {
            let Some((part_number, result)) = self.uploads.next().await else {
                break;
            };
            let actions = self.part_finished(part_number, result).await?;
            if actions.iter().any(|a| matches!(a, Action::Drain)) {
                break;
            }
        }
        Ok(())
    }

    /// Flush the buffer and complete the upload.
    pub async fn end(&mut self) -> Result<CompleteMultipartUploadResult> {
        let mut actions = self.session.end()?;

        loop {
            if let Some(parts) = self.dispatch(mem::take(&mut actions)) {
                return self.complete(parts).await;
            }

            let Some((part_number, result)) = self.uploads.next().await else {
                return Err(Error::multipart(
                    self.session.upload_id(),
                    "no part in flight but the upload is not complete",
                ));
            };
            actions = self.part_finished(part_number, result).await?;
        }
    }

    /// Abort the upload. Calls after the first one do nothing.
    pub async fn abort(&mut self) -> Result<()> {
        if self.session.abort().is_none() {
            return Ok(());
        }
        self.send_abort().await
    }

    /// Start the uploads in `actions`, returning the parts to complete with if
    /// the session asked for completion.
    fn dispatch(&mut self, actions: Vec<Action>) -> Option<Vec<CompletePart>> {
        let mut complete = None;
        for action in actions {
            match action {
                Action::UploadPart { part_number, body } => self.upload_part(part_number, body),
                Action::Complete { parts } => complete = Some(parts),
                Action::Abort | Action::Drain => {}
            }
        }
        complete
    }

    fn upload_part(&mut self, part_number: u32, body: Bytes) {
        debug!(
            "uploading part {part_number} of {} ({} bytes)",
            self.session.upload_id(),
            body.len()
        );

        let client = self.client.clone();
        let bucket = self.session.bucket().to_string();
        let key = self.session.key().to_string();
        let upload_id = self.session.upload_id().to_string();
        let handle = tokio::spawn(async move {
            client
                .upload_part(&bucket, &key, &upload_id, part_number, body)
                .await
        });
        self.uploads.push(PartTask {
            part_number,
            handle,
        });
    }

    /// Handle the uploads that already finished without waiting for the others.
    async fn reap_finished(&mut self) -> Result<()> {
        loop {
            let Some(Some((part_number, result))) = self.uploads.next().now_or_never() else {
                return Ok(());
            };
            self.part_finished(part_number, result).await?;
        }
    }

    async fn part_finished(
        &mut self,
        part_number: u32,
        result: Result<String>,
    ) -> Result<Vec<Action>> {
        match result {
            Ok(etag) => {
                debug!(
                    "part {part_number} of {} uploaded, etag: {etag}",
                    self.session.upload_id()
                );
                Ok(self.session.part_completed(part_number, etag))
            }
            Err(err) => {
                warn!(
                    "part {part_number} of {} failed: {err}",
                    self.session.upload_id()
                );
                if let Some(Action::Abort) = self.session.part_failed(part_number) {
                    if let Err(abort_err) = self.send_abort().await {
                        warn!(
                            "failed to abort upload {}: {abort_err}",
                            self.session.upload_id()
                        );
                    }
                }
                Err(err)
            }
        }
    }

    async fn complete(&mut self, parts: Vec<CompletePart>) -> Result<CompleteMultipartUploadResult> {
        debug!(
            "completing upload {} with {} parts",
            self.session.upload_id(),
            parts.len()
        );

        let result = self
            .client
            .complete_multipart_upload(
                self.session.bucket(),
                self.session.key(),
                self.session.upload_id(),
                &parts,
            )
            .await;
        match &result {
            Ok(_) => self.session.completed(),
            Err(_) => self.session.complete_failed(),
        }
        result
    }

    async fn send_abort(&mut self) -> Result<()> {
        // Dropping the tasks aborts the parts still in flight.
        self.uploads.clear();

        let result = self
            .client
            .abort_multipart_upload(
                self.session.bucket(),
                self.session.key(),
                self.session.upload_id(),
            )
            .await;
        self.session.abort_finished();
        if result.is_ok() {
            info!("aborted multipart upload {}", self.session.upload_id());
        }
        result
    }
}

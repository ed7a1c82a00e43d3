use crate::constants::MULTIPART_MIN_PART_SIZE;
use crate::model::{AdaptiveUploadRequest, AdaptiveUploadResponse};
use crate::rebuffer::rebuffered;
use crate::{Client, Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, warn};

impl Client {
    /// Upload a stream of unknown length.
    ///
    /// The stream is regrouped into parts of at least the multipart buffer
    /// size. A stream that ends within the first part is sent with a single
    /// `PutObject`, anything longer goes through a multipart upload.
    pub async fn put_object_stream<S, E>(
        &self,
        bucket: &str,
        key: &str,
        stream: S,
        opts: &AdaptiveUploadRequest,
    ) -> Result<AdaptiveUploadResponse>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let buffer_size = opts
            .buffer_size
            .map(|n| n.max(MULTIPART_MIN_PART_SIZE))
            .unwrap_or(self.config().multipart_buffer_size);
        let mut chunks = rebuffered(stream, buffer_size);

        let first = chunks
            .next()
            .await
            .transpose()
            .map_err(read_error)?
            .unwrap_or_default();
        let Some(second) = chunks.next().await.transpose().map_err(read_error)? else {
            debug!(
                "stream of {bucket}/{key} fits in one part, sending {} bytes with putObject",
                first.len()
            );
            let headers = self
                .put_object(bucket, key, first, &opts.to_put_object())
                .await?;
            return Ok(AdaptiveUploadResponse::Single(headers));
        };

        let mut upload = self
            .multipart_upload(bucket, key, &opts.to_init_multipart())
            .await?;
        upload.set_buffer_size(buffer_size);

        let result = async {
            if let Some(n) = opts.write_queue_max_size {
                upload.set_write_queue_max_size(n)?;
            }
            upload.write(first).await?;
            upload.write(second).await?;
            while let Some(chunk) = chunks.next().await {
                upload.write(chunk.map_err(read_error)?).await?;
            }
            upload.end().await
        }
        .await;

        match result {
            Ok(complete) => Ok(AdaptiveUploadResponse::Multipart(complete)),
            Err(err) => {
                if self.config().abort_on_failure {
                    if let Err(abort_err) = upload.abort().await {
                        warn!("failed to abort upload {}: {abort_err}", upload.upload_id());
                    }
                }
                Err(err)
            }
        }
    }
}

fn read_error<E>(err: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Transport(s3pipe_core::Error::unexpected("failed to read upload stream").with_source(err))
}

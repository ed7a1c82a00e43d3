use anyhow::Result;
use bytes::Bytes;
use futures::stream;
use s3pipe::default_context;
use s3pipe::s3::{AdaptiveUploadRequest, AdaptiveUploadResponse, Client, Config};

/// Upload a generated object to the bucket named by `S3PIPE_BUCKET`.
///
/// Region and credentials are read from the usual `AWS_*` variables.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let ctx = default_context();
    let config = Config::default().from_env(&ctx);
    let client = Client::new(ctx, config)?;

    let bucket = std::env::var("S3PIPE_BUCKET")?;
    let chunks = (0..16).map(|i| Ok::<_, std::io::Error>(Bytes::from(vec![i as u8; 1024 * 1024])));

    let resp = client
        .put_object_stream(
            &bucket,
            "s3pipe/example.bin",
            stream::iter(chunks),
            &AdaptiveUploadRequest::default(),
        )
        .await?;
    match resp {
        AdaptiveUploadResponse::Single(headers) => println!("uploaded, etag: {:?}", headers.etag),
        AdaptiveUploadResponse::Multipart(result) => {
            println!("uploaded in parts, etag: {}", result.etag)
        }
    }
    Ok(())
}

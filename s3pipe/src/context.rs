use s3pipe_core::{Context, OsEnv};
use s3pipe_http_send_reqwest::ReqwestHttpSend;

/// Build a [`Context`] that sends requests with a fresh `reqwest::Client`
/// and reads variables from the process environment.
pub fn default_context() -> Context {
    Context::new()
        .with_http_send(ReqwestHttpSend::default())
        .with_env(OsEnv)
}

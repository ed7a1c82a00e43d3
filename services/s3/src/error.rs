use crate::xml::ErrorResponse;
use http::StatusCode;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Result type used by the s3 client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the s3 client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store answered with a non-2xx status, or with an error document.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// The transport failed before a response was received.
    #[error("transport failed: {0}")]
    Transport(#[source] s3pipe_core::Error),
    /// The request did not finish within the configured timeout.
    #[error("{action} timed out after {timeout:?}")]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },
    /// A signing problem the caller has to fix.
    #[error("signing failed: {0}")]
    Signing(#[source] s3pipe_core::Error),
    #[error("failed to decode xml: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("failed to encode xml: {0}")]
    XmlEncode(#[from] quick_xml::SeError),
    /// A multipart upload was used in a state that does not allow the call.
    #[error("multipart upload {upload_id}: {message}")]
    Multipart { upload_id: String, message: String },
    #[error("invalid config: {0}")]
    Config(#[source] s3pipe_core::Error),
}

impl Error {
    /// HTTP status of the failed response, if the store answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http(e) => Some(e.status),
            _ => None,
        }
    }

    /// Decoded error document, if the store sent one.
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Http(e) => e.error.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn multipart(upload_id: &str, message: impl Into<String>) -> Self {
        Error::Multipart {
            upload_id: upload_id.to_string(),
            message: message.into(),
        }
    }
}

/// A response the store rejected.
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Status code of the response.
    pub status: StatusCode,
    /// Operation that failed, for example `putObject`.
    pub action: &'static str,
    /// Decoded error body, `None` if the body was not an error document.
    pub error: Option<ErrorResponse>,
}

impl HttpError {
    /// Reason phrase of the status code.
    pub fn status_message(&self) -> &str {
        self.status.canonical_reason().unwrap_or("")
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "error occurred on '{}': {}", self.action, self.status)?;
        if let Some(e) = &self.error {
            write!(f, ", code: {}, message: {}", e.code, e.message)?;
            if !e.request_id.is_empty() {
                write!(f, ", request id: {}", e.request_id)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HttpError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_http_error_display() {
        let err = Error::from(HttpError {
            status: StatusCode::FORBIDDEN,
            action: "putObject",
            error: Some(ErrorResponse {
                code: "AccessDenied".to_string(),
                message: "Access Denied".to_string(),
                request_id: "656c76696e6727732072657175657374".to_string(),
                ..Default::default()
            }),
        });

        assert_eq!(
            err.to_string(),
            "error occurred on 'putObject': 403 Forbidden, code: AccessDenied, message: Access Denied, request id: 656c76696e6727732072657175657374"
        );
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(err.error_response().map(|e| e.code.as_str()), Some("AccessDenied"));
    }

    #[test]
    fn test_http_error_without_body() {
        let err = HttpError {
            status: StatusCode::NOT_FOUND,
            action: "headObject",
            error: None,
        };

        assert_eq!(err.status_message(), "Not Found");
        assert_eq!(err.to_string(), "error occurred on 'headObject': 404 Not Found");
    }
}

//! Client error types.

use thiserror::Error;
use workbench_files::FileError;
use workbench_stream::StreamError;

/// Everything a workbench API call can fail with.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never got a response (connect, TLS, timeout, body read).
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bad server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A response or event body did not have the expected shape.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other non-2xx answer.
    #[error("Remote error ({status}): {message}")]
    Api {
        status: u16,
        /// Machine-readable code from the error body, `unknown` when absent.
        code: String,
        message: String,
    },

    /// 401: the token is missing, expired or wrong.
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// 412: an `If-Match` version no longer matches the server's.
    #[error("Precondition failed: {0}")]
    Conflict(String),

    /// The client was built with unusable settings.
    #[error("Invalid client settings: {0}")]
    Config(String),

    /// The event stream broke off mid-way.
    #[error("Event stream failed: {0}")]
    Stream(String),
}

impl Error {
    /// Classify a non-2xx response. `body` is the decoded error payload, when
    /// the server sent one.
    pub(crate) fn from_status(status: u16, body: Option<ErrorResponse>) -> Self {
        let Some(ErrorResponse { code, message }) = body else {
            return match status {
                412 => Error::Conflict("the resource changed on the server".to_string()),
                _ => Error::Api {
                    status,
                    code: unknown_code(),
                    message: format!("HTTP {status}"),
                },
            };
        };
        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            412 => Error::Conflict(message),
            _ => Error::Api {
                status,
                code,
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_auth_error(&self) -> bool {
        self.status() == Some(401)
    }

    /// Check if this is a version-token conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// 5xx from the server.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|status| status >= 500)
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Auth(_) => Some(401),
            Error::NotFound(_) => Some(404),
            Error::Conflict(_) => Some(412),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Message without the variant prefix, for tab-scoped errors.
    fn reason(&self) -> String {
        match self {
            Error::Api { message, .. }
            | Error::Auth(message)
            | Error::NotFound(message)
            | Error::Conflict(message)
            | Error::Config(message)
            | Error::Stream(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Map a failed load of `path` into the file session taxonomy.
    pub fn into_load_error(self, path: &str) -> FileError {
        FileError::load(path, self.reason())
    }

    /// Map a failed save of `path` into the file session taxonomy. A failed
    /// precondition becomes [`FileError::Conflict`].
    pub fn into_save_error(self, path: &str) -> FileError {
        if self.is_conflict() {
            FileError::conflict(path)
        } else {
            FileError::save(path, self.reason())
        }
    }
}

impl From<Error> for StreamError {
    fn from(error: Error) -> Self {
        match error {
            Error::Http(e) => StreamError::Connection(e.to_string()),
            Error::Api {
                status, message, ..
            } => StreamError::remote(status, message),
            Error::Auth(message) => StreamError::remote(401, message),
            Error::NotFound(message) => StreamError::remote(404, message),
            Error::Conflict(message) => StreamError::remote(412, message),
            Error::Json(e) => StreamError::InvalidEvent(e.to_string()),
            Error::Stream(message) => StreamError::Stream(message),
            other @ (Error::InvalidUrl(_) | Error::Config(_)) => {
                StreamError::Connection(other.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// JSON body of a non-2xx response.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default = "unknown_code")]
    pub code: String,
    pub message: String,
}

fn unknown_code() -> String {
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_file_conflict() {
        let err = Error::Conflict("etag mismatch".into()).into_save_error("a.txt");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_save_failure_keeps_server_message() {
        let err = Error::Api {
            status: 500,
            code: "internal".into(),
            message: "disk full".into(),
        }
        .into_save_error("a.txt");
        assert!(!err.is_conflict());
        assert_eq!(err.reason(), "disk full");
        assert_eq!(err.to_string(), "Failed to save a.txt: disk full");
    }

    #[test]
    fn test_stream_error_conversion() {
        let err: StreamError = Error::NotFound("run r-1".into()).into();
        assert!(err.is_not_found());

        let err: StreamError = Error::Stream("eof".into()).into();
        assert!(matches!(err, StreamError::Stream(m) if m == "eof"));
    }

    #[test]
    fn test_status() {
        assert_eq!(Error::Conflict(String::new()).status(), Some(412));
        assert_eq!(Error::Config(String::new()).status(), None);
        assert!(
            Error::Api {
                status: 503,
                code: String::new(),
                message: String::new()
            }
            .is_server_error()
        );
    }

    #[test]
    fn test_from_status_with_body() {
        let body = |message: &str| {
            Some(ErrorResponse {
                code: "bad_request".into(),
                message: message.into(),
            })
        };
        assert!(matches!(Error::from_status(401, body("expired")), Error::Auth(m) if m == "expired"));
        assert!(Error::from_status(404, body("gone")).is_not_found());
        assert!(Error::from_status(412, body("stale")).is_conflict());
        assert!(matches!(
            Error::from_status(422, body("bad sheet")),
            Error::Api { status: 422, code, .. } if code == "bad_request"
        ));
    }

    #[test]
    fn test_from_status_without_body() {
        assert!(Error::from_status(412, None).is_conflict());
        let err = Error::from_status(502, None);
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "Remote error (502): HTTP 502");
    }
}

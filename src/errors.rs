use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Number of raw bytes echoed back when a file cannot be loaded.
pub const PREVIEW_BYTES: usize = 200;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no separator among [{tried}] produced the columns {required}; first bytes: {preview:?}")]
    NoUsableSeparator {
        tried: String,
        required: String,
        preview: String,
    },

    #[error("file loaded but contains no usable rows; first bytes: {preview:?}")]
    Empty { preview: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Lossy preview of the head of a raw file, used in load diagnostics.
pub fn preview(bytes: &[u8]) -> String {
    let end = bytes.len().min(PREVIEW_BYTES);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_input() {
        let raw = vec![b'a'; PREVIEW_BYTES * 2];
        assert_eq!(preview(&raw).len(), PREVIEW_BYTES);
    }

    #[test]
    fn load_error_message_carries_preview() {
        let err = LoadError::Empty {
            preview: preview(b"garbage;data"),
        };
        assert!(err.to_string().contains("garbage;data"));
    }
}

use std::path::PathBuf;

/// Errors from the build service API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{method} {url} failed")]
    Transport {
        method: &'static str,
        url: String,
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{method} {url}: not found")]
    NotFound { method: &'static str, url: String },

    #[error("{method} {url}: failed to decode response")]
    Decode {
        method: &'static str,
        url: String,
        source: reqwest::Error,
    },

    #[error("failed to open archive {path}")]
    Archive {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

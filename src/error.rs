use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the fetch → extract → sink stages.
///
/// Missing fields are never errors: extraction rules resolve them to
/// their declared defaults.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("document has no `{container}` container")]
    DocumentFormat { container: String },

    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot extract text from {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[error("cannot write {}: {source}", path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaggerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed response from {service}: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unparseable timestamp {value:?} on row {row} of {}", path.display())]
    Timestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("corpus error: {0}")]
    Corpus(String),
}

impl TaggerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

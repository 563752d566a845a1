use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can abort a copy. Duplicate rows are not errors.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to open database {}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to measure {metric} of {}", path.display())]
    Measurement {
        metric: &'static str,
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to query links from {}", path.display())]
    Query {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("failed to decode row {row} of {}", path.display())]
    Scan {
        path: PathBuf,
        row: u64,
        #[source]
        source: BoxError,
    },
    #[error("failed to insert {url} into {}", path.display())]
    Insert {
        path: PathBuf,
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to {action} transaction on {}", path.display())]
    Transaction {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

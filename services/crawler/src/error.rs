//! Service-specific error types

use std::path::PathBuf;

use thiserror::Error;

/// Crawler startup and file-store errors.
///
/// Per-item crawl failures never surface here; they end up in job reports.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no account could be authenticated ({configured} configured)")]
    NoAccountReady { configured: usize },

    #[error("tracked-content ledger {path}: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: common::Error,
    },

    #[error("catalog file {path}: {source}")]
    CatalogFile {
        path: PathBuf,
        #[source]
        source: common::Error,
    },
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        assert_eq!(
            Error::NoAccountReady { configured: 3 }.to_string(),
            "no account could be authenticated (3 configured)"
        );
        let err = Error::Ledger {
            path: PathBuf::from("/data/tracked.json"),
            source: common::Error::Config("bad".into()),
        };
        assert!(err.to_string().starts_with("tracked-content ledger /data/tracked.json"));
    }

    #[test]
    fn error_source_is_chained() {
        let err = Error::CatalogFile {
            path: PathBuf::from("catalog.json"),
            source: common::Error::Config("truncated".into()),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("truncated"));
    }
}

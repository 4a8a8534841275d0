//! Error taxonomy for a single run.
//!
//! Nothing is recovered locally: every variant aborts the pass and is turned
//! into a one-line diagnostic plus a non-zero exit code by the binary.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("mail transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Exit status for this failure. `1` is reserved for usage errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Storage(_) => 3,
            Error::Auth(_) => 4,
            Error::Feed(_) => 5,
            Error::Transport(_) => 6,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("created template config at {} - edit it and run again", .0.display())]
    TemplateCreated(PathBuf),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("session is not authenticated and twitter.username/twitter.password are not set")]
    MissingCredentials,

    #[error("no {0} directory available")]
    NoDirectory(&'static str),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("ledger database error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode cookies: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed cookie file {} line {line}: {reason}", .path.display())]
    MalformedCookies {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("login flow requires unsupported step {0}")]
    UnsupportedStep(String),

    #[error("login request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unknown account {0}")]
    UnknownAccount(String),

    #[error("malformed timeline entry {entry}: {reason}")]
    Malformed { entry: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("SMTP submission to {server} failed: {reason}")]
    Smtp { server: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_and_not_usage() {
        let errors = [
            Error::Config(ConfigError::MissingCredentials),
            Error::Storage(StorageError::io(
                "/tmp/x",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )),
            Error::Auth(AuthError::Rejected("bad password".into())),
            Error::Feed(FeedError::UnknownAccount("nobody".into())),
            Error::Transport(TransportError::Smtp {
                server: "localhost:25".into(),
                reason: "connection refused".into(),
            }),
        ];

        let mut codes: Vec<u8> = errors.iter().map(Error::exit_code).collect();
        assert!(codes.iter().all(|c| *c > 1));
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_diagnostic_is_single_line() {
        let err = Error::Feed(FeedError::Malformed {
            entry: "tweet-42".into(),
            reason: "missing legacy".into(),
        });
        let msg = err.to_string();
        assert!(!msg.contains('\n'));
        assert!(msg.contains("tweet-42"));
    }
}

//! # Error Types
//!
//! Every failure the tool can hit while fetching, downloading and applying
//! the daily picture. Only [`Error::Network`] is recoverable; everything
//! else ends the run with a message on stderr.

use std::path::PathBuf;

/// Project repository, shown to users whose desktop is not supported yet.
pub const REPOSITORY_URL: &str = "https://github.com/lord63/wonderful_bing";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Currently we don't support your desktop environment: {0}\n\
         Please file an issue or make a pull request :)\n{url}",
        url = REPOSITORY_URL
    )]
    UnsupportedEnvironment(String),

    #[error("No such directory: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// Two command templates claim the same environment identifier.
    #[error("environment '{0}' is registered by more than one command template")]
    DuplicateEnvironment(String),

    /// Could not reach Bing at all (connect failure or timeout).
    #[error("Connection error, check your network please: {0}")]
    Network(String),

    /// Bing answered, but with an error status.
    #[error("Bing returned an error: {0}")]
    Upstream(String),

    #[error("Failed to parse Bing response: {0}")]
    Parse(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether retrying the whole workflow later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            Self::Network(e.to_string())
        } else if e.is_status() {
            Self::Upstream(e.to_string())
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

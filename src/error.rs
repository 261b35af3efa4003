use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// The page fetcher could not produce extracted data for a record.
#[derive(Debug)]
pub enum FetchError {
    /// Every attempt failed; `last` describes the final failure.
    Exhausted { attempts: u32, last: String },
    /// The page loaded but the configured root element was not present.
    ContentNotFound { selector: String },
    /// The record's selector could not be parsed.
    InvalidSelector { selector: String },
    /// The HTTP client could not be constructed.
    Client(reqwest::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "fetch failed after {attempts} attempt(s): {last}")
            }
            Self::ContentNotFound { selector } => {
                write!(f, "target content not found (selector `{selector}`)")
            }
            Self::InvalidSelector { selector } => write!(f, "invalid selector `{selector}`"),
            Self::Client(err) => write!(f, "http client error: {err}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Client(err) => Some(err),
            _ => None,
        }
    }
}

/// A snapshot could not be durably written or read back.
#[derive(Debug)]
pub enum PersistenceError {
    Io { path: PathBuf, source: io::Error },
    Encode { source: serde_json::Error },
    Decode { path: PathBuf, source: serde_json::Error },
    /// An entry with the same name already exists; history is write-once.
    Collision { path: PathBuf },
    /// The record id cannot be used as a path component.
    InvalidRecordId(String),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "snapshot i/o on {}: {source}", path.display()),
            Self::Encode { source } => write!(f, "snapshot encode: {source}"),
            Self::Decode { path, source } => {
                write!(f, "snapshot decode of {}: {source}", path.display())
            }
            Self::Collision { path } => {
                write!(f, "snapshot entry already exists: {}", path.display())
            }
            Self::InvalidRecordId(id) => write!(f, "record id `{id}` is not a valid store key"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode { source } | Self::Decode { source, .. } => Some(source),
            Self::Collision { .. } | Self::InvalidRecordId(_) => None,
        }
    }
}

/// Two snapshots of different records were handed to the differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidComparisonError {
    pub previous: String,
    pub current: String,
}

impl fmt::Display for InvalidComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot compare snapshots of different records (`{}` vs `{}`)",
            self.previous, self.current
        )
    }
}

impl Error for InvalidComparisonError {}

/// A best-effort notification did not go out. Logged, never escalated.
#[derive(Debug)]
pub enum NotificationDispatchError {
    Http(reqwest::Error),
    Rejected { status: u16, body: String },
    Encode(serde_json::Error),
}

impl fmt::Display for NotificationDispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "notification transport error: {err}"),
            Self::Rejected { status, body } => {
                write!(f, "notification rejected with status {status}: {body}")
            }
            Self::Encode(err) => write!(f, "notification encode error: {err}"),
        }
    }
}

impl Error for NotificationDispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Rejected { .. } => None,
        }
    }
}

impl From<reqwest::Error> for NotificationDispatchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

/// Anything that aborts a single record's run.
#[derive(Debug)]
pub enum WatchError {
    Fetch(FetchError),
    Persistence(PersistenceError),
    InvalidComparison(InvalidComparisonError),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::InvalidComparison(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::InvalidComparison(err) => Some(err),
        }
    }
}

impl From<FetchError> for WatchError {
    fn from(err: FetchError) -> Self {
        Self::Fetch(err)
    }
}

impl From<PersistenceError> for WatchError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err)
    }
}

impl From<InvalidComparisonError> for WatchError {
    fn from(err: InvalidComparisonError) -> Self {
        Self::InvalidComparison(err)
    }
}

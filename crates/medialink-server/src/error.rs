//! Error types for the medialink server

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum MediaServerError {
    Cache(String),
    Fetch(String),
    CookieMissing(PathBuf),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for MediaServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaServerError::Cache(msg) => write!(f, "Cache error: {}", msg),
            MediaServerError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            MediaServerError::CookieMissing(path) => {
                write!(f, "Cookie file {} not found", path.display())
            }
            MediaServerError::Io(err) => write!(f, "IO error: {}", err),
            MediaServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for MediaServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MediaServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaServerError {
    fn from(err: std::io::Error) -> Self {
        MediaServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for MediaServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        MediaServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MediaServerError>;

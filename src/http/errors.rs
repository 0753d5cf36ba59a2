use std::fmt::{self, Display};

/// Errors surfaced by [`super::HttpClient`].
#[derive(Debug)]
pub enum HttpError {
    /// The request never produced a response.
    Transport(String),
    /// The server answered with a status >= 400.
    Status { status: u16, url: String },
    /// The body was expected to be JSON but isn't.
    Decode(String),
    /// A response or JSON handler rejected the response.
    Handler(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Decode(err.to_string())
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Transport(msg) => write!(f, "Transport error: {}", msg),
            HttpError::Status { status, url } => write!(f, "HTTP {} for url {}", status, url),
            HttpError::Decode(msg) => write!(f, "Decode error: {}", msg),
            HttpError::Handler(msg) => write!(f, "Handler error: {}", msg),
        }
    }
}

impl std::error::Error for HttpError {}

use std::fmt;

use thiserror::Error;

/// Final error of a fetch call. Every variant that concerns a single
/// transfer carries the URL so the original fault can be reconstructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("empty batch: no urls to fetch")]
    EmptyBatch,
    #[error("cannot open transfer for {url}: {message}")]
    Setup { url: String, message: String },
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("transport error ({kind}): {message} ({url})")]
    Transport {
        url: String,
        kind: TransportErrorKind,
        message: String,
    },
    #[error("http error {status} downloading {url}")]
    Status { url: String, status: u16 },
    #[error("reactor error: {0}")]
    Reactor(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl FetchError {
    /// URL of the transfer that caused the error, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Setup { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Status { url, .. } => Some(url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Http2,
    Tls,
    Timeout,
    Redirect,
    TooLarge,
    Body,
    Sink,
    Request,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Dns => write!(f, "dns resolution failed"),
            TransportErrorKind::Connect => write!(f, "connect failed"),
            TransportErrorKind::Http2 => write!(f, "http2 stream error"),
            TransportErrorKind::Tls => write!(f, "tls handshake failed"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Redirect => write!(f, "redirect limit exceeded"),
            TransportErrorKind::TooLarge => write!(f, "response too large"),
            TransportErrorKind::Body => write!(f, "body read failed"),
            TransportErrorKind::Sink => write!(f, "body sink failed"),
            TransportErrorKind::Request => write!(f, "request failed"),
        }
    }
}

/// Failure of a single transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn into_fetch_error(self, url: &str) -> FetchError {
        FetchError::Transport {
            url: url.to_string(),
            kind: self.kind,
            message: self.message,
        }
    }
}

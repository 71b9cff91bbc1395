//! Retry classification and backoff schedule.
//!
//! Everything here is pure: the reactor feeds a [`Condition`] observed on a
//! finished transfer together with the job's retry count and gets back a
//! [`Decision`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FetchError, TransportError, TransportErrorKind};

/// Transport failures that are always worth another attempt.
const RETRYABLE_TRANSPORT: &[TransportErrorKind] = &[
    TransportErrorKind::Dns,
    TransportErrorKind::Connect,
    TransportErrorKind::Http2,
];

/// A TLS failure is retried only when the peer reset the connection.
const TLS_RESET_MARKER: &str = "connection reset by peer";

pub const DEFAULT_RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// What went wrong with a finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Transport(TransportError),
    Status(u16),
}

impl Condition {
    pub fn into_error(self, url: &str) -> FetchError {
        match self {
            Condition::Transport(err) => err.into_fetch_error(url),
            Condition::Status(status) => FetchError::Status {
                url: url.to_string(),
                status,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Restart the transfer after `delay`; `attempt` is the retry count after incrementing.
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retryable_statuses: Vec<u16>,
    /// Delay before the second retry.
    pub second_delay: Duration,
    /// Delay before the third and every later retry.
    pub later_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            second_delay: Duration::from_millis(100),
            later_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn is_retryable(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Transport(err) => is_retryable_transport(err.kind, &err.message),
            Condition::Status(status) => self.retryable_statuses.contains(status),
        }
    }

    /// Delay before restarting a job whose retry count (after increment) is `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match attempt {
            0 | 1 => Duration::ZERO,
            2 => self.second_delay,
            _ => self.later_delay,
        }
    }

    pub fn decide(&self, retries: u32, condition: &Condition) -> Decision {
        if retries >= self.max_retries || !self.is_retryable(condition) {
            return Decision::GiveUp;
        }
        let attempt = retries + 1;
        Decision::Retry {
            attempt,
            delay: self.backoff(attempt),
        }
    }
}

pub fn is_retryable_transport(kind: TransportErrorKind, message: &str) -> bool {
    if RETRYABLE_TRANSPORT.contains(&kind) {
        return true;
    }
    kind == TransportErrorKind::Tls && message.to_ascii_lowercase().contains(TLS_RESET_MARKER)
}

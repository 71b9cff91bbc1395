use std::fmt;

use bytes::Bytes;

use crate::decode::{decode_body, DecodeError, DecodedBody};

/// Position of a URL within the batch it was submitted in.
pub type JobId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Started,
    Completed,
    Failed,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Aborted
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Started => write!(f, "started"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// A fetched payload, keyed by the id of the job that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: JobId,
    pub url: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Response {
    pub fn new(
        id: JobId,
        url: impl Into<String>,
        bytes: impl Into<Bytes>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            bytes: bytes.into(),
            content_type,
        }
    }

    /// Decodes the body to UTF-8 text.
    pub fn text(&self) -> Result<DecodedBody, DecodeError> {
        decode_body(&self.bytes, self.content_type.as_deref())
    }
}

/// Raw outcome of one transfer attempt, before status classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub status: u16,
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl Transfer {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: None,
        }
    }
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    ChunkStarted { index: usize, size: usize },
    ChunkFinished { index: usize },
    JobStarted { job_id: JobId, in_flight: usize },
    JobRetried { job_id: JobId, attempt: u32 },
    JobFinished { job_id: JobId, status: JobStatus },
    BatchAborted { cancelled: usize },
}

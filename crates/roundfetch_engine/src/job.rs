use std::sync::Arc;

use crate::{FetchError, JobId, JobStatus, RequestOptions, Response};

/// One URL fetch with its own status and retry state.
///
/// A job is owned by the batch downloader while queued, by the reactor while
/// started, and handed back once it reaches a terminal status.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    url: String,
    options: Arc<RequestOptions>,
    status: JobStatus,
    retries: u32,
    response: Option<Response>,
    error: Option<FetchError>,
}

impl Job {
    pub fn new(id: JobId, url: impl Into<String>, options: Arc<RequestOptions>) -> Self {
        Self {
            id,
            url: url.into(),
            options,
            status: JobStatus::Queued,
            retries: 0,
            response: None,
            error: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &Arc<RequestOptions> {
        &self.options
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&FetchError> {
        self.error.as_ref()
    }

    /// Converts a terminal job into its outcome.
    pub fn into_result(self) -> Result<Response, FetchError> {
        match (self.status, self.response, self.error) {
            (JobStatus::Completed, Some(response), _) => Ok(response),
            (JobStatus::Failed, _, Some(error)) => Err(error),
            (status, _, _) => Err(FetchError::Reactor(format!(
                "job {} has no outcome in status {status} ({})",
                self.id, self.url
            ))),
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Started;
    }

    /// Counts one more retry and returns the new retry count.
    pub(crate) fn record_retry(&mut self) -> u32 {
        self.retries += 1;
        self.retries
    }

    pub(crate) fn complete(&mut self, response: Response) {
        self.status = JobStatus::Completed;
        self.response = Some(response);
    }

    pub(crate) fn fail(&mut self, error: FetchError) {
        self.status = JobStatus::Failed;
        self.error = Some(error);
    }

    pub(crate) fn abort(&mut self) {
        self.status = JobStatus::Aborted;
    }
}

//! Transfer reactor: drives every registered job through one shared
//! multiplex context.
//!
//! Transfers run as tasks in a single `JoinSet`. The reactor's own state is
//! only touched through `&mut self` (`register`, `poll`, `cancel`), so a
//! reactor has exactly one writer even though socket I/O is concurrent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_warn};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use url::Url;

use crate::retry::{Condition, Decision, RetryPolicy};
use crate::{
    BatchEvent, FetchError, Job, JobId, ProgressSink, Response, Transfer, Transport,
    TransportError,
};

pub const DEFAULT_POLL_WAIT: Duration = Duration::from_millis(100);

type TransferResult = Result<Transfer, TransportError>;

/// Output of one transfer task, tagged so stale results can be told apart.
type Joined = (JobId, u64, TransferResult);

struct InFlight {
    job: Job,
    url: Url,
    token: u64,
    handle: AbortHandle,
}

pub struct Reactor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    poll_wait: Duration,
    transfers: JoinSet<Joined>,
    in_flight: HashMap<JobId, InFlight>,
    next_token: u64,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Reactor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, poll_wait: Duration) -> Self {
        Self {
            transport,
            policy,
            poll_wait,
            transfers: JoinSet::new(),
            in_flight: HashMap::new(),
            next_token: 0,
            sink: None,
        }
    }

    pub fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sink = Some(sink);
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of started jobs.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Opens a transfer for `job`.
    ///
    /// A URL or option set that cannot be turned into a request is a setup
    /// error; it is never retried and the job is dropped.
    pub fn register(&mut self, mut job: Job) -> Result<(), FetchError> {
        let setup = |message: String| FetchError::Setup {
            url: job.url().to_string(),
            message,
        };
        let url = Url::parse(job.url()).map_err(|err| setup(err.to_string()))?;
        job.options().header_map().map_err(setup)?;

        if self.in_flight.contains_key(&job.id()) {
            return Err(FetchError::Reactor(format!(
                "job {} is already registered",
                job.id()
            )));
        }

        job.start();
        engine_debug!("job {} started: {}", job.id(), job.url());
        self.spawn(job, url, Duration::ZERO);
        Ok(())
    }

    /// Advances all transfers by one step.
    ///
    /// Waits at most `poll_wait` for a transfer to finish, then harvests every
    /// other transfer that is already done. Returns the jobs that reached a
    /// terminal status during this step. An error here means the multiplex
    /// context itself is broken and is always fatal.
    pub async fn poll(&mut self) -> Result<Vec<Job>, FetchError> {
        if self.in_flight.is_empty() {
            return Ok(Vec::new());
        }

        let mut joined = Vec::new();
        if let Ok(Some(first)) = tokio::time::timeout(self.poll_wait, self.transfers.join_next()).await {
            joined.push(first);
        }
        while let Some(next) = self.transfers.try_join_next() {
            joined.push(next);
        }

        let mut finished = Vec::new();
        for result in joined {
            let Some((id, token, outcome)) = unpack(result)? else {
                continue;
            };
            let Some(entry) = self.take_current(id, token) else {
                continue;
            };
            if let Some(job) = self.settle(entry, outcome) {
                finished.push(job);
            }
        }
        Ok(finished)
    }

    /// Releases the transfer of an in-flight job without classifying it.
    pub fn cancel(&mut self, id: JobId) -> Option<Job> {
        let entry = self.in_flight.remove(&id)?;
        entry.handle.abort();
        let mut job = entry.job;
        job.abort();
        Some(job)
    }

    /// Cancels every in-flight job and forgets any transfer still in the set.
    pub fn cancel_all(&mut self) -> Vec<Job> {
        let ids: Vec<JobId> = self.in_flight.keys().copied().collect();
        let cancelled = ids.into_iter().filter_map(|id| self.cancel(id)).collect();
        self.transfers.abort_all();
        self.transfers.detach_all();
        cancelled
    }

    fn spawn(&mut self, job: Job, url: Url, delay: Duration) {
        let id = job.id();
        let token = self.next_token;
        self.next_token += 1;

        let transport = Arc::clone(&self.transport);
        let options = Arc::clone(job.options());
        let target = url.clone();
        let handle = self.transfers.spawn(async move {
            // Backoff lives inside this transfer so other jobs keep moving.
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let outcome = transport.transfer(&target, &options).await;
            (id, token, outcome)
        });

        self.in_flight.insert(
            id,
            InFlight {
                job,
                url,
                token,
                handle,
            },
        );
    }

    fn take_current(&mut self, id: JobId, token: u64) -> Option<InFlight> {
        match self.in_flight.get(&id) {
            Some(entry) if entry.token == token => self.in_flight.remove(&id),
            _ => None,
        }
    }

    fn settle(&mut self, entry: InFlight, outcome: TransferResult) -> Option<Job> {
        let InFlight { mut job, url, .. } = entry;

        let condition = match outcome {
            Ok(transfer) if transfer.status == 200 => {
                engine_debug!(
                    "job {} completed: {} bytes from {}",
                    job.id(),
                    transfer.body.len(),
                    job.url()
                );
                let response =
                    Response::new(job.id(), job.url(), transfer.body, transfer.content_type);
                job.complete(response);
                return Some(job);
            }
            Ok(transfer) => Condition::Status(transfer.status),
            Err(err) => Condition::Transport(err),
        };

        match self.policy.decide(job.retries(), &condition) {
            Decision::Retry { attempt, delay } => {
                let counted = job.record_retry();
                debug_assert_eq!(counted, attempt);
                engine_warn!(
                    "job {} retry {} in {:?} after {:?} ({})",
                    job.id(),
                    attempt,
                    delay,
                    condition,
                    job.url()
                );
                if let Some(sink) = &self.sink {
                    sink.emit(BatchEvent::JobRetried {
                        job_id: job.id(),
                        attempt,
                    });
                }
                self.spawn(job, url, delay);
                None
            }
            Decision::GiveUp => {
                let error = condition.into_error(job.url());
                engine_error!("job {} failed after {} retries: {}", job.id(), job.retries(), error);
                job.fail(error);
                Some(job)
            }
        }
    }
}

fn unpack(result: Result<Joined, JoinError>) -> Result<Option<Joined>, FetchError> {
    match result {
        Ok(joined) => Ok(Some(joined)),
        Err(err) if err.is_cancelled() => Ok(None),
        Err(err) => Err(FetchError::Reactor(format!("transfer task failed: {err}"))),
    }
}

use std::collections::VecDeque;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info};

use crate::{
    BatchEvent, DownloaderConfig, FetchError, Job, ProgressSink, Reactor, ReqwestTransport,
    RequestOptions, Response, ResponseCollector, Transport,
};

/// Turns URL lists into ordered response lists.
#[async_trait::async_trait]
pub trait Downloader: Send {
    async fn fetch_one(
        &mut self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Response, FetchError> {
        let mut responses = self.fetch_batch(&[url.to_string()], options).await?;
        responses.pop().ok_or(FetchError::EmptyBatch)
    }

    /// Fetches every URL; the result has one response per URL, in `urls` order.
    /// Any unrecoverable failure aborts the whole call and no partial result is returned.
    async fn fetch_batch(
        &mut self,
        urls: &[String],
        options: &RequestOptions,
    ) -> Result<Vec<Response>, FetchError>;
}

/// Chunked, capped batch fetching over one [`Reactor`].
pub struct BatchDownloader {
    config: DownloaderConfig,
    reactor: Reactor,
    collector: ResponseCollector,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl BatchDownloader {
    /// Downloader over a fresh `reqwest` client built from `config.settings`.
    pub fn new(config: DownloaderConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(config.settings.clone())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: DownloaderConfig, transport: Arc<dyn Transport>) -> Self {
        let reactor = Reactor::new(transport, config.retry.clone(), config.poll_wait);
        Self {
            config,
            reactor,
            collector: ResponseCollector::new(),
            sink: None,
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.reactor.set_progress_sink(Arc::clone(&sink));
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    async fn run_batch(
        &mut self,
        urls: &[String],
        options: &Arc<RequestOptions>,
    ) -> Result<(), FetchError> {
        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = urls.len().div_ceil(chunk_size);

        for (index, chunk) in urls.chunks(chunk_size).enumerate() {
            self.emit(BatchEvent::ChunkStarted {
                index,
                size: chunk.len(),
            });
            self.run_chunk(index * chunk_size, chunk, options).await?;
            self.emit(BatchEvent::ChunkFinished { index });

            if index + 1 < chunk_count && !self.config.chunk_pause.is_zero() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
        }
        Ok(())
    }

    async fn run_chunk(
        &mut self,
        offset: usize,
        chunk: &[String],
        options: &Arc<RequestOptions>,
    ) -> Result<(), FetchError> {
        let max_jobs = self.config.max_jobs.max(1);
        let mut queue: VecDeque<Job> = chunk
            .iter()
            .enumerate()
            .map(|(i, url)| Job::new(offset + i, url.as_str(), Arc::clone(options)))
            .collect();
        engine_debug!("chunk at {} with {} job(s)", offset, queue.len());

        loop {
            while self.reactor.in_flight() < max_jobs {
                let Some(job) = queue.pop_front() else {
                    break;
                };
                let job_id = job.id();
                self.reactor.register(job)?;
                self.emit(BatchEvent::JobStarted {
                    job_id,
                    in_flight: self.reactor.in_flight(),
                });
            }
            debug_assert!(self.reactor.in_flight() <= max_jobs);

            if self.reactor.is_idle() && queue.is_empty() {
                return Ok(());
            }

            for job in self.reactor.poll().await? {
                self.emit(BatchEvent::JobFinished {
                    job_id: job.id(),
                    status: job.status(),
                });
                self.collector.add(job.into_result()?);
            }
        }
    }

    fn abort(&mut self) {
        let cancelled = self.reactor.cancel_all();
        self.collector.clear();
        engine_error!("batch aborted, {} transfer(s) cancelled", cancelled.len());
        self.emit(BatchEvent::BatchAborted {
            cancelled: cancelled.len(),
        });
    }
}

#[async_trait::async_trait]
impl Downloader for BatchDownloader {
    async fn fetch_batch(
        &mut self,
        urls: &[String],
        options: &RequestOptions,
    ) -> Result<Vec<Response>, FetchError> {
        if urls.is_empty() {
            return Err(FetchError::EmptyBatch);
        }
        let options = Arc::new(
            options
                .clone()
                .with_default_user_agent(self.config.settings.user_agent.as_deref()),
        );

        // A previous call may have been dropped mid-flight.
        if !self.reactor.is_idle() || !self.collector.is_empty() {
            self.reactor.cancel_all();
            self.collector.clear();
        }

        if let Err(err) = self.run_batch(urls, &options).await {
            self.abort();
            return Err(err);
        }

        let responses = self.collector.drain();
        if responses.len() != urls.len() {
            return Err(FetchError::Reactor(format!(
                "expected {} responses, collected {}",
                urls.len(),
                responses.len()
            )));
        }
        engine_info!("fetched {} url(s)", responses.len());
        Ok(responses)
    }
}

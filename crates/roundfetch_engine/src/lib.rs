//! Roundfetch engine: concurrent batch fetching with retry and paged rounds.
mod blocking;
mod collector;
mod config;
mod decode;
mod downloader;
mod error;
mod job;
mod progress;
mod query;
mod reactor;
mod retry;
mod rounds;
mod sink;
mod transport;
mod types;

pub use blocking::BlockingDownloader;
pub use collector::ResponseCollector;
pub use config::{
    ConfigError, DownloaderConfig, DEFAULT_CHUNK_PAUSE, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_JOBS,
};
pub use decode::{decode_body, DecodeError, DecodedBody};
pub use downloader::{BatchDownloader, Downloader};
pub use error::{FetchError, TransportError, TransportErrorKind};
pub use job::Job;
pub use progress::{ChannelProgressSink, ProgressSink};
pub use query::{build_query, encode_query_component, page_urls};
pub use reactor::{Reactor, DEFAULT_POLL_WAIT};
pub use retry::{is_retryable_transport, Condition, Decision, RetryPolicy};
pub use rounds::{run_paged, PageHandler, RoundError};
pub use transport::{
    classify_transport_error, ErrorFlags, FetchSettings, ReqwestTransport, RequestOptions,
    Transport,
};
pub use types::{BatchEvent, JobId, JobStatus, Response, Transfer};

pub use roundfetch_core::{Phase, Task, TaskError};

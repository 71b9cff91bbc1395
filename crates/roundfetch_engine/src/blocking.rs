use tokio::runtime::Runtime;

use crate::{
    BatchDownloader, Downloader, DownloaderConfig, FetchError, RequestOptions, Response,
};

/// Synchronous facade over [`BatchDownloader`] with its own runtime.
///
/// Must not be used from inside another tokio runtime.
pub struct BlockingDownloader {
    runtime: Runtime,
    inner: BatchDownloader,
}

impl BlockingDownloader {
    pub fn new(config: DownloaderConfig) -> Result<Self, FetchError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| FetchError::Runtime(err.to_string()))?;
        let inner = {
            let _guard = runtime.enter();
            BatchDownloader::new(config)?
        };
        Ok(Self { runtime, inner })
    }

    pub fn from_downloader(inner: BatchDownloader) -> Result<Self, FetchError> {
        let runtime = Runtime::new().map_err(|err| FetchError::Runtime(err.to_string()))?;
        Ok(Self { runtime, inner })
    }

    pub fn fetch_one(&mut self, url: &str, options: &RequestOptions) -> Result<Response, FetchError> {
        self.runtime.block_on(self.inner.fetch_one(url, options))
    }

    pub fn fetch_batch(
        &mut self,
        urls: &[String],
        options: &RequestOptions,
    ) -> Result<Vec<Response>, FetchError> {
        self.runtime.block_on(self.inner.fetch_batch(urls, options))
    }
}

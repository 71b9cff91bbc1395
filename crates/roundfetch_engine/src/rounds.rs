//! Main + extra round orchestration over a [`Task`].
//!
//! The business layer supplies a [`PageHandler`] that parses payloads,
//! decides whether a first page needs follow-up pages and merges those pages
//! into the first result.

use std::fmt;

use engine_logging::engine_info;
use roundfetch_core::{Task, TaskError};
use thiserror::Error;

use crate::{Downloader, FetchError, RequestOptions, Response};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("no urls to fetch")]
    NoUrls,
    #[error("download error: {0}")]
    Download(#[from] FetchError),
    #[error("task error: {0}")]
    Task(#[from] TaskError),
    #[error("response error at {index} ({url}): {message}")]
    Handler {
        index: usize,
        url: String,
        message: String,
    },
}

pub trait PageHandler {
    type Output;
    type Error: fmt::Display;

    fn parse(&self, response: &Response) -> Result<Self::Output, Self::Error>;

    /// Follow-up URLs needed to complete `first`; empty when it is complete.
    fn extra_urls(&self, first: &Self::Output, response: &Response) -> Vec<String>;

    fn merge(&self, into: &mut Self::Output, page: Self::Output);
}

/// Runs the main round for `urls`, then an extra round if any first page
/// asked for more, and returns one merged result per URL in `urls` order.
pub async fn run_paged<D, H>(
    downloader: &mut D,
    urls: Vec<String>,
    options: &RequestOptions,
    handler: &H,
) -> Result<Vec<H::Output>, RoundError>
where
    D: Downloader + ?Sized,
    H: PageHandler,
{
    if urls.is_empty() {
        return Err(RoundError::NoUrls);
    }

    let mut task = Task::new(urls);
    let responses = downloader.fetch_batch(&task.get_urls()?, options).await?;
    for (index, response) in responses.iter().enumerate() {
        let first = parse(handler, index, response)?;
        let extra = handler.extra_urls(&first, response);
        task.set_slot(index, first)?;
        if !extra.is_empty() {
            task.add_extra_urls(extra, index)?;
        }
    }

    if task.has_extra_urls() {
        let extra_urls = task.get_urls()?;
        engine_info!("fetching {} extra page(s)", extra_urls.len());
        let responses = downloader.fetch_batch(&extra_urls, options).await?;
        for (index, response) in responses.iter().enumerate() {
            let page = parse(handler, index, response)?;
            handler.merge(task.get_slot_mut(index)?, page);
        }
    }

    Ok(task.into_results()?)
}

fn parse<H: PageHandler>(
    handler: &H,
    index: usize,
    response: &Response,
) -> Result<H::Output, RoundError> {
    handler.parse(response).map_err(|err| RoundError::Handler {
        index,
        url: response.url.clone(),
        message: err.to_string(),
    })
}

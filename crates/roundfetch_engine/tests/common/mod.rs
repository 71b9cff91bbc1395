#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use roundfetch_engine::{
    BatchEvent, ProgressSink, RequestOptions, Transfer, Transport, TransportError,
};
use url::Url;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://fake.test/item/{i}"))
        .collect()
}

/// In-process transport with per-URL scripted replies and delays.
///
/// URLs without a script answer `200` with the URL as body.
#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<Transfer, TransportError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    default_delay: Mutex<Duration>,
    attempts: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, url: &str, replies: Vec<Result<Transfer, TransportError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
    }

    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    pub fn default_delay(&self, delay: Duration) {
        *self.default_delay.lock().unwrap() = delay;
    }

    pub fn attempts_for(&self, url: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the active counter even when the transfer is aborted.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn transfer(
        &self,
        url: &Url,
        _options: &RequestOptions,
    ) -> Result<Transfer, TransportError> {
        let key = url.to_string();
        self.attempts
            .lock()
            .unwrap()
            .push((key.clone(), Instant::now()));

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or_else(|| *self.default_delay.lock().unwrap());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        reply.unwrap_or_else(|| Ok(Transfer::new(200, key.clone())))
    }
}

/// Records every batch event with the instant it was emitted.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Instant, BatchEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn timed(&self) -> Vec<(Instant, BatchEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn instant_of(&self, wanted: &BatchEvent) -> Option<Instant> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|(_, event)| event == wanted)
            .map(|(at, _)| *at)
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: BatchEvent) {
        self.events.lock().unwrap().push((Instant::now(), event));
    }
}

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use roundfetch_engine::{
    BatchDownloader, BatchEvent, Downloader, DownloaderConfig, FetchError, JobStatus,
    RequestOptions, Transfer, TransportError, TransportErrorKind,
};

use common::{init_logging, urls, FakeTransport, RecordingSink};

fn config(max_jobs: usize, chunk_size: usize, chunk_pause: Duration) -> DownloaderConfig {
    DownloaderConfig {
        max_jobs,
        chunk_size,
        chunk_pause,
        ..DownloaderConfig::default()
    }
}

fn downloader(
    config: DownloaderConfig,
    fake: &Arc<FakeTransport>,
    sink: &Arc<RecordingSink>,
) -> BatchDownloader {
    BatchDownloader::with_transport(config, fake.clone()).with_progress_sink(sink.clone())
}

fn connect_refused() -> Result<Transfer, TransportError> {
    Err(TransportError::new(
        TransportErrorKind::Connect,
        "tcp connect error: Connection refused",
    ))
}

#[tokio::test]
async fn concurrency_never_exceeds_max_jobs() {
    init_logging();
    let fake = FakeTransport::new();
    fake.default_delay(Duration::from_millis(20));
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(4, 50, Duration::ZERO), &fake, &sink);

    let list = urls(30);
    let responses = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(responses.len(), 30);
    assert_eq!(fake.peak(), 4);
    for event in sink.events() {
        if let BatchEvent::JobStarted { in_flight, .. } = event {
            assert!(in_flight <= 4, "{in_flight} jobs in flight");
        }
    }
}

#[tokio::test]
async fn batch_is_split_into_paced_chunks() {
    init_logging();
    let pause = Duration::from_millis(200);
    let fake = FakeTransport::new();
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(12, 50, pause), &fake, &sink);

    let list = urls(120);
    let responses = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap();
    let returned_at = Instant::now();
    assert_eq!(responses.len(), 120);

    let chunks: Vec<BatchEvent> = sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, BatchEvent::ChunkStarted { .. }))
        .collect();
    assert_eq!(
        chunks,
        vec![
            BatchEvent::ChunkStarted { index: 0, size: 50 },
            BatchEvent::ChunkStarted { index: 1, size: 50 },
            BatchEvent::ChunkStarted { index: 2, size: 20 },
        ]
    );

    for index in 0..2 {
        let finished = sink
            .instant_of(&BatchEvent::ChunkFinished { index })
            .unwrap();
        let next = sink
            .instant_of(&BatchEvent::ChunkStarted {
                index: index + 1,
                size: if index == 0 { 50 } else { 20 },
            })
            .unwrap();
        assert!(next.duration_since(finished) >= pause);
    }

    let last = sink
        .instant_of(&BatchEvent::ChunkFinished { index: 2 })
        .unwrap();
    assert!(returned_at.duration_since(last) < pause);
}

#[tokio::test]
async fn responses_follow_submission_order_not_completion_order() {
    init_logging();
    let fake = FakeTransport::new();
    let list = urls(8);
    for (i, url) in list.iter().enumerate() {
        fake.delay(url, Duration::from_millis(15 * (8 - i as u64)));
    }
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(8, 50, Duration::ZERO), &fake, &sink);

    let responses = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap();

    let got: Vec<(usize, String)> = responses
        .iter()
        .map(|response| (response.id, response.url.clone()))
        .collect();
    let want: Vec<(usize, String)> = list.iter().cloned().enumerate().collect();
    assert_eq!(got, want);
    assert_eq!(&responses[5].bytes[..], list[5].as_bytes());

    let finished: Vec<usize> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            BatchEvent::JobFinished { job_id, .. } => Some(job_id),
            _ => None,
        })
        .collect();
    assert_eq!(finished.first(), Some(&7));
}

#[tokio::test]
async fn fatal_failure_aborts_whole_batch() {
    init_logging();
    let fake = FakeTransport::new();
    fake.default_delay(Duration::from_millis(300));
    let list = urls(10);
    fake.delay(&list[3], Duration::from_millis(10));
    fake.script(&list[3], vec![Ok(Transfer::new(404, "gone"))]);
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(4, 50, Duration::ZERO), &fake, &sink);

    let err = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            url: list[3].clone(),
            status: 404
        }
    );
    assert_eq!(err.url(), Some(list[3].as_str()));
    assert_eq!(fake.attempt_count(), 4);

    let events = sink.events();
    assert!(events.contains(&BatchEvent::JobFinished {
        job_id: 3,
        status: JobStatus::Failed
    }));
    assert_eq!(events.last(), Some(&BatchEvent::BatchAborted { cancelled: 3 }));
    assert!(!events
        .iter()
        .any(|event| matches!(event, BatchEvent::JobStarted { job_id, .. } if *job_id >= 4)));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fake.active(), 0);
}

#[tokio::test]
async fn downloader_is_reusable_after_abort() {
    init_logging();
    let fake = FakeTransport::new();
    let list = urls(5);
    fake.script(&list[1], vec![Ok(Transfer::new(403, ""))]);
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(2, 50, Duration::ZERO), &fake, &sink);

    assert!(downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .is_err());

    let responses = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(responses.len(), 5);
    assert_eq!(responses[1].url, list[1]);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    init_logging();
    let fake = FakeTransport::new();
    let sink = RecordingSink::new();
    let mut downloader = downloader(DownloaderConfig::default(), &fake, &sink);

    let err = downloader
        .fetch_batch(&[], &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::EmptyBatch);
    assert_eq!(fake.attempt_count(), 0);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn malformed_url_is_setup_error() {
    init_logging();
    let fake = FakeTransport::new();
    fake.default_delay(Duration::from_millis(100));
    let sink = RecordingSink::new();
    let mut downloader = downloader(DownloaderConfig::default(), &fake, &sink);

    let list = vec![
        "https://fake.test/ok".to_string(),
        "not a url".to_string(),
        "https://fake.test/later".to_string(),
    ];
    let err = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(&err, FetchError::Setup { url, .. } if url == "not a url"));
    assert_eq!(
        sink.events().last(),
        Some(&BatchEvent::BatchAborted { cancelled: 1 })
    );
}

#[tokio::test]
async fn backoff_grows_and_does_not_stall_other_jobs() {
    init_logging();
    let fake = FakeTransport::new();
    let list = urls(2);
    fake.script(
        &list[0],
        vec![connect_refused(), connect_refused(), connect_refused()],
    );
    fake.delay(&list[1], Duration::from_millis(250));
    let sink = RecordingSink::new();
    let mut downloader = downloader(config(4, 50, Duration::ZERO), &fake, &sink);

    let responses = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(responses.len(), 2);

    let attempts = fake.attempts_for(&list[0]);
    assert_eq!(attempts.len(), 4);
    let gaps: Vec<Duration> = attempts
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect();
    assert!(gaps[0] < Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[1] >= Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[2] >= Duration::from_millis(500), "{gaps:?}");

    let other_done = sink
        .instant_of(&BatchEvent::JobFinished {
            job_id: 1,
            status: JobStatus::Completed,
        })
        .unwrap();
    assert!(other_done > attempts[2] && other_done < attempts[3]);

    let retried: Vec<u32> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            BatchEvent::JobRetried { job_id: 0, attempt } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retried, vec![1, 2, 3]);
}

#[tokio::test]
async fn gives_up_after_three_retries() {
    init_logging();
    let fake = FakeTransport::new();
    let list = urls(1);
    fake.script(
        &list[0],
        vec![
            connect_refused(),
            connect_refused(),
            connect_refused(),
            connect_refused(),
        ],
    );
    let sink = RecordingSink::new();
    let mut downloader = downloader(DownloaderConfig::default(), &fake, &sink);

    let err = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(fake.attempts_for(&list[0]).len(), 4);
    match err {
        FetchError::Transport { url, kind, message } => {
            assert_eq!(url, list[0]);
            assert_eq!(kind, TransportErrorKind::Connect);
            assert!(message.contains("Connection refused"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_is_not_retried() {
    init_logging();
    let fake = FakeTransport::new();
    let list = urls(1);
    fake.script(
        &list[0],
        vec![Err(TransportError::new(
            TransportErrorKind::Timeout,
            "operation timed out",
        ))],
    );
    let sink = RecordingSink::new();
    let mut downloader = downloader(DownloaderConfig::default(), &fake, &sink);

    let err = downloader
        .fetch_batch(&list, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(fake.attempts_for(&list[0]).len(), 1);
    assert!(matches!(
        err,
        FetchError::Transport {
            kind: TransportErrorKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_one_returns_single_response() {
    init_logging();
    let fake = FakeTransport::new();
    let sink = RecordingSink::new();
    let mut downloader = downloader(DownloaderConfig::default(), &fake, &sink);

    let response = downloader
        .fetch_one("https://fake.test/one", &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(response.id, 0);
    assert_eq!(&response.bytes[..], b"https://fake.test/one");
}

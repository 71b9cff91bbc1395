mod common;

use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use roundfetch_engine::{ConfigError, DownloaderConfig, DEFAULT_CHUNK_SIZE};

use common::init_logging;

#[test]
fn loads_partial_config_from_file() {
    init_logging();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(
    max_jobs: 6,
    chunk_pause: (secs: 0, nanos: 20000000),
    settings: (
        user_agent: Some("roundfetch/0.1"),
        max_bytes: Some(1048576),
    ),
    retry: (max_retries: 1),
)"#
    )
    .unwrap();

    let config = DownloaderConfig::load(file.path()).unwrap();
    assert_eq!(config.max_jobs, 6);
    assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    assert_eq!(config.chunk_pause, Duration::from_millis(20));
    assert_eq!(config.settings.user_agent.as_deref(), Some("roundfetch/0.1"));
    assert_eq!(config.settings.max_bytes, Some(1_048_576));
    assert_eq!(config.settings.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.retryable_statuses, vec![500, 502, 503, 504]);
}

#[test]
fn saved_config_loads_back() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("downloader.ron");
    let config = DownloaderConfig {
        max_jobs: 3,
        ..DownloaderConfig::default().with_user_agent("saved/1")
    };
    std::fs::write(&path, config.to_ron_string().unwrap()).unwrap();

    assert_eq!(DownloaderConfig::load(&path).unwrap(), config);
}

#[test]
fn missing_file_is_io_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.ron");
    let err = DownloaderConfig::load(&path).unwrap_err();
    match err {
        ConfigError::Io { path: reported, .. } => {
            assert_eq!(reported, path.display().to_string())
        }
        other => panic!("expected io error, got {other:?}"),
    }
}

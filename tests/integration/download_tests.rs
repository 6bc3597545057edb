//! Download manager behaviour through the public API.

use std::sync::Arc;
use std::time::Duration;

use mediavault::download::{DownloadConfig, DownloadManager, DownloadRequest, SeenUrlSet};
use mediavault::progress::{ChannelSink, DownloadPhase, ProgressUpdate};
use mediavault::signal::CancelToken;
use tempfile::tempdir;

use super::support::MemorySource;

fn config(chunk_size: usize, max_concurrent: usize) -> DownloadConfig {
    DownloadConfig {
        chunk_size,
        max_concurrent,
    }
}

#[tokio::test]
async fn test_same_url_fetched_once_per_run() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert("https://i.example/a.jpg", vec![7u8; 100]);
    let (sink, mut rx) = ChannelSink::new();
    let manager = DownloadManager::new(DownloadConfig::default(), source.clone())
        .unwrap()
        .with_sink(Arc::new(sink));

    let first = manager
        .submit(DownloadRequest::new("https://i.example/a.jpg", dir.path(), "a.jpg"))
        .await;
    assert!(first.unwrap().is_completed());
    let mut first_events = 0;
    while rx.try_recv().is_ok() {
        first_events += 1;
    }
    assert!(first_events >= 2);

    let second = manager
        .submit(DownloadRequest::new("https://i.example/a.jpg", dir.path(), "other-name.jpg"))
        .await;
    assert!(second.is_none());
    assert!(rx.try_recv().is_err(), "a skipped submission emits nothing");
    assert_eq!(source.opens(), 1);
    assert!(!dir.path().join("other-name.jpg").exists());
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions_open_once() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::with_chunking(10, Duration::from_millis(5)));
    source.insert("https://i.example/a.jpg", vec![1u8; 50]);
    let manager = Arc::new(DownloadManager::new(config(10, 4), source.clone()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let request =
                DownloadRequest::new("https://i.example/a.jpg", dir.path(), format!("a{i}.jpg"));
            tokio::spawn(async move { manager.submit(request).await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            completed += 1;
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(source.opens(), 1);
}

#[tokio::test]
async fn test_seeded_seen_set_skips() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert("https://i.example/a.jpg", vec![1u8; 10]);
    let seen: SeenUrlSet = ["https://i.example/a.jpg"].into_iter().collect();
    let manager = DownloadManager::with_seen(DownloadConfig::default(), source.clone(), seen).unwrap();

    let outcome = manager
        .submit(DownloadRequest::new("https://i.example/a.jpg", dir.path(), "a.jpg"))
        .await;
    assert!(outcome.is_none());
    assert_eq!(source.opens(), 0);
}

#[tokio::test]
async fn test_404_fails_cleanly_and_can_be_retried() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let (sink, mut rx) = ChannelSink::new();
    let manager = DownloadManager::new(DownloadConfig::default(), source.clone())
        .unwrap()
        .with_sink(Arc::new(sink));
    let request = DownloadRequest::new("https://i.example/late.jpg", dir.path(), "late.jpg");

    let failed = manager.submit(request.clone()).await.unwrap();
    let mut failed_events = 0;
    while let Ok(update) = rx.try_recv() {
        if let ProgressUpdate::Download(event) = update {
            if event.phase == DownloadPhase::Failed {
                failed_events += 1;
            }
        }
    }
    assert_eq!(failed_events, 1);
    assert!(!failed.is_completed());
    assert!(failed.error.as_deref().unwrap_or_default().contains("404"));
    assert_eq!(failed.bytes_transferred, 0);
    assert!(!request.destination().exists());
    assert!(!request.temp_path().exists());
    assert!(!manager.has_seen(&request.url));

    source.insert("https://i.example/late.jpg", vec![9u8; 64]);
    let retried = manager.submit(request.clone()).await.unwrap();
    assert!(retried.is_completed());
    assert_eq!(source.opens(), 2);
    assert_eq!(std::fs::read(request.destination()).unwrap(), vec![9u8; 64]);
}

#[tokio::test]
async fn test_progress_is_ordered_and_chunked() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::with_chunking(1000, Duration::ZERO));
    source.insert("https://i.example/big.mp4", vec![3u8; 2500]);
    let (sink, mut rx) = ChannelSink::new();
    let manager = DownloadManager::new(config(256, 2), source)
        .unwrap()
        .with_sink(Arc::new(sink));

    let outcome = manager
        .submit(DownloadRequest::new("https://i.example/big.mp4", dir.path(), "big.mp4"))
        .await
        .unwrap();
    assert_eq!(outcome.bytes_transferred, 2500);
    drop(manager);

    let mut events = Vec::new();
    while let Some(update) = rx.recv().await {
        if let ProgressUpdate::Download(event) = update {
            events.push(event);
        }
    }

    assert_eq!(events.first().unwrap().phase, DownloadPhase::Started);
    let last = events.last().unwrap();
    assert_eq!(last.phase, DownloadPhase::Completed);
    assert_eq!(last.current_bytes, 2500);
    assert_eq!(last.total_bytes, 2500);
    assert_eq!(
        events.iter().filter(|e| e.phase.is_terminal()).count(),
        1,
        "exactly one terminal event"
    );

    let mut previous = 0;
    for event in events.iter().filter(|e| e.phase == DownloadPhase::InProgress) {
        assert!(event.current_bytes > previous);
        assert!(event.current_bytes - previous <= 256);
        previous = event.current_bytes;
    }
    assert_eq!(previous, 2500);
}

#[tokio::test]
async fn test_concurrency_cap_is_respected() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::with_chunking(8, Duration::from_millis(10)));
    for i in 0..6 {
        source.insert(&format!("https://i.example/{i}.jpg"), vec![i as u8; 32]);
    }
    let (sink, mut rx) = ChannelSink::new();
    let manager = Arc::new(
        DownloadManager::new(config(8, 2), source)
            .unwrap()
            .with_sink(Arc::new(sink)),
    );

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let request = DownloadRequest::new(
                format!("https://i.example/{i}.jpg"),
                dir.path(),
                format!("{i}.jpg"),
            );
            tokio::spawn(async move { manager.submit(request).await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_completed());
    }
    drop(manager);

    // Replay the event stream: between a download's first Started and its
    // terminal event it holds a slot.
    let mut active = std::collections::HashSet::new();
    let mut peak = 0;
    while let Some(update) = rx.recv().await {
        if let ProgressUpdate::Download(event) = update {
            if event.phase.is_terminal() {
                active.remove(&event.download_id);
            } else {
                active.insert(event.download_id);
            }
            peak = peak.max(active.len());
        }
    }
    assert!(peak <= 2, "peak concurrency was {peak}");
}

#[tokio::test]
async fn test_cancel_mid_transfer_removes_temp_file() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::with_chunking(4, Duration::from_millis(20)));
    source.insert("https://i.example/slow.mp4", vec![5u8; 400]);
    let token = CancelToken::new();
    let manager = Arc::new(
        DownloadManager::new(config(4, 1), source)
            .unwrap()
            .with_cancel_token(token.clone()),
    );
    let request = DownloadRequest::new("https://i.example/slow.mp4", dir.path(), "slow.mp4");

    let task = {
        let manager = Arc::clone(&manager);
        let request = request.clone();
        tokio::spawn(async move { manager.submit(request).await })
    };
    tokio::time::sleep(Duration::from_millis(70)).await;
    token.cancel();

    let outcome = task.await.unwrap().unwrap();
    assert!(!outcome.is_completed());
    assert_eq!(outcome.error.as_deref(), Some("cancelled"));
    assert!(!request.destination().exists());
    assert!(!request.temp_path().exists());
    assert!(!manager.has_seen(&request.url));
}

#[tokio::test]
async fn test_abandoned_submit_releases_url_and_temp_file() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::with_chunking(4, Duration::from_millis(50)));
    source.insert("https://i.example/slow.mp4", vec![6u8; 40]);
    let manager = DownloadManager::new(config(4, 1), source.clone()).unwrap();
    let request = DownloadRequest::new("https://i.example/slow.mp4", dir.path(), "slow.mp4");

    let first = tokio::time::timeout(Duration::from_millis(120), manager.submit(request.clone())).await;
    assert!(first.is_err(), "first attempt should time out mid-transfer");
    assert!(!request.temp_path().exists());
    assert!(!request.destination().exists());
    assert!(!manager.has_seen(&request.url));

    let retried = manager.submit(request.clone()).await;
    assert!(retried.unwrap().is_completed());
    assert_eq!(source.opens(), 2);
    assert_eq!(std::fs::read(request.destination()).unwrap(), vec![6u8; 40]);
    assert!(!request.temp_path().exists());
}

#[tokio::test]
async fn test_zero_length_body_completes_immediately() {
    let dir = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert("https://i.example/empty.jpg", Vec::<u8>::new());
    let (sink, mut rx) = ChannelSink::new();
    let manager = DownloadManager::new(DownloadConfig::default(), source)
        .unwrap()
        .with_sink(Arc::new(sink));
    let request = DownloadRequest::new("https://i.example/empty.jpg", dir.path(), "empty.jpg");

    let outcome = manager.submit(request.clone()).await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.bytes_transferred, 0);
    assert_eq!(std::fs::read(request.destination()).unwrap(), Vec::<u8>::new());
    assert!(!request.temp_path().exists());
    drop(manager);

    let mut events = Vec::new();
    while let Some(update) = rx.recv().await {
        if let ProgressUpdate::Download(event) = update {
            events.push((event.phase, event.current_bytes, event.total_bytes));
        }
    }
    assert_eq!(
        events,
        vec![
            (DownloadPhase::Started, 0, 0),
            (DownloadPhase::Started, 0, 0),
            (DownloadPhase::Completed, 0, 0),
        ]
    );
}

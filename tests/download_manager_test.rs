// tests/download_manager_test.rs

use smartedu_dl::{
    client::RobustClient,
    config::AppConfig,
    constants,
    downloader::{BatchOptions, DownloadManager, NoProgress, ProgressSink},
    error::AppError,
    models::{DownloadStatus, RequestHeaders, ResourceDescriptor},
};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn client() -> Arc<RobustClient> {
    Arc::new(RobustClient::new(&AppConfig::default()).unwrap())
}

fn descriptor(server_url: &str, title: &str, path: &str, size: i64) -> ResourceDescriptor {
    ResourceDescriptor {
        format: "pdf".to_string(),
        title: title.to_string(),
        id: title.to_string(),
        url: format!("{}{}", server_url, path),
        raw_url: format!("{}/raw{}", server_url, path),
        size,
    }
}

fn no_progress() -> Arc<dyn ProgressSink> {
    Arc::new(NoProgress)
}

#[tokio::test]
async fn test_batch_counts_failures_and_writes_ledger() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/a.pdf").with_status(200).with_body("aaaa").create_async().await;
    server.mock("GET", "/b.pdf").with_status(200).with_body("bb").create_async().await;
    server.mock("GET", "/missing.pdf").with_status(404).create_async().await;

    let dir = tempdir().unwrap();
    let output = dir.path().join("out");
    let manager = DownloadManager::new(client(), &output);
    let url = server.url();
    let descriptors = vec![
        descriptor(&url, "语文", "/a.pdf", 4),
        descriptor(&url, "数学", "/b.pdf", 2),
        descriptor(&url, "英语", "/missing.pdf", 10),
    ];
    let options = BatchOptions::new(RequestHeaders::new())
        .with_ledger(true)
        .with_batch_workers(2);

    let report = manager
        .run(&descriptors, &options, no_progress(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((report.success, report.failed), (2, 1));
    assert!(!report.cancelled);
    assert_eq!(std::fs::read_to_string(output.join("语文.pdf")).unwrap(), "aaaa");
    assert_eq!(std::fs::read_to_string(output.join("数学.pdf")).unwrap(), "bb");
    assert!(!output.join("英语.pdf").exists());

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].status, DownloadStatus::HttpError);
    assert!(failures[0].saved_path.is_none());

    let ledger_path = report.ledger_path.clone().unwrap();
    assert_eq!(ledger_path, output.join(constants::LEDGER_FILE_NAME));
    let ledger = std::fs::read_to_string(&ledger_path).unwrap();
    assert!(ledger.contains("下载统计：成功/失败 = 2/1"));
    let rows: Vec<&str> = ledger
        .lines()
        .skip_while(|l| !l.starts_with("log-time,"))
        .skip(1)
        .filter(|l| !l.is_empty())
        .collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().filter(|r| r.contains(",true,")).count(), 2);
    assert!(rows.iter().any(|r| r.contains(",false,10,,")));
}

#[tokio::test]
async fn test_ledger_is_appended_across_batches() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/a.pdf")
        .with_status(200)
        .with_body("x")
        .expect(2)
        .create_async()
        .await;

    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), dir.path());
    let descriptors = vec![descriptor(&server.url(), "课本", "/a.pdf", 1)];
    let options = BatchOptions::default().with_ledger(true);

    for _ in 0..2 {
        manager
            .run(&descriptors, &options, no_progress(), &CancellationToken::new())
            .await
            .unwrap();
    }

    let ledger = std::fs::read_to_string(dir.path().join(constants::LEDGER_FILE_NAME)).unwrap();
    assert_eq!(ledger.matches("下载统计：成功/失败 = 1/0").count(), 2);
    // 同名文件不会被覆盖
    assert!(dir.path().join("课本.pdf").exists());
    assert!(dir.path().join("课本 (1).pdf").exists());
}

#[tokio::test]
async fn test_active_headers_use_raw_url() {
    let mut server = mockito::Server::new_async().await;
    let raw = server
        .mock("GET", "/raw/a.pdf")
        .match_header("x-nd-auth", "MAC id=\"token\",nonce=\"0\",mac=\"0\"")
        .with_status(200)
        .with_body("raw")
        .create_async()
        .await;
    let processed = server.mock("GET", "/a.pdf").expect(0).create_async().await;

    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), dir.path());
    let headers = RequestHeaders::new().with(constants::AUTH_HEADER, "MAC id=\"token\",nonce=\"0\",mac=\"0\"");
    let report = manager
        .run(
            &[descriptor(&server.url(), "教材", "/a.pdf", 3)],
            &BatchOptions::new(headers),
            no_progress(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    raw.assert_async().await;
    processed.assert_async().await;
    assert_eq!(report.success, 1);
    assert_eq!(std::fs::read_to_string(dir.path().join("教材.pdf")).unwrap(), "raw");
}

#[tokio::test]
async fn test_progress_sink_sees_every_item() {
    let mut server = mockito::Server::new_async().await;
    server.mock("GET", "/a.pdf").with_status(200).with_body("1234").create_async().await;

    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), dir.path());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let sink: Arc<dyn ProgressSink> = Arc::new(move |fraction: f64, done: usize, total: usize| {
        recorder.lock().unwrap().push((fraction, done, total));
    });

    manager
        .run(
            &[descriptor(&server.url(), "一", "/a.pdf", 4)],
            &BatchOptions::default(),
            sink,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&(1.0, 1, 1)));
    assert!(seen.iter().all(|(f, _, _)| (0.0..=1.0).contains(f)));
}

#[tokio::test]
async fn test_cancelled_batch_reports_every_item() {
    let server = mockito::Server::new_async().await;
    let dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let url = server.url();
    let report = manager
        .run(
            &[descriptor(&url, "一", "/a.pdf", 1), descriptor(&url, "二", "/b.pdf", 1)],
            &BatchOptions::default().with_ledger(true),
            no_progress(),
            &cancel,
        )
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!((report.success, report.failed), (0, 2));
    assert!(report.outcomes.iter().all(|o| o.status == DownloadStatus::Cancelled));
    assert!(report.ledger_path.is_some());
}

#[tokio::test]
async fn test_unusable_output_dir_is_an_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();

    let manager = DownloadManager::new(client(), blocker.join("sub"));
    let err = manager
        .run(&[], &BatchOptions::default(), no_progress(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OutputDir { .. }));
}

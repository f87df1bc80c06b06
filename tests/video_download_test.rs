// tests/video_download_test.rs

use aes::cipher::{BlockEncryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use mockito::Matcher;
use smartedu_dl::{
    client::RobustClient,
    config::AppConfig,
    downloader::{
        BatchOptions, DownloadManager, NoProgress, SegmentedVideoDownloader,
        key_exchange::{self, default_iv},
    },
    error::AppError,
    models::{EncryptionState, RequestHeaders, ResourceDescriptor},
    utils,
};
use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

type Aes128EcbEnc = ecb::Encryptor<aes::Aes128>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

const SEGMENT_KEY: &[u8; 16] = b"0123456789abcdef";

fn client() -> Arc<RobustClient> {
    Arc::new(RobustClient::new(&AppConfig::default()).unwrap())
}

fn playlist(with_key: bool) -> String {
    let key = if with_key {
        "#EXT-X-KEY:METHOD=AES-128,URI=\"keys/k1\"\n"
    } else {
        ""
    };
    format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n{}#EXTINF:10.0,\n0.ts\n#EXTINF:10.0,\n1.ts\n#EXT-X-ENDLIST\n",
        key
    )
}

fn encrypt_segment(plain: &[u8], sequence: u64) -> Vec<u8> {
    Aes128CbcEnc::new(SEGMENT_KEY.into(), &default_iv(sequence).into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
}

async fn mock_segments(server: &mut mockito::ServerGuard, bodies: [&[u8]; 2]) {
    for (i, body) in bodies.iter().enumerate() {
        server
            .mock("GET", format!("/videos/{}.ts", i).as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }
}

#[tokio::test]
async fn test_plain_playlist_is_merged_in_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(false))
        .create_async()
        .await;
    mock_segments(&mut server, [b"first-", b"second"]).await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("video.ts");
    let downloaded = Arc::new(AtomicU64::new(0));
    let playlist_url = format!("{}/videos/index.m3u8", server.url());

    let result = SegmentedVideoDownloader::new(client())
        .with_scratch_root(scratch.path())
        .download(&playlist_url, &output, &RequestHeaders::new(), 2, downloaded.clone(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.segments, 2);
    assert_eq!(result.encryption, EncryptionState::Plain);
    assert_eq!(std::fs::read(&output).unwrap(), b"first-second");
    assert_eq!(downloaded.load(Ordering::Relaxed), 12);
    let base_url = format!("{}/videos/", server.url());
    assert!(!utils::scratch_dir_for(scratch.path(), &base_url).exists());
}

#[tokio::test]
async fn test_encrypted_playlist_is_decrypted_after_key_exchange() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(true))
        .create_async()
        .await;
    let signs = server
        .mock("GET", "/videos/keys/k1/signs")
        .with_status(200)
        .with_body(r#"{"nonce": "n1"}"#)
        .create_async()
        .await;
    let sign = key_exchange::sign("n1", "k1");
    let wrapped = Aes128EcbEnc::new(sign.as_bytes().into()).encrypt_padded_vec_mut::<Pkcs7>(SEGMENT_KEY);
    let key = server
        .mock("GET", Matcher::Regex(r"^/videos/keys/k1(\?.*)?$".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("nonce".into(), "n1".into()),
            Matcher::UrlEncoded("sign".into(), sign.clone()),
        ]))
        .with_status(200)
        .with_body(format!(r#"{{"key": "{}"}}"#, BASE64.encode(wrapped)))
        .create_async()
        .await;
    let seg0 = encrypt_segment(b"hello ", 0);
    let seg1 = encrypt_segment(b"world", 1);
    mock_segments(&mut server, [&seg0, &seg1]).await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("lesson.ts");
    let result = SegmentedVideoDownloader::new(client())
        .with_scratch_root(scratch.path())
        .download(
            &format!("{}/videos/index.m3u8", server.url()),
            &output,
            &RequestHeaders::new(),
            4,
            Arc::new(AtomicU64::new(0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    signs.assert_async().await;
    key.assert_async().await;
    assert_eq!(result.encryption, EncryptionState::Decrypted);
    assert_eq!(std::fs::read(&output).unwrap(), b"hello world");
}

#[tokio::test]
async fn test_failed_key_exchange_keeps_raw_segments() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(true))
        .create_async()
        .await;
    server
        .mock("GET", "/videos/keys/k1/signs")
        .with_status(404)
        .create_async()
        .await;
    mock_segments(&mut server, [b"AAAA", b"BBBB"]).await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("raw.ts");
    let result = SegmentedVideoDownloader::new(client())
        .with_scratch_root(scratch.path())
        .download(
            &format!("{}/videos/index.m3u8", server.url()),
            &output,
            &RequestHeaders::new(),
            2,
            Arc::new(AtomicU64::new(0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.encryption, EncryptionState::PossiblyUndecrypted);
    assert_eq!(std::fs::read(&output).unwrap(), b"AAAABBBB");
}

#[tokio::test]
async fn test_slow_first_segment_still_merges_first() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(false))
        .create_async()
        .await;
    server
        .mock("GET", "/videos/0.ts")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            w.write_all(b"slow-")
        })
        .create_async()
        .await;
    server
        .mock("GET", "/videos/1.ts")
        .with_status(200)
        .with_body("fast")
        .create_async()
        .await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("ordered.ts");
    SegmentedVideoDownloader::new(client())
        .with_scratch_root(scratch.path())
        .download(
            &format!("{}/videos/index.m3u8", server.url()),
            &output,
            &RequestHeaders::new(),
            2,
            Arc::new(AtomicU64::new(0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), b"slow-fast");
}

#[tokio::test]
async fn test_master_playlist_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000\nlow/index.m3u8\n")
        .create_async()
        .await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let err = SegmentedVideoDownloader::new(client())
        .with_scratch_root(scratch.path())
        .download(
            &format!("{}/videos/index.m3u8", server.url()),
            &out_dir.path().join("x.ts"),
            &RequestHeaders::new(),
            2,
            Arc::new(AtomicU64::new(0)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::M3u8Parse(_)));
}

#[tokio::test]
async fn test_missing_segment_fails_whole_video() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(false))
        .create_async()
        .await;
    server
        .mock("GET", "/videos/0.ts")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;
    server.mock("GET", "/videos/1.ts").with_status(404).create_async().await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), out_dir.path()).with_scratch_root(scratch.path());
    let descriptor = ResourceDescriptor {
        format: "m3u8".to_string(),
        title: "第一课".to_string(),
        id: "v1".to_string(),
        url: format!("{}/videos/index.m3u8", server.url()),
        raw_url: format!("{}/videos/index.m3u8", server.url()),
        size: 0,
    };

    let report = manager
        .run(&[descriptor], &BatchOptions::default(), Arc::new(NoProgress), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!((report.success, report.failed), (0, 1));
    assert!(report.outcomes[0].saved_path.is_none());
    assert!(!out_dir.path().join("第一课.ts").exists());
}

#[tokio::test]
async fn test_video_descriptor_is_saved_as_ts() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/videos/index.m3u8")
        .with_status(200)
        .with_body(playlist(false))
        .create_async()
        .await;
    mock_segments(&mut server, [b"12", b"34"]).await;

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), out_dir.path()).with_scratch_root(scratch.path());
    let descriptor = ResourceDescriptor {
        format: "m3u8".to_string(),
        title: "第二课".to_string(),
        id: "v2".to_string(),
        url: format!("{}/videos/index.m3u8", server.url()),
        raw_url: format!("{}/videos/index.m3u8", server.url()),
        size: -1,
    };

    let report = manager
        .run(&[descriptor], &BatchOptions::default(), Arc::new(NoProgress), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.success, 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.encryption, Some(EncryptionState::Plain));
    assert_eq!(outcome.saved_path.as_deref(), Some(out_dir.path().join("第二课.ts").as_path()));
    assert_eq!(std::fs::read(out_dir.path().join("第二课.ts")).unwrap(), b"1234");
}

#[tokio::test]
async fn test_videos_sharing_a_directory_download_together() {
    let mut server = mockito::Server::new_async().await;
    for name in ["a", "b"] {
        server
            .mock("GET", format!("/videos/{}.m3u8", name).as_str())
            .with_status(200)
            .with_body(format!(
                "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXTINF:10.0,\n{name}0.ts\n#EXTINF:10.0,\n{name}1.ts\n#EXT-X-ENDLIST\n"
            ))
            .create_async()
            .await;
        for i in 0..2 {
            let body = format!("{}{}", name, i);
            server
                .mock("GET", format!("/videos/{}{}.ts", name, i).as_str())
                .with_status(200)
                .with_chunked_body(move |w| {
                    std::thread::sleep(std::time::Duration::from_millis(150));
                    w.write_all(body.as_bytes())
                })
                .create_async()
                .await;
        }
    }

    let scratch = tempdir().unwrap();
    let out_dir = tempdir().unwrap();
    let manager = DownloadManager::new(client(), out_dir.path()).with_scratch_root(scratch.path());
    let descriptors: Vec<ResourceDescriptor> = ["a", "b"]
        .iter()
        .map(|name| ResourceDescriptor {
            format: "m3u8".to_string(),
            title: format!("视频{}", name),
            id: name.to_string(),
            url: format!("{}/videos/{}.m3u8", server.url(), name),
            raw_url: format!("{}/videos/{}.m3u8", server.url(), name),
            size: 0,
        })
        .collect();

    let report = manager
        .run(
            &descriptors,
            &BatchOptions::default().with_batch_workers(2),
            Arc::new(NoProgress),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!((report.success, report.failed), (2, 0));
    assert_eq!(std::fs::read(out_dir.path().join("视频a.ts")).unwrap(), b"a0a1");
    assert_eq!(std::fs::read(out_dir.path().join("视频b.ts")).unwrap(), b"b0b1");
}

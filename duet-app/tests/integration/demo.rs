use std::time::Duration;

use duet_app::demo::{self, DemoOptions};
use duet_app::settings::Settings;
use tempfile::TempDir;

use crate::helpers::init_test_tracing;

fn fast_settings(download_dir: &std::path::Path) -> Settings {
    Settings {
        display_name: "tester".to_string(),
        download_dir: download_dir.to_path_buf(),
        chunk_delay_ms: 1,
        teardown_grace_ms: 20,
        mutual_auth: true,
    }
}

#[tokio::test]
async fn demo_transfers_given_files_to_download_dir() {
    init_test_tracing();
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    std::fs::create_dir_all(&source).unwrap();

    let small = source.join("hello.txt");
    std::fs::write(&small, b"hello, duet").unwrap();
    let large = source.join("blob.bin");
    let blob: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
    std::fs::write(&large, &blob).unwrap();

    let downloads = tmp.path().join("downloads");
    let settings = fast_settings(&downloads);
    let options = DemoOptions {
        files: vec![small, large],
        download_dir: downloads.clone(),
        latency: Duration::from_millis(5),
    };

    let mut saved = demo::run(&settings, options).await.unwrap();
    saved.sort();
    assert_eq!(saved, vec![downloads.join("blob.bin"), downloads.join("hello.txt")]);
    assert_eq!(std::fs::read(downloads.join("hello.txt")).unwrap(), b"hello, duet");
    assert_eq!(std::fs::read(downloads.join("blob.bin")).unwrap(), blob);
}

#[tokio::test]
async fn demo_without_files_uses_sample() {
    init_test_tracing();
    let tmp = TempDir::new().unwrap();
    let settings = fast_settings(tmp.path());
    let options = DemoOptions::from_settings(&settings, vec![]);

    let saved = demo::run(&settings, options).await.unwrap();
    assert_eq!(saved, vec![tmp.path().join("sample.bin")]);
    assert_eq!(std::fs::metadata(&saved[0]).unwrap().len(), 150_000);
}

#[tokio::test]
async fn demo_fails_on_missing_file() {
    init_test_tracing();
    let tmp = TempDir::new().unwrap();
    let settings = fast_settings(tmp.path());
    let options = DemoOptions::from_settings(&settings, vec![tmp.path().join("missing.txt")]);

    let err = demo::run(&settings, options).await.unwrap_err();
    assert!(format!("{err:#}").contains("missing.txt"), "got {err:#}");
}

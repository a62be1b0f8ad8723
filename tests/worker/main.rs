//! Integration tests for the chapter worker
//!
//! A worker downloads one chapter against a mock image host; these tests
//! check what lands on disk and how partial failures are reported.

use std::sync::Arc;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use manga_fetcher::app::client::{ClientConfig, ImageFetcher, ScanClient};
use manga_fetcher::app::models::{BatchPosition, Chapter};
use manga_fetcher::app::worker::{ChapterWorker, ConfigPresets};

fn test_worker() -> ChapterWorker {
    let client = ScanClient::with_config(ClientConfig::default().with_rate_limit(1000)).unwrap();
    ChapterWorker::new(ImageFetcher::new(Arc::new(client)), ConfigPresets::testing())
}

/// Mount `/u{n}.jpg` for each ordinal, with the listed ordinals returning 404
async fn mount_images(server: &MockServer, count: usize, missing: &[usize]) -> Vec<String> {
    let mut urls = Vec::new();
    for n in 1..=count {
        let status = if missing.contains(&n) { 404 } else { 200 };
        let image_path = format!("/u{}.jpg", n);
        Mock::given(method("GET"))
            .and(path(image_path.clone()))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(format!("image {}", n)))
            .mount(server)
            .await;
        urls.push(format!("{}{}", server.uri(), image_path));
    }
    urls
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Test a missing image leaves a gap in the numbering and fails the chapter
#[tokio::test]
async fn test_missing_image_leaves_gap() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let urls = mount_images(&server, 3, &[2]).await;
    let output_dir = root.path().join("Chapter 1");

    let chapter = Chapter::new("c1", "Chapter 1", 1, "");
    let result = test_worker()
        .download_chapter(&chapter, &urls, &output_dir, 2, BatchPosition::single())
        .await;

    assert!(!result.success);
    assert_eq!(result.images_downloaded, 2);
    assert_eq!(result.total_images, 3);
    assert_eq!(result.error.as_deref(), Some("Only 2/3 images"));
    assert_eq!(result.output_path, output_dir);

    // no temp files survive, and ordinals are never renumbered
    assert_eq!(file_names(&output_dir), vec!["001.jpg", "003.jpg"]);
    assert_eq!(
        std::fs::read_to_string(output_dir.join("003.jpg")).unwrap(),
        "image 3"
    );
}

/// Test nine of ten images is still a successful chapter
#[tokio::test]
async fn test_ninety_percent_is_success() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let urls = mount_images(&server, 10, &[7]).await;
    let output_dir = root.path().join("Chapter 2");

    let chapter = Chapter::new("c2", "Chapter 2", 2, "");
    let result = test_worker()
        .download_chapter(&chapter, &urls, &output_dir, 4, BatchPosition::new(2, 2))
        .await;

    assert!(result.success);
    assert_eq!(result.images_downloaded, 9);
    assert_eq!(result.error, None);
    // the missing image was attempted three times
    assert_eq!(result.retry_count, 2);

    let names = file_names(&output_dir);
    assert_eq!(names.len(), 9);
    assert!(!names.contains(&"007.jpg".to_string()));
    assert!(names.iter().all(|name| !name.ends_with(".tmp")));
}

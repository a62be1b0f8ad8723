//! Integration tests for the coordinator
//!
//! These tests run whole batches against a local mock image host and check
//! ordering, failure isolation, callbacks and progress events end to end.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use manga_fetcher::app::client::{ClientConfig, ScanClient};
use manga_fetcher::app::coordinator::{Coordinator, CoordinatorConfig};
use manga_fetcher::app::manifest::{parse_manifest, ManifestFormat};
use manga_fetcher::app::models::{Chapter, DownloadResult, ProgressStage};
use manga_fetcher::app::paths::OutputLayout;
use manga_fetcher::app::resolver::{ManifestResolver, StaticResolver};
use manga_fetcher::app::worker::ConfigPresets;

const IMAGE_BYTES: &[u8] = b"\x89PNG fake image body";

fn test_client() -> Arc<ScanClient> {
    Arc::new(ScanClient::with_config(ClientConfig::default().with_rate_limit(1000)).unwrap())
}

/// Create integration test coordinator configuration
///
/// Uses the testing worker preset so retries back off in milliseconds.
fn test_config(max_concurrent_chapters: usize) -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_max_concurrent_chapters(max_concurrent_chapters)
        .with_worker_config(ConfigPresets::testing())
}

fn test_coordinator(root: &TempDir, max_concurrent_chapters: usize) -> Coordinator {
    Coordinator::new(
        test_config(max_concurrent_chapters),
        test_client(),
        OutputLayout::new(root.path(), "Blue Harbor"),
    )
}

fn chapters(n: usize) -> Vec<Chapter> {
    (1..=n)
        .map(|i| Chapter::new(format!("c{}", i), format!("Chapter {}", i), i, ""))
        .collect()
}

/// Mount `count` images for a chapter, all answering with `status` after `delay`
async fn mount_chapter(
    server: &MockServer,
    chapter_id: &str,
    count: usize,
    status: u16,
    delay: Duration,
) -> Vec<String> {
    let mut urls = Vec::new();
    for n in 1..=count {
        let image_path = format!("/{}/{}.png", chapter_id, n);
        Mock::given(method("GET"))
            .and(path(image_path.clone()))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_bytes(IMAGE_BYTES)
                    .set_delay(delay),
            )
            .mount(server)
            .await;
        urls.push(format!("{}{}", server.uri(), image_path));
    }
    urls
}

/// Test results come back in input order whatever order chapters finish in
///
/// The first chapter is the slowest and the last the fastest, so completion
/// order is the reverse of input order.
#[tokio::test]
async fn test_results_keep_input_order() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let mut resolver = StaticResolver::new();
    for (id, delay_ms) in [("c1", 600), ("c2", 300), ("c3", 0)] {
        let urls = mount_chapter(&server, id, 2, 200, Duration::from_millis(delay_ms)).await;
        resolver = resolver.with_chapter(id, urls);
    }

    let input = chapters(3);
    let mut completion_order = Vec::new();
    let mut on_complete = |chapter: &Chapter, _: &DownloadResult| {
        completion_order.push(chapter.id.clone());
    };

    let results = test_coordinator(&root, 3)
        .run(&input, &resolver, Some(&mut on_complete))
        .await;

    let ids: Vec<&str> = results.iter().map(|r| r.chapter.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(completion_order, vec!["c3", "c2", "c1"]);
}

/// Test one chapter failing leaves the other chapters untouched
#[tokio::test]
async fn test_failed_chapter_is_isolated() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let resolver = StaticResolver::new()
        .with_chapter("c1", mount_chapter(&server, "c1", 3, 200, Duration::ZERO).await)
        .with_chapter("c2", mount_chapter(&server, "c2", 3, 404, Duration::ZERO).await)
        .with_chapter("c3", mount_chapter(&server, "c3", 3, 200, Duration::ZERO).await);

    let session = test_coordinator(&root, 2)
        .run_session(&chapters(3), &resolver, None)
        .await;

    let results = &session.results;
    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].error.as_deref(), Some("Only 0/3 images"));
    assert!(results[2].success);

    assert_eq!(session.stats.succeeded, 2);
    assert_eq!(session.stats.failed, 1);
    // every failed image was attempted three times
    assert_eq!(results[1].retry_count, 6);

    let chapter_dir = root.path().join("Blue Harbor").join("Chapter 3");
    assert!(chapter_dir.join("001.png").exists());
    assert!(chapter_dir.join("003.png").exists());
}

/// Test sequential mode reports chapters in input order
#[tokio::test]
async fn test_sequential_callback_order() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let mut resolver = StaticResolver::new();
    for (id, delay_ms) in [("c1", 200), ("c2", 0), ("c3", 100)] {
        let urls = mount_chapter(&server, id, 1, 200, Duration::from_millis(delay_ms)).await;
        resolver = resolver.with_chapter(id, urls);
    }

    let mut reported = Vec::new();
    let mut on_complete = |chapter: &Chapter, result: &DownloadResult| {
        reported.push((chapter.index, result.success));
    };

    test_coordinator(&root, 1)
        .run(&chapters(3), &resolver, Some(&mut on_complete))
        .await;

    assert_eq!(reported, vec![(1, true), (2, true), (3, true)]);
}

/// Test every downloaded chapter emits a start event before its finish event
#[tokio::test]
async fn test_progress_events_per_chapter() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let resolver = StaticResolver::new()
        .with_chapter("c1", mount_chapter(&server, "c1", 4, 200, Duration::ZERO).await)
        .with_chapter("c2", mount_chapter(&server, "c2", 2, 200, Duration::ZERO).await);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let coordinator = test_coordinator(&root, 2).with_progress(progress_tx);
    let results = coordinator.run(&chapters(2), &resolver, None).await;
    drop(coordinator);

    let mut events = Vec::new();
    while let Some(event) = progress_rx.recv().await {
        events.push(event);
    }

    assert!(results.iter().all(|r| r.success));
    assert_eq!(events.len(), 4);

    for title in ["Chapter 1", "Chapter 2"] {
        let stages: Vec<ProgressStage> = events
            .iter()
            .filter(|e| e.chapter_title == title)
            .map(|e| e.stage)
            .collect();
        assert_eq!(stages, vec![ProgressStage::Started, ProgressStage::Finished]);
    }

    let finish = events
        .iter()
        .find(|e| e.chapter_title == "Chapter 1" && e.stage == ProgressStage::Finished)
        .unwrap();
    assert_eq!(finish.status, "✓ 4/4");
    assert_eq!(finish.chapter_current, 1);
    assert_eq!(finish.chapter_total, 2);
}

/// Test a chapter whose image list cannot be fetched is reported, not fatal
///
/// The manifest resolver reads inline images for the first chapter and a
/// broken list endpoint for the second.
#[tokio::test]
async fn test_resolver_failure_reports_no_images() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let urls = mount_chapter(&server, "c1", 2, 200, Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(path("/c2/list.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let manifest_text = serde_json::json!({
        "title": "Blue Harbor",
        "chapters": [
            { "id": "c1", "title": "Arrival", "images": urls },
            { "id": "c2", "title": "Departure", "source": format!("{}/c2/list.json", server.uri()) }
        ]
    })
    .to_string();
    let manifest = parse_manifest(&manifest_text, ManifestFormat::Json).unwrap();

    let client = test_client();
    let resolver = ManifestResolver::new(client.clone(), &manifest);
    let coordinator = Coordinator::new(
        test_config(2),
        client,
        OutputLayout::new(root.path(), &manifest.title),
    );

    let results = coordinator.run(&manifest.chapters(), &resolver, None).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert_eq!(results[0].images_downloaded, 2);
    assert!(!results[1].success);
    assert_eq!(results[1].total_images, 0);
    assert_eq!(results[1].error.as_deref(), Some("No images found"));
}

/// Test two titles that sanitize to one directory never write into it together
///
/// The first chapter keeps the directory and its own bytes; the second is
/// reported as failed without downloading.
#[tokio::test]
async fn test_chapters_sharing_a_directory() {
    let server = MockServer::start().await;
    let root = TempDir::new().unwrap();

    let mut resolver = StaticResolver::new();
    for id in ["a", "b"] {
        let image_path = format!("/{}/1.jpg", id);
        Mock::given(method("GET"))
            .and(path(image_path.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("chapter {}", id)))
            .mount(&server)
            .await;
        resolver = resolver.with_chapter(id, vec![format!("{}{}", server.uri(), image_path)]);
    }

    let input = vec![
        Chapter::new("a", "Chapter 1: Start", 1, ""),
        Chapter::new("b", "Chapter 1 Start", 2, ""),
    ];
    let mut reported = Vec::new();
    let mut on_complete = |chapter: &Chapter, _: &DownloadResult| {
        reported.push(chapter.id.clone());
    };

    let results = test_coordinator(&root, 3)
        .run(&input, &resolver, Some(&mut on_complete))
        .await;

    assert!(results[0].success);
    assert!(!results[1].success);
    assert_eq!(results[1].images_downloaded, 0);
    assert_eq!(results[1].total_images, 1);
    assert_eq!(
        results[1].error.as_deref(),
        Some("Output directory shared with Chapter 1: Start")
    );
    assert_eq!(results[0].output_path, results[1].output_path);
    reported.sort();
    assert_eq!(reported, vec!["a", "b"]);

    let chapter_dir = root.path().join("Blue Harbor").join("Chapter 1 Start");
    assert_eq!(
        std::fs::read_to_string(chapter_dir.join("001.jpg")).unwrap(),
        "chapter a"
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|request| request.url.path() != "/b/1.jpg"));
}

//! Resolving chapters into ordered image URL lists
//!
//! The download core never inspects where image URLs come from. It asks an
//! `ImageUrlResolver` for the whole batch once, and the default batch
//! implementation drives `resolve_chapter` through a buffered stream on the
//! caller's task, keeping at most `concurrency` resolutions in flight and
//! returning pairs in input order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use url::Url;

use crate::app::client::ScanClient;
use crate::app::manifest::Manifest;
use crate::app::models::Chapter;
use crate::errors::{ResolveError, ResolveResult};

/// Source of image URLs for chapters
#[async_trait]
pub trait ImageUrlResolver: Send + Sync {
    /// Ordered image URLs for a single chapter
    async fn resolve_chapter(&self, chapter: &Chapter) -> ResolveResult<Vec<String>>;

    /// Resolve every chapter with bounded concurrency
    ///
    /// Returns one `(chapter, urls)` pair per input chapter in input order.
    /// A chapter that fails to resolve is logged and paired with an empty
    /// list.
    async fn resolve_batch(
        &self,
        chapters: &[Chapter],
        concurrency: usize,
    ) -> Vec<(Chapter, Vec<String>)> {
        stream::iter(chapters.iter().cloned())
            .map(|chapter| async move {
                match self.resolve_chapter(&chapter).await {
                    Ok(urls) => {
                        debug!("Resolved {} images for {}", urls.len(), chapter.title);
                        (chapter, urls)
                    }
                    Err(e) => {
                        warn!("Could not resolve images for {}: {}", chapter.title, e);
                        (chapter, Vec::new())
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

/// Resolver over URL lists known up front, keyed by chapter id
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    lists: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the image list for a chapter id
    pub fn with_chapter(mut self, id: impl Into<String>, urls: Vec<String>) -> Self {
        self.lists.insert(id.into(), urls);
        self
    }

    /// Number of chapters with a known list
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for StaticResolver {
    fn from(lists: HashMap<String, Vec<String>>) -> Self {
        Self { lists }
    }
}

#[async_trait]
impl ImageUrlResolver for StaticResolver {
    async fn resolve_chapter(&self, chapter: &Chapter) -> ResolveResult<Vec<String>> {
        self.lists
            .get(&chapter.id)
            .cloned()
            .ok_or_else(|| ResolveError::MissingSource {
                chapter: chapter.title.clone(),
            })
    }
}

/// Resolver for manifest chapters
///
/// Uses a chapter's inline images when the manifest lists them; otherwise
/// downloads the chapter's `source` document and reads it as an image list.
#[derive(Debug, Clone)]
pub struct ManifestResolver {
    client: Arc<ScanClient>,
    inline: StaticResolver,
}

impl ManifestResolver {
    pub fn new(client: Arc<ScanClient>, manifest: &Manifest) -> Self {
        Self {
            client,
            inline: StaticResolver::from(manifest.inline_images()),
        }
    }
}

#[async_trait]
impl ImageUrlResolver for ManifestResolver {
    async fn resolve_chapter(&self, chapter: &Chapter) -> ResolveResult<Vec<String>> {
        if let Ok(urls) = self.inline.resolve_chapter(chapter).await {
            return Ok(urls);
        }

        let source = chapter.source.trim();
        if source.is_empty() {
            return Err(ResolveError::MissingSource {
                chapter: chapter.title.clone(),
            });
        }

        let source_url = Url::parse(source).map_err(|_| ResolveError::InvalidUrl {
            url: source.to_string(),
        })?;
        let body = self.client.get_text(&source_url).await?;
        parse_image_list(&body, &source_url)
    }
}

/// Read an image list document
///
/// Accepts a JSON array of strings, or one URL per line with blank lines
/// and `#` comments ignored. Relative entries resolve against `base`.
pub fn parse_image_list(body: &str, base: &Url) -> ResolveResult<Vec<String>> {
    let trimmed = body.trim();

    let entries: Vec<String> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|e| ResolveError::MalformedList {
            reason: e.to_string(),
        })?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    };

    entries
        .iter()
        .map(|entry| {
            base.join(entry.trim())
                .map(String::from)
                .map_err(|_| ResolveError::InvalidUrl { url: entry.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::app::manifest::{parse_manifest, ManifestFormat};

    fn chapters(n: usize) -> Vec<Chapter> {
        (1..=n)
            .map(|i| Chapter::new(format!("c{}", i), format!("Chapter {}", i), i, ""))
            .collect()
    }

    /// Resolver whose first chapters take longest, tracking peak concurrency
    struct SlowResolver {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ImageUrlResolver for SlowResolver {
        async fn resolve_chapter(&self, chapter: &Chapter) -> ResolveResult<Vec<String>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = 60_u64.saturating_sub(chapter.index as u64 * 10);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![format!("https://cdn.example.org/{}.jpg", chapter.id)])
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_bounds_concurrency() {
        let resolver = SlowResolver {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let input = chapters(5);

        let resolved = resolver.resolve_batch(&input, 2).await;

        let ids: Vec<&str> = resolved.iter().map(|(c, _)| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(resolved[2].1, vec!["https://cdn.example.org/c3.jpg"]);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
    }

    /// Test the default batch runs through a shared trait object from a spawned task
    #[tokio::test]
    async fn test_batch_through_shared_trait_object() {
        let resolver: Arc<dyn ImageUrlResolver> = Arc::new(SlowResolver {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let input = chapters(3);

        let task = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve_batch(&input, 3).await }
        });
        let resolved = task.await.unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].0.title, "Chapter 1");
        assert_eq!(resolved[2].1, vec!["https://cdn.example.org/c3.jpg"]);
    }

    #[tokio::test]
    async fn test_static_resolver_maps_missing_to_empty() {
        let resolver = StaticResolver::new()
            .with_chapter("c1", vec!["https://a/1.jpg".to_string()])
            .with_chapter("c3", vec![]);
        assert_eq!(resolver.len(), 2);

        let resolved = resolver.resolve_batch(&chapters(3), 3).await;
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].1.len(), 1);
        assert!(resolved[1].1.is_empty());
        assert!(resolved[2].1.is_empty());

        assert!(matches!(
            resolver.resolve_chapter(&chapters(2)[1]).await,
            Err(ResolveError::MissingSource { .. })
        ));
    }

    #[test]
    fn test_parse_line_list_with_comments_and_relative_urls() {
        let base = Url::parse("https://cdn.example.org/series/c2/list.txt").unwrap();
        let body = "# chapter 2\n\n001.jpg\n  https://mirror.example.net/002.png  \n# end\n/abs/003.webp\n";

        let urls = parse_image_list(body, &base).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.org/series/c2/001.jpg",
                "https://mirror.example.net/002.png",
                "https://cdn.example.org/abs/003.webp",
            ]
        );
    }

    #[test]
    fn test_parse_json_list() {
        let base = Url::parse("https://cdn.example.org/c1/list.json").unwrap();
        let urls = parse_image_list(r#"["a.jpg", "b.jpg"]"#, &base).unwrap();
        assert_eq!(
            urls,
            vec!["https://cdn.example.org/c1/a.jpg", "https://cdn.example.org/c1/b.jpg"]
        );

        assert!(matches!(
            parse_image_list("[1, 2", &base),
            Err(ResolveError::MalformedList { .. })
        ));
        assert!(parse_image_list("   ", &base).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manifest_resolver_prefers_inline_then_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/c2/list.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("1.jpg\n2.jpg\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c3/list.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let text = format!(
            r#"{{
                "title": "Blue Harbor",
                "chapters": [
                    {{ "id": "c1", "title": "One", "images": ["https://cdn.example.org/x.png"] }},
                    {{ "id": "c2", "title": "Two", "source": "{uri}/c2/list.txt" }},
                    {{ "id": "c3", "title": "Three", "source": "{uri}/c3/list.txt" }},
                    {{ "id": "c4", "title": "Four" }}
                ]
            }}"#,
            uri = server.uri()
        );
        let manifest = parse_manifest(&text, ManifestFormat::Json).unwrap();
        let client = Arc::new(ScanClient::new().unwrap());
        let resolver = ManifestResolver::new(client, &manifest);

        let resolved = resolver.resolve_batch(&manifest.chapters(), 3).await;

        assert_eq!(resolved[0].1, vec!["https://cdn.example.org/x.png"]);
        assert_eq!(
            resolved[1].1,
            vec![
                format!("{}/c2/1.jpg", server.uri()),
                format!("{}/c2/2.jpg", server.uri())
            ]
        );
        assert!(resolved[2].1.is_empty());
        assert!(resolved[3].1.is_empty());

        let chapters = manifest.chapters();
        assert!(matches!(
            resolver.resolve_chapter(&chapters[2]).await,
            Err(ResolveError::ServerError { status: 404, .. })
        ));
        assert!(matches!(
            resolver.resolve_chapter(&chapters[3]).await,
            Err(ResolveError::MissingSource { .. })
        ));
    }
}

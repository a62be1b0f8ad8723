//! Chapter manifest loading and validation
//!
//! Manifests are JSON documents, or TOML when the file name ends in `.toml`:
//!
//! ```json
//! {
//!   "title": "Some Manga",
//!   "referer": "https://reader.example.org/",
//!   "chapters": [
//!     { "id": "c1", "title": "Chapter 1", "images": ["https://cdn.example.org/c1/1.jpg"] },
//!     { "id": "c2", "title": "Chapter 2", "source": "https://cdn.example.org/c2/list.json" }
//!   ]
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`types`] - Serde data structures (`Manifest`, `ChapterEntry`)

pub mod types;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use crate::app::paths::directory_key;
use crate::errors::{ManifestError, ManifestResult};

pub use types::{ChapterEntry, Manifest};

/// On-disk manifest encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Toml,
}

impl ManifestFormat {
    /// Pick the format from a file extension; anything but `.toml` is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ManifestFormat::Toml,
            _ => ManifestFormat::Json,
        }
    }
}

/// Parse and validate manifest text
pub fn parse_manifest(text: &str, format: ManifestFormat) -> ManifestResult<Manifest> {
    let manifest: Manifest = match format {
        ManifestFormat::Json => serde_json::from_str(text)?,
        ManifestFormat::Toml => toml::from_str(text)?,
    };
    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Read, parse and validate a manifest file
pub async fn load_manifest(path: &Path) -> ManifestResult<Manifest> {
    if !path.exists() {
        return Err(ManifestError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let text = tokio::fs::read_to_string(path).await?;
    let manifest = parse_manifest(&text, ManifestFormat::from_path(path))?;

    info!(
        "Loaded manifest for '{}' with {} chapters",
        manifest.title,
        manifest.chapters.len()
    );
    debug!("{} inline image URLs", manifest.inline_image_count());

    Ok(manifest)
}

/// Check a manifest names a manga and lists uniquely identified chapters
///
/// Chapter titles must also map to distinct output directories once
/// sanitized.
pub fn validate_manifest(manifest: &Manifest) -> ManifestResult<()> {
    if manifest.title.trim().is_empty() {
        return Err(ManifestError::MissingTitle);
    }

    if manifest.chapters.is_empty() {
        return Err(ManifestError::NoChapters);
    }

    let mut seen = HashSet::new();
    for entry in &manifest.chapters {
        if !seen.insert(entry.id.as_str()) {
            return Err(ManifestError::DuplicateChapter {
                id: entry.id.clone(),
            });
        }
    }

    let mut directories: HashMap<String, &str> = HashMap::new();
    for entry in &manifest.chapters {
        if let Some(first) = directories.insert(directory_key(&entry.title), &entry.title) {
            return Err(ManifestError::SharedChapterDirectory {
                first: first.to_string(),
                second: entry.title.clone(),
            });
        }
    }

    Ok(())
}

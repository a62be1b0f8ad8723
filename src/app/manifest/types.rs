//! Core types for chapter manifests
//!
//! A manifest names the manga, an optional referer for hotlink-protected
//! hosts, and the ordered chapter list. Each chapter either carries its image
//! URLs inline or points at an image list document through `source`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::app::models::Chapter;

/// A manga and its ordered chapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manga title, used for the top-level output directory
    pub title: String,
    /// Referer header sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    /// Chapters in download order
    #[serde(default)]
    pub chapters: Vec<ChapterEntry>,
}

/// One chapter as written in a manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub id: String,
    pub title: String,
    /// Explicit position; defaults to the 1-based list position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// URL of an image list document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Image URLs known up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl Manifest {
    /// Chapters in manifest order, with missing indices filled from position
    pub fn chapters(&self) -> Vec<Chapter> {
        self.chapters
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                Chapter::new(
                    entry.id.clone(),
                    entry.title.clone(),
                    entry.index.unwrap_or(position + 1),
                    entry.source.clone().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Inline image lists keyed by chapter id
    pub fn inline_images(&self) -> HashMap<String, Vec<String>> {
        self.chapters
            .iter()
            .filter_map(|entry| {
                entry
                    .images
                    .as_ref()
                    .map(|images| (entry.id.clone(), images.clone()))
            })
            .collect()
    }

    /// Total number of inline image URLs
    pub fn inline_image_count(&self) -> usize {
        self.chapters
            .iter()
            .filter_map(|entry| entry.images.as_ref())
            .map(Vec::len)
            .sum()
    }
}

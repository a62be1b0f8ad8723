//! Output path generation and organization
//!
//! Chapter images land in `{download_root}/{manga}/{chapter}/NNN.ext`, where
//! both the manga and chapter components are sanitized for the file system.

use std::path::{Path, PathBuf};

use crate::constants::files;

/// Make a string safe to use as a single path component
///
/// Strips characters forbidden on common file systems, trims leading and
/// trailing dots and spaces, and caps the length. A name that sanitizes to
/// nothing becomes `untitled`.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !files::FORBIDDEN_CHARS.contains(c) && !c.is_control())
        .collect();

    let capped: String = trim_dots_and_spaces(&stripped)
        .chars()
        .take(files::MAX_NAME_LENGTH)
        .collect();

    // Capping can expose a trailing dot or space again
    let cleaned = trim_dots_and_spaces(&capped);
    if cleaned.is_empty() {
        files::UNTITLED.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Key two names share when they would land in the same directory
///
/// Case is folded so names differing only in case also collide on
/// case-insensitive file systems.
pub fn directory_key(name: &str) -> String {
    sanitize_filename(name).to_lowercase()
}

fn trim_dots_and_spaces(name: &str) -> &str {
    name.trim_matches(|c| c == '.' || c == ' ')
}

/// Directory layout for one manga's downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    download_root: PathBuf,
    manga_dir: PathBuf,
}

impl OutputLayout {
    /// Create a layout rooted at `download_root` for the given manga title
    pub fn new(download_root: impl Into<PathBuf>, manga_title: &str) -> Self {
        let download_root = download_root.into();
        let manga_dir = download_root.join(sanitize_filename(manga_title));
        Self {
            download_root,
            manga_dir,
        }
    }

    /// Directory holding every chapter of this manga
    pub fn manga_dir(&self) -> &Path {
        &self.manga_dir
    }

    /// Root directory all downloads live under
    pub fn download_root(&self) -> &Path {
        &self.download_root
    }

    /// Directory for a chapter's images
    pub fn chapter_dir(&self, chapter_title: &str) -> PathBuf {
        self.manga_dir.join(sanitize_filename(chapter_title))
    }
}

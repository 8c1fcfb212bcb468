//! Image scanner for batch uploads.
//!
//! This module discovers X-ray images under a directory, respecting
//! configuration for extensions, excludes and file size limits.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Configuration for image scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Image extensions to include, lowercase, without dot.
    pub extensions: Vec<String>,
    /// Directory or file names to skip.
    pub excludes: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Maximum number of images to return
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["png", "jpg", "jpeg"]
                .into_iter()
                .map(String::from)
                .collect(),
            excludes: Vec::new(),
            max_file_size: 20 * 1024 * 1024,
            max_files: None,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            max_files: Some(config.max_files),
        }
    }
}

/// An image found by the scanner.
#[derive(Debug, Clone)]
pub struct ScannedImage {
    /// Full path on disk.
    pub path: PathBuf,
    /// Path relative to the scanned root, used for display.
    pub relative: String,
    pub size: u64,
}

/// Finds images to submit for classification.
pub struct ImageScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl ImageScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// Scan for all matching images, sorted by relative path.
    pub fn scan(&self) -> Result<Vec<ScannedImage>> {
        if !self.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Not a directory: {}",
                self.root.display()
            ));
        }

        let mut images = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_excluded(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Cannot read directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(m) => m.len(),
                Err(e) => {
                    debug!("No metadata for {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            if size > self.config.max_file_size {
                debug!("Skipping oversized image {}", entry.path().display());
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            images.push(ScannedImage {
                path: entry.path().to_path_buf(),
                relative,
                size,
            });

            if let Some(max) = self.config.max_files {
                if images.len() >= max {
                    break;
                }
            }
        }

        Ok(images)
    }

    /// Check whether a path has an accepted image extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.config.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern.as_str())
    }
}

//! File discovery.
//!
//! Walks the project root and yields the sorted set of repo-relative paths
//! that match the configured include globs, avoid the exclude globs, and
//! fit under the size cap. Lexicographic order keeps build output
//! byte-stable modulo content changes.

use crate::config::IndexConfig;
use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::Path;

pub struct FileDiscovery {
    include: GlobSet,
    include_patterns: Vec<String>,
    exclude: GlobSet,
    max_file_size: u64,
}

impl FileDiscovery {
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(&config.include_patterns)?,
            include_patterns: config.include_patterns.clone(),
            exclude: build_glob_set(&config.exclude_patterns)?,
            max_file_size: config.max_file_size,
        })
    }

    /// Discover all matching files under the given root.
    pub fn discover(&self, root: &Path) -> Result<Vec<String>> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .follow_links(false)
            .build();

        let mut files = Vec::new();

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let rel = match entry.path().strip_prefix(root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            if !self.matches(&rel) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if size > self.max_file_size {
                tracing::warn!("skipping {rel}: {size} bytes exceeds cap {}", self.max_file_size);
                continue;
            }

            files.push(rel);
        }

        files.sort();
        Ok(files)
    }

    /// Pattern-level check, without the size cap. Hidden entries are
    /// excluded unless an include pattern names a dotted component.
    pub fn matches(&self, rel: &str) -> bool {
        if self.exclude.is_match(rel) {
            return false;
        }
        let matched = self.include.matches(rel);
        if matched.is_empty() {
            return false;
        }
        if is_hidden(rel) {
            return matched
                .iter()
                .any(|&i| mentions_hidden(&self.include_patterns[i]));
        }
        true
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern '{pattern}'"))?;
        builder.add(glob);
    }
    builder.build().context("failed to build glob set")
}

/// A path is hidden when any component starts with a dot.
fn is_hidden(rel: &str) -> bool {
    rel.split('/').any(|c| c.starts_with('.') && c.len() > 1)
}

/// Does a pattern explicitly name a hidden component (e.g. `.github/**`)?
fn mentions_hidden(pattern: &str) -> bool {
    pattern
        .split('/')
        .any(|c| c.starts_with('.') && !c.starts_with("./") && c.len() > 1 && !c.starts_with(".*"))
}

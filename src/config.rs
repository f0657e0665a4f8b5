//! Index configuration.
//!
//! Defaults cover the supported language set; an optional
//! `.context/config.json` overlays them, and environment variables are
//! applied last.

use crate::error::AtlasError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Repo-relative location of the index document.
pub const INDEX_FILE: &str = ".context/.project/PROJECT_INDEX.json";
/// Repo-relative location of the embedding cache.
pub const VECTORS_FILE: &str = ".context/.project/PROJECT_INDEX.vectors.jsonl";
/// Repo-relative location of the optional config overlay.
pub const CONFIG_FILE: &str = ".context/config.json";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;
/// Files above this size are skipped with a warning.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

const DEFAULT_INCLUDE: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.py", "**/*.go", "**/*.rs",
    "**/*.sh",
];

const DEFAULT_EXCLUDE: &[&str] = &[
    "**/node_modules/**",
    "**/target/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/__pycache__/**",
    "**/.venv/**",
];

const LANGUAGE_TAGS: &[&str] = &[
    "typescript",
    "javascript",
    "python",
    "go",
    "rust",
    "shell",
    "unknown",
];

/// Structured discovery and layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Absolute project root.
    pub project_root: PathBuf,
    /// Repo-relative output path for the index document.
    pub index_file: String,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub max_file_size: u64,
    /// Informational list of supported language tags.
    pub languages: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            index_file: INDEX_FILE.to_string(),
            include_patterns: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            languages: LANGUAGE_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IndexConfig {
    /// Build the configuration for a project root, merging the optional
    /// on-disk overlay. The root must exist and be a directory.
    pub fn for_root(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| AtlasError::Config(format!("invalid project root {}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(AtlasError::Config(format!(
                "project root {} is not a directory",
                root.display()
            ))
            .into());
        }

        let mut config = Self {
            project_root: root.clone(),
            ..Self::default()
        };

        let overlay_path = root.join(CONFIG_FILE);
        if overlay_path.is_file() {
            let data = std::fs::read_to_string(&overlay_path)
                .with_context(|| format!("failed to read {}", overlay_path.display()))?;
            let overlay: ConfigOverlay = serde_json::from_str(&data)
                .map_err(|e| AtlasError::Config(format!("invalid {}: {e}", overlay_path.display())))?;
            overlay.apply(&mut config);
        }

        Ok(config)
    }

    /// Absolute path of the index document.
    pub fn index_path(&self) -> PathBuf {
        self.project_root.join(&self.index_file)
    }

    /// Absolute path of the embedding cache.
    pub fn vectors_path(&self) -> PathBuf {
        self.project_root.join(VECTORS_FILE)
    }
}

/// Partial config read from `.context/config.json`; only present fields
/// override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverlay {
    index_file: Option<String>,
    include_patterns: Option<Vec<String>>,
    exclude_patterns: Option<Vec<String>>,
    max_file_size: Option<u64>,
}

impl ConfigOverlay {
    fn apply(self, config: &mut IndexConfig) {
        if let Some(v) = self.index_file {
            config.index_file = v;
        }
        if let Some(v) = self.include_patterns {
            config.include_patterns = v;
        }
        if let Some(v) = self.exclude_patterns {
            config.exclude_patterns = v;
        }
        if let Some(v) = self.max_file_size {
            config.max_file_size = v;
        }
    }
}

/// Server bind address from the environment: `PROJECT_INDEX_SERVER`
/// (`host:port`) wins, otherwise `PROJECT_INDEX_HOST` and
/// `PROJECT_INDEX_PORT` override the defaults piecewise.
pub fn server_addr() -> Result<SocketAddr> {
    if let Ok(addr) = std::env::var("PROJECT_INDEX_SERVER") {
        return addr
            .parse()
            .map_err(|e| AtlasError::Config(format!("invalid PROJECT_INDEX_SERVER '{addr}': {e}")).into());
    }

    let host = std::env::var("PROJECT_INDEX_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = match std::env::var("PROJECT_INDEX_PORT") {
        Ok(p) => p
            .parse::<u16>()
            .map_err(|e| AtlasError::Config(format!("invalid PROJECT_INDEX_PORT '{p}': {e}")))?,
        Err(_) => DEFAULT_PORT,
    };

    format!("{host}:{port}")
        .parse()
        .map_err(|e| AtlasError::Config(format!("invalid server address {host}:{port}: {e}")).into())
}

/// Whether verbose tracing was requested via `PROJECT_INDEX_TRACE`.
pub fn trace_enabled() -> bool {
    std::env::var("PROJECT_INDEX_TRACE")
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_supported_languages() {
        let config = IndexConfig::default();
        assert!(config.include_patterns.iter().any(|p| p.ends_with("*.rs")));
        assert!(config.include_patterns.iter().any(|p| p.ends_with("*.sh")));
        assert!(config
            .exclude_patterns
            .iter()
            .any(|p| p.contains("node_modules")));
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.languages.len(), 7);
    }

    #[test]
    fn overlay_overrides_only_present_fields() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join(".context")).unwrap();
        std::fs::write(
            root.join(CONFIG_FILE),
            r#"{ "max_file_size": 2048, "exclude_patterns": ["**/vendor/**"] }"#,
        )
        .unwrap();

        let config = IndexConfig::for_root(root).unwrap();
        assert_eq!(config.max_file_size, 2048);
        assert_eq!(config.exclude_patterns, vec!["**/vendor/**".to_string()]);
        // untouched fields keep defaults
        assert_eq!(config.index_file, INDEX_FILE);
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let err = IndexConfig::for_root(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.to_string().contains("invalid project root"));
    }
}

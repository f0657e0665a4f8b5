//! Atomic persistence for the index document.
//!
//! All on-disk writes go through a temp-file-plus-rename so a failed write
//! never clobbers the previous state.

use crate::types::ProjectIndex;
use anyhow::{Context, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// Write bytes atomically: temp file in the target directory, then rename.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("no parent directory for {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    std::io::Write::write_all(&mut tmp, bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

/// Load the persisted index, or `None` if it has never been written.
pub fn load_index(path: &Path) -> Result<Option<ProjectIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read index {}", path.display()))?;
    let index: ProjectIndex = serde_json::from_slice(&data)
        .with_context(|| format!("failed to parse index {}", path.display()))?;
    Ok(Some(index))
}

/// Save the index document as canonical pretty JSON.
pub fn save_index(path: &Path, index: &ProjectIndex) -> Result<()> {
    let json = serde_json::to_vec_pretty(index).context("failed to serialize index")?;
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_round_trip_is_byte_stable() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(".context/.project/PROJECT_INDEX.json");

        let index = ProjectIndex::new("/repo");
        save_index(&path, &index).unwrap();
        let loaded = load_index(&path).unwrap().unwrap();

        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            serde_json::to_string(&loaded).unwrap()
        );
    }

    #[test]
    fn missing_index_is_none() {
        let temp = tempfile::tempdir().unwrap();
        assert!(load_index(&temp.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn failed_parse_is_an_error_not_none() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(load_index(&path).is_err());
    }
}

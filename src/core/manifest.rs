//! Optional shard manifest accompanying the containers.
//!
//! ```json
//! { "shards": [ { "name": "sdoml-001.tar", "checksum": "…", "members": 1152, "size": 123456 } ] }
//! ```
//!
//! When present the member index discovers containers from the manifest
//! instead of listing the directory. Checksums are carried through but not
//! verified here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::util::{write_atomic, Error, Result};

/// Default manifest file name inside the data directory.
pub const MANIFEST_NAME: &str = "manifest.json";

/// One container listed in the manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    /// Container file name, relative to the data directory.
    pub name: String,
    /// Content checksum as produced by the packer.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Number of members in the container.
    #[serde(default)]
    pub members: Option<u64>,
    /// Container size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Shard list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub shards: Vec<ShardEntry>,
}

impl Manifest {
    /// Load `dir/name` if it exists.
    pub fn load_optional(dir: &Path, name: &str) -> Result<Option<Self>> {
        let path = dir.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_open(path, e))?;
        serde_json::from_str(&text).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the manifest atomically as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| {
            serde_json::to_writer_pretty(w, self).map_err(|e| Error::Manifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
    }

    /// Container paths in sorted order, resolved against `dir`.
    ///
    /// A listed shard missing on disk is fatal. A size differing from the
    /// file on disk is only logged.
    pub fn container_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            let path = dir.join(&shard.name);
            let meta = std::fs::metadata(&path).map_err(|e| Error::from_open(&path, e))?;
            if let Some(expected) = shard.size {
                if expected != meta.len() {
                    warn!(
                        "Manifest size mismatch for {}: listed {}, on disk {}",
                        shard.name,
                        expected,
                        meta.len()
                    );
                }
            }
            paths.push(path);
        }
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let m: Manifest = serde_json::from_str(r#"{"shards":[{"name":"a.tar"}]}"#).unwrap();
        assert_eq!(m.shards.len(), 1);
        assert_eq!(m.shards[0].members, None);
    }

    #[test]
    fn test_save_load_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.tar"), [0u8; 8]).unwrap();
        std::fs::write(dir.path().join("a.tar"), [0u8; 4]).unwrap();

        let manifest = Manifest {
            shards: vec![
                ShardEntry { name: "b.tar".into(), checksum: Some("x".into()), members: Some(0), size: Some(8) },
                ShardEntry { name: "a.tar".into(), checksum: None, members: None, size: Some(999) },
            ],
        };
        manifest.save(&dir.path().join(MANIFEST_NAME)).unwrap();

        let loaded = Manifest::load_optional(dir.path(), MANIFEST_NAME).unwrap().unwrap();
        assert_eq!(loaded, manifest);

        let paths = loaded.container_paths(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.tar"), dir.path().join("b.tar")]);
    }

    #[test]
    fn test_missing_shard_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            shards: vec![ShardEntry { name: "gone.tar".into(), checksum: None, members: None, size: None }],
        };
        assert!(matches!(manifest.container_paths(dir.path()), Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_absent_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Manifest::load_optional(dir.path(), MANIFEST_NAME).unwrap().is_none());
    }
}

//! Cache artifact persistence.
//!
//! Artifacts are written to a temporary sibling and renamed over the
//! target, so a crash mid-write never leaves a readable partial file.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Error, Result};

/// Write a file through `write`, then atomically replace `path` with it.
///
/// Each call gets its own uniquely named temporary sibling, so concurrent
/// writers of one artifact never share a partial file. The temporary is
/// removed if `write` fails.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());

    let tmp = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    let mut writer = BufWriter::new(tmp);
    write(&mut writer)?;
    writer.flush()?;
    let tmp = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Persist `value` as a bincode artifact at `path`.
pub fn save_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| {
        bincode::serialize_into(w, value).map_err(|e| Error::cache(path, e))
    })
}

/// Load a bincode artifact written by [`save_artifact`].
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| Error::from_open(path, e))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| Error::cache(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates_index_x");
        let value = vec!["2022/11/01/0000".to_string(), "2022/11/01/0015".to_string()];

        save_artifact(&path, &value).unwrap();
        let back: Vec<String> = load_artifact(&path).unwrap();
        assert_eq!(back, value);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tar_files_index");

        let result = write_atomic(&path, |w| {
            w.write_all(b"partial")?;
            Err(Error::other("interrupted"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");
        std::fs::write(&path, [0xFFu8; 3]).unwrap();

        let result: Result<Vec<String>> = load_artifact(&path);
        assert!(matches!(result, Err(Error::Cache { .. })));
    }

    #[test]
    fn test_concurrent_writers_of_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates_index_shared");

        std::thread::scope(|scope| {
            for worker in 0..8u32 {
                let path = &path;
                scope.spawn(move || {
                    let value: Vec<u32> = (0..1000).map(|i| i * worker).collect();
                    save_artifact(path, &value).unwrap();
                });
            }
        });

        let back: Vec<u32> = load_artifact(&path).unwrap();
        assert_eq!(back.len(), 1000);
        let worker = back[1];
        assert!(back.iter().enumerate().all(|(i, v)| *v == i as u32 * worker));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

//! Member index: member name -> location inside a container.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::manifest::Manifest;
use crate::container::{ContainerReader, MemberSpan};
use crate::util::{load_artifact, save_artifact, Error, Result};

/// File name of the persisted member index inside the data directory.
pub const MEMBER_INDEX_CACHE: &str = "tar_files_index";

/// Extension of container files found by directory discovery.
pub const CONTAINER_EXTENSION: &str = "tar";

/// Where a member lives: which container, and which bytes inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerLocation {
    /// Position of the container in [`MemberIndex::containers`].
    pub container: u32,
    pub span: MemberSpan,
}

/// Name -> location map over a set of containers.
///
/// Entries keep first-seen order: containers in sorted path order, members
/// in archive order. Immutable once built.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemberIndex {
    containers: Vec<PathBuf>,
    entries: Vec<(String, ContainerLocation)>,
    collisions: usize,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl MemberIndex {
    /// Sorted container paths in `dir`, taken from the manifest when one exists.
    pub fn discover(dir: &Path, manifest_name: &str) -> Result<Vec<PathBuf>> {
        let paths = match Manifest::load_optional(dir, manifest_name)? {
            Some(manifest) => {
                info!("Using container list from manifest: {}", dir.join(manifest_name).display());
                manifest.container_paths(dir)?
            }
            None => {
                let listing = std::fs::read_dir(dir).map_err(|e| Error::from_open(dir, e))?;
                let mut paths = Vec::new();
                for entry in listing {
                    let path = entry?.path();
                    if path.is_file() && path.extension().is_some_and(|e| e == CONTAINER_EXTENSION) {
                        paths.push(path);
                    }
                }
                paths.sort();
                paths
            }
        };

        if paths.is_empty() {
            return Err(Error::NoContainers(dir.to_path_buf()));
        }
        Ok(paths)
    }

    /// Scan every container, memory-mapped.
    pub fn build(container_paths: &[PathBuf]) -> Result<Self> {
        Self::build_opts(container_paths, true)
    }

    /// Scan every container in sorted path order.
    ///
    /// A name seen in two containers keeps the most recently scanned
    /// location; such collisions are counted and reported.
    pub fn build_opts(container_paths: &[PathBuf], use_mmap: bool) -> Result<Self> {
        let mut containers = container_paths.to_vec();
        containers.sort();

        let mut index = Self {
            containers,
            ..Default::default()
        };

        info!("Indexing {} tar files", index.containers.len());
        for (id, path) in index.containers.iter().enumerate() {
            let reader = ContainerReader::open_opts(path, use_mmap)?;
            let members = reader.members()?;
            debug!("{}: {} members", path.display(), members.len());

            for member in members {
                let location = ContainerLocation {
                    container: id as u32,
                    span: member.span,
                };
                match index.lookup.get(&member.name) {
                    Some(&slot) => {
                        debug!("Duplicate member {} in {}", member.name, path.display());
                        index.entries[slot].1 = location;
                        index.collisions += 1;
                    }
                    None => {
                        index.lookup.insert(member.name.clone(), index.entries.len());
                        index.entries.push((member.name, location));
                    }
                }
            }
        }

        if index.collisions > 0 {
            warn!(
                "{} member names appear in more than one container; last scanned location kept",
                index.collisions
            );
        }
        Ok(index)
    }

    /// Load the index from `cache_path` if it exists, otherwise build and persist it.
    ///
    /// An existing cache is trusted as is: it is not rebuilt when the
    /// container set changes. A differing container list is only logged.
    pub fn build_or_load(container_paths: &[PathBuf], cache_path: &Path) -> Result<Self> {
        Self::build_or_load_opts(container_paths, cache_path, true)
    }

    /// [`build_or_load`](Self::build_or_load) with explicit mmap mode.
    pub fn build_or_load_opts(container_paths: &[PathBuf], cache_path: &Path, use_mmap: bool) -> Result<Self> {
        if cache_path.exists() {
            info!("Loading tar files index from cache: {}", cache_path.display());
            let mut index: Self = load_artifact(cache_path)?;
            index.rebuild_lookup();

            let mut current = container_paths.to_vec();
            current.sort();
            if current != index.containers {
                warn!(
                    "Tar files index cache was built from {} containers, directory now lists {}; delete {} to rebuild",
                    index.containers.len(),
                    current.len(),
                    cache_path.display()
                );
            }
            return Ok(index);
        }

        let index = Self::build_opts(container_paths, use_mmap)?;
        info!("Saving tar files index to cache: {}", cache_path.display());
        save_artifact(cache_path, &index)?;
        Ok(index)
    }

    fn rebuild_lookup(&mut self) {
        self.lookup = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
    }

    /// Location of a member.
    #[inline]
    pub fn get(&self, name: &str) -> Option<ContainerLocation> {
        self.lookup.get(name).map(|&i| self.entries[i].1)
    }

    /// Check if a member is indexed.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Path of the container a location points into.
    pub fn container_path(&self, location: &ContainerLocation) -> Option<&Path> {
        self.containers.get(location.container as usize).map(PathBuf::as_path)
    }

    /// Read a member's bytes. `Ok(None)` when the name is not indexed.
    ///
    /// The container is opened for this call only.
    pub fn extract(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(location) = self.get(name) else {
            return Ok(None);
        };
        let path = self.container_path(&location).ok_or_else(|| {
            Error::InvariantViolation(format!("member {name} points at unknown container {}", location.container))
        })?;
        ContainerReader::extract(path, &location.span).map(Some)
    }

    /// Member names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `(name, location)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContainerLocation)> + '_ {
        self.entries.iter().map(|(name, loc)| (name.as_str(), loc))
    }

    /// Number of distinct member names.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Containers the index was built from, sorted.
    pub fn containers(&self) -> &[PathBuf] {
        &self.containers
    }

    /// Number of names found in more than one container.
    #[inline]
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TarBuilder;

    fn write_tar(path: &Path, members: &[(&str, &[u8])]) {
        let mut tar = TarBuilder::create(path).unwrap();
        for (name, data) in members {
            tar.append(name, data).unwrap();
        }
        tar.finish().unwrap();
    }

    #[test]
    fn test_build_sorted_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let b = dir.path().join("sdoml-2.tar");
        let a = dir.path().join("sdoml-1.tar");
        write_tar(&b, &[("2022/11/02/0000.hmi_m.npy", b"b0")]);
        write_tar(&a, &[("2022/11/01/0000.hmi_m.npy", b"a0"), ("2022/11/01/0015.hmi_m.npy", b"a1")]);

        let index = MemberIndex::build(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(index.containers(), &[a, b]);
        let names: Vec<&str> = index.names().collect();
        assert_eq!(
            names,
            vec!["2022/11/01/0000.hmi_m.npy", "2022/11/01/0015.hmi_m.npy", "2022/11/02/0000.hmi_m.npy"]
        );
        assert_eq!(index.extract("2022/11/02/0000.hmi_m.npy").unwrap().unwrap(), b"b0");
        assert!(index.extract("2022/11/03/0000.hmi_m.npy").unwrap().is_none());
    }

    #[test]
    fn test_collision_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tar");
        let b = dir.path().join("b.tar");
        write_tar(&a, &[("2022/11/01/0000.hmi_m.npy", b"old"), ("2022/11/01/0015.hmi_m.npy", b"x")]);
        write_tar(&b, &[("2022/11/01/0000.hmi_m.npy", b"new")]);

        let index = MemberIndex::build(&[a, b]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.collisions(), 1);
        assert_eq!(index.names().next(), Some("2022/11/01/0000.hmi_m.npy"));
        assert_eq!(index.extract("2022/11/01/0000.hmi_m.npy").unwrap().unwrap(), b"new");
    }

    #[test]
    fn test_build_or_load_trusts_cache() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tar");
        write_tar(&a, &[("2022/11/01/0000.hmi_m.npy", b"v")]);
        let cache = dir.path().join(MEMBER_INDEX_CACHE);

        let built = MemberIndex::build_or_load(&[a.clone()], &cache).unwrap();
        assert!(cache.exists());

        // a new container is not picked up while the cache exists
        let b = dir.path().join("b.tar");
        write_tar(&b, &[("2022/11/02/0000.hmi_m.npy", b"w")]);
        let loaded = MemberIndex::build_or_load(&[a, b], &cache).unwrap();
        assert_eq!(loaded.len(), built.len());
        assert_eq!(loaded.get("2022/11/01/0000.hmi_m.npy"), built.get("2022/11/01/0000.hmi_m.npy"));
        assert!(!loaded.contains("2022/11/02/0000.hmi_m.npy"));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MemberIndex::discover(dir.path(), "manifest.json"),
            Err(Error::NoContainers(_))
        ));

        write_tar(&dir.path().join("z.tar"), &[]);
        write_tar(&dir.path().join("c.tar"), &[]);
        std::fs::write(dir.path().join(MEMBER_INDEX_CACHE), b"").unwrap();
        let found = MemberIndex::discover(dir.path(), "manifest.json").unwrap();
        assert_eq!(found, vec![dir.path().join("c.tar"), dir.path().join("z.tar")]);
    }

    #[test]
    fn test_corrupt_container_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.tar");
        std::fs::write(&bad, vec![1u8; 1024]).unwrap();
        assert!(matches!(MemberIndex::build(&[bad]), Err(Error::CorruptContainer { .. })));
    }
}

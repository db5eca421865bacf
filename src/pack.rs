//! Packing a directory tree into day-partitioned tar containers.
//!
//! The source tree already follows the member naming scheme,
//! `YYYY/MM/DD/HHMM.<channel>.npy`. Every `days_per_archive` consecutive
//! days from the earliest to the latest day become one container named
//! `<prefix>-<index>.tar`, with the index zero-padded to the width of the
//! container count. A manifest listing the containers is written last.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::container::TarBuilder;
use crate::core::{Manifest, ShardEntry, MANIFEST_NAME};
use crate::util::{Error, Result};

/// Options of [`pack_directory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackOptions {
    pub days_per_archive: u32,
    /// Container name prefix. Defaults to the target directory's name.
    pub prefix: Option<String>,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            days_per_archive: 1,
            prefix: None,
        }
    }
}

/// Files under `root` as `(member name, path)`, sorted by member name.
fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| Error::from_open(&dir, e))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                let relative = path.strip_prefix(root).map_err(|e| Error::other(e.to_string()))?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((name, path));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Day encoded in the first ten characters of a member name.
fn member_day(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name.get(..10)?, "%Y/%m/%d").ok()
}

/// Pack `source` into containers in `target` and write the manifest.
pub fn pack_directory(source: &Path, target: &Path, options: &PackOptions) -> Result<Manifest> {
    if options.days_per_archive == 0 {
        return Err(Error::InvalidConfig("days_per_archive must be at least 1".into()));
    }
    if !source.is_dir() {
        return Err(Error::FileNotFound(source.to_path_buf()));
    }
    fs::create_dir_all(target)?;

    let prefix = match &options.prefix {
        Some(p) => p.clone(),
        None => target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidConfig(format!("cannot derive a prefix from {}", target.display())))?,
    };

    let mut dated = Vec::new();
    for (name, path) in collect_files(source)? {
        match member_day(&name) {
            Some(day) => dated.push((day, name, path)),
            None => warn!("Unknown file format: {}", name),
        }
    }
    let (Some(earliest), Some(latest)) = (dated.first().map(|d| d.0), dated.last().map(|d| d.0)) else {
        return Err(Error::NoDatedSamples(format!("no dated files under {}", source.display())));
    };

    let span = options.days_per_archive as i64;
    let num_archives = ((latest - earliest).num_days() + span) / span;
    let width = num_archives.to_string().len();
    info!("Files found  : {}", dated.len());
    info!("Date range   : {} - {}", earliest, latest);
    info!("Archives     : {}", num_archives);

    let mut groups: BTreeMap<i64, Vec<(String, PathBuf)>> = (1..=num_archives).map(|i| (i, Vec::new())).collect();
    for (day, name, path) in dated {
        let index = (day - earliest).num_days() / span + 1;
        groups.entry(index).or_default().push((name, path));
    }

    let mut manifest = Manifest::default();
    for (index, members) in groups {
        let file_name = format!("{}-{:0width$}.tar", prefix, index, width = width);
        let path = target.join(&file_name);

        let mut tar = TarBuilder::create(&path)?;
        for (name, source_path) in &members {
            let data = fs::read(source_path).map_err(|e| Error::from_open(source_path, e))?;
            tar.append(name, &data)?;
        }
        tar.finish()?;

        let size = fs::metadata(&path)?.len();
        info!("Archive complete: {} ({} members, {} bytes)", file_name, members.len(), size);
        manifest.shards.push(ShardEntry {
            name: file_name,
            checksum: None,
            members: Some(members.len() as u64),
            size: Some(size),
        });
    }

    manifest.save(&target.join(MANIFEST_NAME))?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MemberIndex;

    fn touch(root: &Path, name: &str, data: &[u8]) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_member_day() {
        assert_eq!(member_day("2022/11/01/0000.hmi_m.npy"), NaiveDate::from_ymd_opt(2022, 11, 1));
        assert_eq!(member_day("notes.txt"), None);
    }

    #[test]
    fn test_pack_day_partitions() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(src.path(), "2022/11/01/0000.hmi_m.npy", b"a");
        touch(src.path(), "2022/11/01/0015.hmi_m.npy", b"b");
        touch(src.path(), "2022/11/02/0000.hmi_m.npy", b"c");
        touch(src.path(), "2022/11/04/0000.hmi_m.npy", b"d");
        touch(src.path(), "README", b"ignored");

        let options = PackOptions {
            days_per_archive: 2,
            prefix: Some("sdoml".into()),
        };
        let manifest = pack_directory(src.path(), out.path(), &options).unwrap();
        let names: Vec<&str> = manifest.shards.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["sdoml-1.tar", "sdoml-2.tar"]);
        assert_eq!(manifest.shards[0].members, Some(3));
        assert_eq!(manifest.shards[1].members, Some(1));

        let paths = MemberIndex::discover(out.path(), MANIFEST_NAME).unwrap();
        let index = MemberIndex::build(&paths).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.extract("2022/11/04/0000.hmi_m.npy").unwrap().unwrap(), b"d");
    }

    #[test]
    fn test_pack_zero_padded_names() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(src.path(), "2022/11/01/0000.hmi_m.npy", b"a");
        touch(src.path(), "2022/11/12/0000.hmi_m.npy", b"b");

        let manifest = pack_directory(src.path(), out.path(), &PackOptions::default()).unwrap();
        assert_eq!(manifest.shards.len(), 12);
        let prefix = out.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(manifest.shards[0].name, format!("{prefix}-01.tar"));
        assert_eq!(manifest.shards[11].name, format!("{prefix}-12.tar"));
        // days without files still get an (empty) container
        assert_eq!(manifest.shards[5].members, Some(0));
    }

    #[test]
    fn test_pack_empty_source() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        assert!(matches!(
            pack_directory(src.path(), out.path(), &PackOptions::default()),
            Err(Error::NoDatedSamples(_))
        ));
    }
}

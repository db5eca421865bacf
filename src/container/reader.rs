//! Tar container reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::format::*;
use crate::util::{Error, Result};

/// Byte range of one member inside its container.
///
/// Enough to extract the member without touching any other member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberSpan {
    /// Offset of the member's header block.
    pub header_offset: u64,
    /// Offset of the first data byte.
    pub offset: u64,
    /// Data length in bytes.
    pub size: u64,
}

/// A regular-file member discovered while scanning a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub span: MemberSpan,
}

enum Backing {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(Mutex<File>),
}

/// Open tar container.
pub struct ContainerReader {
    path: PathBuf,
    backing: Backing,
    size: u64,
}

impl ContainerReader {
    /// Open a container with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a container with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from_open(path, e))?;
        let size = file.metadata()?.len();

        let backing = if use_mmap && size > 0 {
            // Safety: containers are append-only and opened read-only
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            Backing::Mmap(mmap)
        } else {
            Backing::File(Mutex::new(file))
        };

        Ok(Self {
            path: path.to_path_buf(),
            backing,
            size,
        })
    }

    /// Path this container was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check if the container is memory-mapped.
    #[inline]
    pub fn is_mmap(&self) -> bool {
        matches!(self.backing, Backing::Mmap(_))
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = span_end(pos, buf.len() as u64, self.size)?;

        match &self.backing {
            Backing::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..end as usize]);
                Ok(())
            }
            Backing::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }

    /// Read bytes at a specific position.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Copy one member's bytes out of this container.
    pub fn read_member(&self, span: &MemberSpan) -> Result<Vec<u8>> {
        span_end(span.offset, span.size, self.size)?;
        self.read_bytes(span.offset, span.size as usize)
    }

    /// Borrow one member's bytes (only works with mmap).
    pub fn member_slice(&self, span: &MemberSpan) -> Result<&[u8]> {
        let end = span_end(span.offset, span.size, self.size)?;

        match &self.backing {
            Backing::Mmap(mmap) => Ok(&mmap[span.offset as usize..end as usize]),
            Backing::File(_) => Err(Error::other("member_slice() requires memory-mapped mode")),
        }
    }

    /// Extract one member by opening the container for this call only.
    ///
    /// Needs no shared handle, so any number of threads may extract from
    /// the same container at once.
    pub fn extract(path: &Path, span: &MemberSpan) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| Error::from_open(path, e))?;
        let len = file.metadata()?.len();
        span_end(span.offset, span.size, len)?;

        file.seek(SeekFrom::Start(span.offset))?;
        let mut buf = vec![0u8; span.size as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Enumerate every regular-file member in archive order.
    ///
    /// Directories, links and other special entries are skipped. GNU long
    /// names and pax `path` records apply to the member that follows them.
    pub fn members(&self) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        let mut pending_name: Option<String> = None;
        let mut block = [0u8; BLOCK_SIZE];
        let mut pos = 0u64;

        // Archives written without the terminator simply end at EOF
        while pos + BLOCK_SIZE as u64 <= self.size {
            self.read_into(pos, &mut block)?;
            if is_zero_block(&block) {
                break;
            }
            self.verify_checksum(&block, pos)?;

            let size = parse_numeric(field(&block, SIZE_FIELD))
                .ok_or_else(|| Error::corrupt(&self.path, format!("bad size field at offset {pos}")))?;
            let offset = pos + BLOCK_SIZE as u64;
            let next = offset
                .checked_add(size)
                .filter(|&end| end <= self.size)
                .and_then(|_| padded_size(size))
                .and_then(|padded| offset.checked_add(padded))
                .ok_or_else(|| {
                    Error::corrupt(
                        &self.path,
                        format!("member at offset {pos} runs past end of file ({offset} + {size} > {})", self.size),
                    )
                })?;

            let typeflag = block[TYPEFLAG_OFFSET];
            match typeflag {
                TYPE_GNU_LONGNAME => {
                    let raw = self.read_bytes(offset, size as usize)?;
                    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    pending_name = Some(std::str::from_utf8(&raw[..len])?.to_string());
                }
                TYPE_PAX_LOCAL => {
                    let raw = self.read_bytes(offset, size as usize)?;
                    if let Some(path) = pax_path(&raw) {
                        pending_name = Some(path);
                    }
                }
                TYPE_PAX_GLOBAL => {}
                t if is_regular(t) => {
                    let name = match pending_name.take() {
                        Some(name) => name,
                        None => header_name(&block)?,
                    };
                    members.push(Member {
                        name,
                        span: MemberSpan {
                            header_offset: pos,
                            offset,
                            size,
                        },
                    });
                }
                _ => {
                    pending_name = None;
                }
            }

            pos = next;
        }

        Ok(members)
    }

    fn verify_checksum(&self, block: &[u8], pos: u64) -> Result<()> {
        let stored = parse_numeric(field(block, CHECKSUM_FIELD))
            .ok_or_else(|| Error::corrupt(&self.path, format!("bad checksum field at offset {pos}")))?;
        let (unsigned, signed) = header_checksums(block);
        if stored != unsigned && stored as i64 != signed {
            return Err(Error::corrupt(
                &self.path,
                format!("header checksum mismatch at offset {pos} (stored {stored}, computed {unsigned})"),
            ));
        }
        Ok(())
    }
}

/// End of `[offset, offset + len)`, which must lie within `limit`.
fn span_end(offset: u64, len: u64, limit: u64) -> Result<u64> {
    match offset.checked_add(len) {
        Some(end) if end <= limit => Ok(end),
        Some(end) => Err(Error::UnexpectedEof(end)),
        None => Err(Error::UnexpectedEof(u64::MAX)),
    }
}

/// Full member name from a header, joining the ustar prefix when present.
fn header_name(block: &[u8]) -> Result<String> {
    let name = std::str::from_utf8(field_bytes(block, NAME_FIELD))?;
    let magic = field(block, MAGIC_FIELD);
    if magic == USTAR_MAGIC {
        let prefix = std::str::from_utf8(field_bytes(block, PREFIX_FIELD))?;
        if !prefix.is_empty() {
            return Ok(format!("{}/{}", prefix, name));
        }
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::TarBuilder;

    fn sample_container(dir: &Path) -> PathBuf {
        let path = dir.join("sdoml-1.tar");
        let mut tar = TarBuilder::create(&path).unwrap();
        tar.append("2022/11/01/0000.hmi_m.npy", b"first").unwrap();
        tar.append("2022/11/01/0000.aia_0171.npy", &[7u8; 600]).unwrap();
        tar.finish().unwrap();
        path
    }

    #[test]
    fn test_list_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_container(dir.path());

        for use_mmap in [true, false] {
            let reader = ContainerReader::open_opts(&path, use_mmap).unwrap();
            assert_eq!(reader.is_mmap(), use_mmap);

            let members = reader.members().unwrap();
            assert_eq!(members.len(), 2);
            assert_eq!(members[0].name, "2022/11/01/0000.hmi_m.npy");
            assert_eq!(members[0].span.header_offset, 0);
            assert_eq!(members[0].span.offset, 512);
            assert_eq!(members[1].span.size, 600);

            assert_eq!(reader.read_member(&members[0].span).unwrap(), b"first");
            assert_eq!(reader.member_slice(&members[0].span).is_ok(), use_mmap);
            let second = ContainerReader::extract(&path, &members[1].span).unwrap();
            assert_eq!(second, vec![7u8; 600]);
        }
    }

    #[test]
    fn test_missing_file() {
        let result = ContainerReader::open("/nonexistent/sdoml-1.tar");
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_corrupt_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_container(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = b'X';
        std::fs::write(&path, &bytes).unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        assert!(matches!(reader.members(), Err(Error::CorruptContainer { .. })));
    }

    #[test]
    fn test_truncated_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_container(dir.path());
        let bytes = std::fs::read(&path).unwrap();
        // keep both headers but cut the second payload short
        std::fs::write(&path, &bytes[..1024 + 512 + 100]).unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        assert!(matches!(reader.members(), Err(Error::CorruptContainer { .. })));
    }

    #[test]
    fn test_oversized_member_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_container(dir.path());
        let mut bytes = std::fs::read(&path).unwrap();

        // base-256 size close to u64::MAX, with a valid checksum
        let (start, end) = SIZE_FIELD;
        bytes[start..end].copy_from_slice(&[0x80, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let (sum, _) = header_checksums(&bytes[..BLOCK_SIZE]);
        let (start, end) = CHECKSUM_FIELD;
        bytes[start..end].copy_from_slice(&format_octal(sum, end - start));
        std::fs::write(&path, &bytes).unwrap();

        for use_mmap in [true, false] {
            let reader = ContainerReader::open_opts(&path, use_mmap).unwrap();
            match reader.members() {
                Err(Error::CorruptContainer { path: p, .. }) => assert_eq!(p, path),
                other => panic!("expected corrupt container, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_extract_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_container(dir.path());
        let span = MemberSpan {
            header_offset: 0,
            offset: 1 << 20,
            size: 10,
        };
        assert!(matches!(ContainerReader::extract(&path, &span), Err(Error::UnexpectedEof(_))));

        let wrapping = MemberSpan {
            header_offset: 0,
            offset: 512,
            size: u64::MAX,
        };
        assert!(matches!(ContainerReader::extract(&path, &wrapping), Err(Error::UnexpectedEof(_))));
        let reader = ContainerReader::open(&path).unwrap();
        assert!(matches!(reader.member_slice(&wrapping), Err(Error::UnexpectedEof(_))));
        assert!(matches!(reader.read_member(&wrapping), Err(Error::UnexpectedEof(_))));
    }
}

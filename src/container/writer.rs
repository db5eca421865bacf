//! Tar container writer.
//!
//! Produces plain ustar archives whose members can later be located and
//! extracted individually by [`ContainerReader`](super::ContainerReader).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::format::*;
use super::reader::MemberSpan;
use crate::util::{Error, Result};

const ZERO_BLOCK: [u8; BLOCK_SIZE] = [0u8; BLOCK_SIZE];

/// Streaming tar writer.
pub struct TarBuilder<W: Write> {
    inner: W,
    pos: u64,
    mtime: u64,
    members: usize,
}

impl TarBuilder<BufWriter<File>> {
    /// Create a new container file, truncating any existing one.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TarBuilder<W> {
    /// Wrap an arbitrary writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pos: 0,
            mtime: 0,
            members: 0,
        }
    }

    /// Modification time stamped on subsequent members (seconds since epoch).
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Number of members appended so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.members
    }

    /// Check if no members were appended yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Append a regular file member and return where its bytes landed.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<MemberSpan> {
        if name.is_empty() {
            return Err(Error::other("member name must not be empty"));
        }

        let (prefix, short) = match split_name(name) {
            Some(split) => split,
            None => {
                // GNU long name: pseudo member carrying the full name
                let mut long = name.as_bytes().to_vec();
                long.push(0);
                let header = build_header(GNU_LONGLINK_NAME, "", long.len() as u64, TYPE_GNU_LONGNAME, self.mtime);
                self.write_block(&header)?;
                self.write_data(&long)?;
                ("", truncate_utf8(name, NAME_FIELD.1 - NAME_FIELD.0))
            }
        };

        let header_offset = self.pos;
        let header = build_header(short, prefix, data.len() as u64, TYPE_REGULAR, self.mtime);
        self.write_block(&header)?;
        let offset = self.pos;
        self.write_data(data)?;
        self.members += 1;

        Ok(MemberSpan {
            header_offset,
            offset,
            size: data.len() as u64,
        })
    }

    /// Write the end-of-archive marker and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        self.write_block(&ZERO_BLOCK)?;
        self.write_block(&ZERO_BLOCK)?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_block(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<()> {
        self.inner.write_all(block)?;
        self.pos += BLOCK_SIZE as u64;
        Ok(())
    }

    fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        let padding = (BLOCK_SIZE - data.len() % BLOCK_SIZE) % BLOCK_SIZE;
        self.inner.write_all(&ZERO_BLOCK[..padding])?;
        self.pos += data.len() as u64 + padding as u64;
        Ok(())
    }
}

/// Split a name into ustar `(prefix, name)` fields, `None` if it cannot fit.
fn split_name(name: &str) -> Option<(&str, &str)> {
    let name_len = NAME_FIELD.1 - NAME_FIELD.0;
    let prefix_len = PREFIX_FIELD.1 - PREFIX_FIELD.0;
    if name.len() <= name_len {
        return Some(("", name));
    }
    name.match_indices('/')
        .map(|(i, _)| i)
        .find(|&i| i <= prefix_len && name.len() - i - 1 <= name_len && i > 0)
        .map(|i| (&name[..i], &name[i + 1..]))
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn put(block: &mut [u8; BLOCK_SIZE], (start, end): (usize, usize), bytes: &[u8]) {
    let len = bytes.len().min(end - start);
    block[start..start + len].copy_from_slice(&bytes[..len]);
}

fn build_header(name: &str, prefix: &str, size: u64, typeflag: u8, mtime: u64) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    put(&mut block, NAME_FIELD, name.as_bytes());
    put(&mut block, MODE_FIELD, &format_octal(0o644, 8));
    put(&mut block, UID_FIELD, &format_octal(0, 8));
    put(&mut block, GID_FIELD, &format_octal(0, 8));
    put(&mut block, SIZE_FIELD, &format_octal(size, 12));
    put(&mut block, MTIME_FIELD, &format_octal(mtime, 12));
    block[TYPEFLAG_OFFSET] = typeflag;
    put(&mut block, MAGIC_FIELD, USTAR_MAGIC);
    put(&mut block, VERSION_FIELD, b"00");
    put(&mut block, PREFIX_FIELD, prefix.as_bytes());

    let (checksum, _) = header_checksums(&block);
    // six octal digits, NUL, space
    let mut field = format!("{:06o}", checksum).into_bytes();
    field.push(0);
    field.push(b' ');
    put(&mut block, CHECKSUM_FIELD, &field);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerReader;

    #[test]
    fn test_layout() {
        let mut tar = TarBuilder::new(Vec::new());
        let a = tar.append("a.npy", b"abc").unwrap();
        let b = tar.append("b.npy", &[1u8; 512]).unwrap();
        assert_eq!(a, MemberSpan { header_offset: 0, offset: 512, size: 3 });
        assert_eq!(b, MemberSpan { header_offset: 1024, offset: 1536, size: 512 });
        assert_eq!(tar.len(), 2);

        let bytes = tar.finish().unwrap();
        assert_eq!(bytes.len(), 2048 + 1024);
        assert_eq!(&bytes[257..263], USTAR_MAGIC);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("2022/11/01/0000.hmi_m.npy"), Some(("", "2022/11/01/0000.hmi_m.npy")));

        let long = format!("{}/{}", "d".repeat(120), "f".repeat(40));
        let (prefix, name) = split_name(&long).unwrap();
        assert_eq!(prefix.len(), 120);
        assert_eq!(name.len(), 40);

        assert_eq!(split_name(&"x".repeat(200)), None);
    }

    #[test]
    fn test_long_names_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.tar");
        let prefixed = format!("{}/2022/11/01/0000.hmi_m.npy", "p".repeat(110));
        let gnu = format!("2022/11/01/0015.{}.npy", "c".repeat(150));

        let mut tar = TarBuilder::create(&path).unwrap();
        tar.append(&prefixed, b"one").unwrap();
        let span = tar.append(&gnu, b"two").unwrap();
        tar.finish().unwrap();

        let reader = ContainerReader::open(&path).unwrap();
        let members = reader.members().unwrap();
        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![prefixed.as_str(), gnu.as_str()]);
        assert_eq!(members[1].span, span);
        assert_eq!(reader.read_member(&span).unwrap(), b"two");
    }
}

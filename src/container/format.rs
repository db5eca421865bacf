//! Tar format constants and header field helpers.

/// Size of a header or data block.
pub const BLOCK_SIZE: usize = 512;

/// `name` field: member path (or its trailing part when `prefix` is used).
pub const NAME_FIELD: (usize, usize) = (0, 100);
/// `mode` field (octal).
pub const MODE_FIELD: (usize, usize) = (100, 108);
/// `uid` field (octal).
pub const UID_FIELD: (usize, usize) = (108, 116);
/// `gid` field (octal).
pub const GID_FIELD: (usize, usize) = (116, 124);
/// `size` field (octal, or base-256 when the high bit is set).
pub const SIZE_FIELD: (usize, usize) = (124, 136);
/// `mtime` field (octal).
pub const MTIME_FIELD: (usize, usize) = (136, 148);
/// `chksum` field (octal).
pub const CHECKSUM_FIELD: (usize, usize) = (148, 156);
/// Offset of the one-byte type flag.
pub const TYPEFLAG_OFFSET: usize = 156;
/// `magic` field.
pub const MAGIC_FIELD: (usize, usize) = (257, 263);
/// `version` field.
pub const VERSION_FIELD: (usize, usize) = (263, 265);
/// `prefix` field (ustar only).
pub const PREFIX_FIELD: (usize, usize) = (345, 500);

/// POSIX ustar magic.
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Regular file.
pub const TYPE_REGULAR: u8 = b'0';
/// Regular file written by pre-POSIX tars.
pub const TYPE_REGULAR_OLD: u8 = b'\0';
/// Contiguous file, treated as regular.
pub const TYPE_CONTIGUOUS: u8 = b'7';
/// GNU long name for the next member.
pub const TYPE_GNU_LONGNAME: u8 = b'L';
/// Pax extended header for the next member.
pub const TYPE_PAX_LOCAL: u8 = b'x';
/// Pax global header.
pub const TYPE_PAX_GLOBAL: u8 = b'g';

/// Name used for GNU long name pseudo members.
pub const GNU_LONGLINK_NAME: &str = "././@LongLink";

/// Slice a header field.
#[inline]
pub fn field(block: &[u8], (start, end): (usize, usize)) -> &[u8] {
    &block[start..end]
}

/// Bytes of a NUL-terminated field, without the terminator.
#[inline]
pub fn field_bytes(block: &[u8], range: (usize, usize)) -> &[u8] {
    let raw = field(block, range);
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..len]
}

/// Parse a numeric field: space/NUL padded octal, or GNU base-256.
pub fn parse_numeric(raw: &[u8]) -> Option<u64> {
    if raw.first().is_some_and(|&b| b & 0x80 != 0) {
        // base-256, big endian, high bit of the first byte is the marker
        let mut value: u64 = (raw[0] & 0x7F) as u64;
        for &b in &raw[1..] {
            value = value.checked_mul(256)?.checked_add(b as u64)?;
        }
        return Some(value);
    }

    raw.iter()
        .skip_while(|&&b| b == b' ' || b == 0)
        .take_while(|&&b| (b'0'..=b'7').contains(&b))
        .fold(Some(0u64), |acc, &b| acc?.checked_mul(8)?.checked_add((b - b'0') as u64))
}

/// Format `value` as a zero padded octal field of `width` bytes (last byte NUL).
pub fn format_octal(value: u64, width: usize) -> Vec<u8> {
    let mut out = format!("{:0w$o}", value, w = width - 1).into_bytes();
    out.push(0);
    out
}

/// Unsigned and signed header checksums, counting the checksum field as spaces.
pub fn header_checksums(block: &[u8]) -> (u64, i64) {
    let (start, end) = CHECKSUM_FIELD;
    let mut unsigned = 0u64;
    let mut signed = 0i64;
    for (i, &b) in block[..BLOCK_SIZE].iter().enumerate() {
        let b = if (start..end).contains(&i) { b' ' } else { b };
        unsigned += b as u64;
        signed += (b as i8) as i64;
    }
    (unsigned, signed)
}

/// True when every byte of the block is zero (end-of-archive marker).
#[inline]
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Data size rounded up to whole blocks, `None` on overflow.
#[inline]
pub const fn padded_size(size: u64) -> Option<u64> {
    let block = BLOCK_SIZE as u64;
    size.div_ceil(block).checked_mul(block)
}

/// True for type flags whose payload is file content.
#[inline]
pub const fn is_regular(typeflag: u8) -> bool {
    matches!(typeflag, TYPE_REGULAR | TYPE_REGULAR_OLD | TYPE_CONTIGUOUS)
}

/// Extract the `path` value from pax extended header records.
///
/// Records have the form `"<len> <key>=<value>\n"` where `len` counts the
/// whole record including itself.
pub fn pax_path(records: &[u8]) -> Option<String> {
    let mut rest = records;
    let mut path = None;
    while !rest.is_empty() {
        let space = rest.iter().position(|&b| b == b' ')?;
        let len: usize = std::str::from_utf8(&rest[..space]).ok()?.parse().ok()?;
        if len <= space || len > rest.len() {
            return path;
        }
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(value) = record.strip_prefix(b"path=") {
            path = Some(String::from_utf8_lossy(value).into_owned());
        }
        rest = &rest[len..];
    }
    path
}

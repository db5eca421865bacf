//! Tar containers with independently extractable members.
//!
//! A container is a plain (uncompressed) tar archive. Every member is a
//! 512-byte header followed by its data padded to whole blocks, so once a
//! member's offset and size are known its bytes can be read without
//! touching anything else in the archive.
//!
//! ## Member Layout
//!
//! ```text
//! +------------------+
//! | Header           |  512 bytes (name, size, type, checksum, ustar prefix)
//! +------------------+
//! | Data             |  size bytes
//! +------------------+
//! | Padding          |  up to the next 512 byte boundary
//! +------------------+
//! | ... next member  |
//! +------------------+
//! | Two zero blocks  |  end of archive
//! +------------------+
//! ```

mod format;
mod reader;
mod writer;

pub use format::*;
pub use reader::*;
pub use writer::*;

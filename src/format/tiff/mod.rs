//! Tag directory reading.
//!
//! Every container this crate understands eventually hands a TIFF-style tag
//! directory tree to the walkers in [`crate::format::exif`]. This module
//! owns the low-level part: the 8-byte header, 12-byte entries with inline
//! value narrowing, next-pointer chains and value reads.
//!
//! # Key Concepts
//!
//! - **Byte order**: declared by the header (II = little-endian,
//!   MM = big-endian) and sometimes overridden by vendor maker notes.
//!
//! - **Header base**: every offset is relative to a base that moves when a
//!   container or maker note starts a new TIFF header.
//!
//! - **Inline vs offset values**: payloads of 4 bytes or less live in the
//!   entry's value field; the field position is kept so the orientation
//!   writer can patch it.

mod parser;
mod tags;
mod values;

pub use parser::{
    is_tiff_header, unpack_inline, ByteOrder, ChainCursor, Directory, DirectoryContext,
    DirectoryLimits, TagEntry, TiffHeader, TraversalGuard, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_ENTRIES, ENTRY_SIZE, TIFF_HEADER_SIZE,
};
pub use tags::{FieldType, TiffTag};
pub use values::{decode_ascii, ValueReader, MAX_STRING_LEN};

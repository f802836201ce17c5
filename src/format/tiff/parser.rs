//! TIFF header and tag directory decoding.
//!
//! # Directory Layout
//!
//! ```text
//! Bytes 0-1:   entry count N
//! Bytes 2..:   N entries of 12 bytes
//!                0-1  tag id
//!                2-3  field type
//!                4-7  value count
//!                8-11 value, or offset to the value when it doesn't fit
//! Then:        4-byte offset of the next directory (0 or 0xFFFFFFFF ends)
//! ```
//!
//! Every offset inside a directory is relative to a header base that moves
//! at container and vendor boundaries; [`DirectoryContext`] carries it
//! together with the byte order. Reads past the end of the source see zeros.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, ByteSource};

use super::tags::FieldType;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Olympus ORF writes "IIRO" / "IIRS" instead of "II*\0"
const VERSION_ORF: u16 = 0x4F52;
const VERSION_ORF_ALT: u16 = 0x5352;

/// Panasonic RW2 writes "IIU\0"
const VERSION_RW2: u16 = 0x0055;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one directory entry in bytes
pub const ENTRY_SIZE: usize = 12;

/// Default cap on entries in one directory. Panasonic maker notes reach 133.
pub const DEFAULT_MAX_ENTRIES: u16 = 200;

/// Default bound on directory / box nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Next-directory values that end a chain
const END_OF_CHAIN: [u32; 2] = [0, 0xFFFF_FFFF];

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Byte order named by a two-byte TIFF marker, if it is one.
    pub fn from_marker(bytes: [u8; 2]) -> Option<Self> {
        match u16::from_le_bytes(bytes) {
            BYTE_ORDER_LITTLE_ENDIAN => Some(ByteOrder::LittleEndian),
            BYTE_ORDER_BIG_ENDIAN => Some(ByteOrder::BigEndian),
            _ => None,
        }
    }

    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Encode a u16 in this byte order.
    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed 8-byte TIFF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values below this header
    pub byte_order: ByteOrder,

    /// Offset of IFD0, relative to the header
    pub first_ifd_offset: u32,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// Accepts classic `II*\0` / `MM\0*` plus the little-endian variants
    /// Olympus (`IIRO`) and Panasonic (`IIU\0`) use for their RAW files.
    pub fn parse(bytes: &[u8]) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::InvalidMagic(0));
        }

        let byte_order = ByteOrder::from_marker([bytes[0], bytes[1]])
            .ok_or_else(|| TiffError::InvalidMagic(u16::from_le_bytes([bytes[0], bytes[1]])))?;

        let version = byte_order.read_u16(&bytes[2..4]);
        let accepted = match byte_order {
            ByteOrder::LittleEndian => {
                matches!(version, VERSION_TIFF | VERSION_ORF | VERSION_ORF_ALT | VERSION_RW2)
            }
            ByteOrder::BigEndian => version == VERSION_TIFF,
        };
        if !accepted {
            return Err(TiffError::InvalidVersion(version));
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset: byte_order.read_u32(&bytes[4..8]),
        })
    }

    /// Read and parse the header at an absolute offset of `source`.
    pub fn read_at(source: &dyn ByteSource, offset: u64) -> Result<Self, TiffError> {
        Self::parse(&source.read_zeroed(offset, TIFF_HEADER_SIZE))
    }
}

/// Check whether bytes look like a classic `II*\0` or `MM\0*` header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && (bytes[..4] == *b"II*\0" || bytes[..4] == *b"MM\0*")
}

// =============================================================================
// DirectoryContext
// =============================================================================

/// Origin and byte order every offset in a directory tree is read against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryContext {
    /// Absolute source offset that relative offsets are added to
    pub header_base: u64,
    pub byte_order: ByteOrder,
}

impl DirectoryContext {
    pub fn new(header_base: u64, byte_order: ByteOrder) -> Self {
        Self {
            header_base,
            byte_order,
        }
    }

    /// Context for a TIFF header found at absolute `offset`.
    pub fn for_header(offset: u64, header: &TiffHeader) -> Self {
        Self::new(offset, header.byte_order)
    }

    /// Absolute source offset of a relative one.
    #[inline]
    pub fn absolute(&self, relative: u64) -> u64 {
        self.header_base.saturating_add(relative)
    }

    /// Same byte order, different origin.
    pub fn rebased(&self, header_base: u64) -> Self {
        Self::new(header_base, self.byte_order)
    }

    /// Same origin, different byte order.
    pub fn with_order(&self, byte_order: ByteOrder) -> Self {
        Self::new(self.header_base, byte_order)
    }
}

// =============================================================================
// TagEntry
// =============================================================================

/// One decoded directory entry.
///
/// `value` already has inline narrowing applied: a single BYTE or SHORT
/// stored in the value field comes back as that number regardless of byte
/// order. Everything else is the raw 32-bit field (a value or an offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub id: u16,

    /// Type code as stored (after the Panasonic mask)
    pub field_type_raw: u16,

    /// Parsed field type, `None` for code 0
    pub field_type: Option<FieldType>,

    pub count: u32,

    /// Inline value or offset, relative to the directory's header base
    pub value: u32,

    /// Position of the 4-byte value field, relative to the header base
    pub value_field: u64,
}

impl TagEntry {
    /// Decode an entry from its 12 raw bytes.
    pub fn parse(
        bytes: &[u8],
        byte_order: ByteOrder,
        value_field: u64,
        mask_type_high_byte: bool,
    ) -> Self {
        let id = byte_order.read_u16(&bytes[0..2]);
        let mut field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let count = byte_order.read_u32(&bytes[4..8]);
        let raw_value = byte_order.read_u32(&bytes[8..12]);

        // Some Panasonic bodies set 0x100 in the type's high byte
        if mask_type_high_byte && (field_type_raw & 0xFF00) == 0x100 {
            field_type_raw &= 0xFF;
        }

        Self {
            id,
            field_type_raw,
            field_type: FieldType::from_u16(field_type_raw),
            count,
            value: unpack_inline(raw_value, field_type_raw, count, byte_order),
            value_field,
        }
    }

    /// Whether the type is one of the integer types (1, 3, 4, 6, 8, 9).
    #[inline]
    pub fn is_integer(&self) -> bool {
        self.field_type.is_some_and(FieldType::is_integer)
    }

    #[inline]
    pub fn has_type(&self, field_type: FieldType) -> bool {
        self.field_type == Some(field_type)
    }

    /// Relative offset where the entry's payload starts: the value field
    /// itself when the payload fits in 4 bytes, else the stored offset.
    pub fn payload_offset(&self) -> u64 {
        let fits = self
            .field_type
            .map_or(self.count <= 4, |ft| ft.fits_inline(self.count));
        if fits {
            self.value_field
        } else {
            self.value as u64
        }
    }

    /// Relative offset of an ASCII payload, using the count rule cameras
    /// rely on: up to 4 characters live in the value field.
    pub fn string_offset(&self) -> u64 {
        if self.count <= 4 {
            self.value_field
        } else {
            self.value as u64
        }
    }
}

/// Narrow a single inline BYTE or SHORT stored in the 32-bit value field.
///
/// The field was read as a u32 in the directory's byte order, so a
/// big-endian narrow value sits in the high bits.
pub fn unpack_inline(raw: u32, field_type: u16, count: u32, byte_order: ByteOrder) -> u32 {
    if count != 1 {
        return raw;
    }
    let byte_like = matches!(field_type, 1 | 6);
    let short_like = matches!(field_type, 3 | 8);
    match byte_order {
        ByteOrder::LittleEndian if byte_like => raw & 0xFF,
        ByteOrder::LittleEndian if short_like => raw & 0xFFFF,
        ByteOrder::BigEndian if byte_like => raw >> 24,
        ByteOrder::BigEndian if short_like => raw >> 16,
        _ => raw,
    }
}

// =============================================================================
// Directory
// =============================================================================

/// Limits applied while reading directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLimits {
    pub max_entries: u16,

    /// Apply the Panasonic type mask (set once Make is "Panasonic")
    pub mask_type_high_byte: bool,
}

impl Default for DirectoryLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            mask_type_high_byte: false,
        }
    }
}

/// A decoded directory plus its next pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    /// Relative offset the directory was read from
    pub offset: u64,
    pub entries: Vec<TagEntry>,
    pub next_offset: u32,
}

impl Directory {
    /// Read one directory at relative `offset`.
    ///
    /// # Errors
    /// - `TooManyEntries` if the count exceeds the cap; nothing past the
    ///   count is read
    /// - `UnknownFieldType` if any entry has a type code above 13
    pub fn read(
        source: &dyn ByteSource,
        offset: u64,
        ctx: &DirectoryContext,
        limits: &DirectoryLimits,
    ) -> Result<Self, TiffError> {
        let order = ctx.byte_order;
        let count = order.read_u16(&source.read_zeroed(ctx.absolute(offset), 2));
        if count > limits.max_entries {
            return Err(TiffError::TooManyEntries {
                offset: ctx.absolute(offset),
                count,
                max: limits.max_entries,
            });
        }

        let entries_start = offset + 2;
        let raw = source.read_zeroed(ctx.absolute(entries_start), count as usize * ENTRY_SIZE);

        let mut entries = Vec::with_capacity(count as usize);
        for (i, chunk) in raw.chunks_exact(ENTRY_SIZE).enumerate() {
            let value_field = entries_start + (i * ENTRY_SIZE) as u64 + 8;
            let entry = TagEntry::parse(chunk, order, value_field, limits.mask_type_high_byte);
            if entry.field_type_raw > FieldType::MAX_CODE {
                return Err(TiffError::UnknownFieldType {
                    tag: entry.id,
                    field_type: entry.field_type_raw,
                });
            }
            entries.push(entry);
        }

        let next_at = entries_start + (count as usize * ENTRY_SIZE) as u64;
        let next_offset = order.read_u32(&source.read_zeroed(ctx.absolute(next_at), 4));

        Ok(Self {
            offset,
            entries,
            next_offset,
        })
    }

    /// Whether the next pointer ends the chain.
    pub fn is_last(&self) -> bool {
        END_OF_CHAIN.contains(&self.next_offset)
    }
}

// =============================================================================
// TraversalGuard
// =============================================================================

/// Depth bound plus visited-offset set for one source.
///
/// Every directory read through [`ChainCursor`] is recorded by absolute
/// offset, so circular next pointers or sub-IFD links terminate.
#[derive(Debug, Clone)]
pub struct TraversalGuard {
    max_depth: usize,
    depth: usize,
    visited: HashSet<u64>,
}

impl TraversalGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: 0,
            visited: HashSet::new(),
        }
    }

    /// Guard for a new source that continues at the current depth.
    pub fn nested(&self) -> Self {
        Self {
            max_depth: self.max_depth,
            depth: self.depth,
            visited: HashSet::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter one nesting level.
    pub fn descend(&mut self) -> Result<(), TiffError> {
        if self.depth >= self.max_depth {
            return Err(TiffError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    /// Leave a level entered with [`TraversalGuard::descend`].
    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Record an absolute offset, failing if it was seen before.
    pub fn visit(&mut self, absolute: u64) -> Result<(), TiffError> {
        if self.visited.insert(absolute) {
            Ok(())
        } else {
            Err(TiffError::CyclicOffset(absolute))
        }
    }
}

impl Default for TraversalGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Step-wise reader over a directory chain.
///
/// Directories are read one at a time so the caller can recurse into
/// sub-directories (and update its limits) between steps. A structural
/// error, a revisited offset or an offset past the end stops the chain;
/// directories already returned stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainCursor {
    next: Option<u64>,
}

impl ChainCursor {
    pub fn new(first: u64) -> Self {
        let next = Some(first)
            .filter(|&o| o <= u32::MAX as u64 && !END_OF_CHAIN.contains(&(o as u32)));
        Self { next }
    }

    /// Read the next directory of the chain, if any.
    pub fn next_directory(
        &mut self,
        source: &dyn ByteSource,
        ctx: &DirectoryContext,
        limits: &DirectoryLimits,
        guard: &mut TraversalGuard,
    ) -> Option<Directory> {
        let offset = self.next.take()?;
        let absolute = ctx.absolute(offset);

        if let Err(e) = guard.visit(absolute) {
            debug!("{}: stopping directory chain: {}", source.identifier(), e);
            return None;
        }
        if absolute >= source.size() {
            debug!("{}: directory offset {} is past the end", source.identifier(), absolute);
            return None;
        }

        match Directory::read(source, offset, ctx, limits) {
            Ok(dir) => {
                if !dir.is_last() {
                    self.next = Some(dir.next_offset as u64);
                }
                Some(dir)
            }
            Err(e) => {
                debug!("{}: rejecting directory at {}: {}", source.identifier(), absolute, e);
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

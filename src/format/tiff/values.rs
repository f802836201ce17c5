//! Tag value reading.
//!
//! Values either sit inline in the entry's value field or at an offset
//! relative to the directory's header base. [`ValueReader`] pairs a source
//! with a [`DirectoryContext`] so walkers can read both without caring
//! where the base currently is.

use bytes::Bytes;

use crate::io::ByteSource;
use crate::metadata::Rational;

use super::parser::{ByteOrder, DirectoryContext, TagEntry};

/// Longest ASCII value read from a tag, in bytes.
pub const MAX_STRING_LEN: usize = 99;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag payloads respecting the current header base and byte order.
#[derive(Clone, Copy)]
pub struct ValueReader<'a> {
    source: &'a dyn ByteSource,
    ctx: DirectoryContext,
}

impl<'a> ValueReader<'a> {
    pub fn new(source: &'a dyn ByteSource, ctx: DirectoryContext) -> Self {
        Self { source, ctx }
    }

    #[inline]
    pub fn source(&self) -> &'a dyn ByteSource {
        self.source
    }

    #[inline]
    pub fn context(&self) -> DirectoryContext {
        self.ctx
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.ctx.byte_order
    }

    /// Absolute offset of a relative one.
    #[inline]
    pub fn absolute(&self, relative: u64) -> u64 {
        self.ctx.absolute(relative)
    }

    /// Raw bytes at a relative offset, zero-filled past the end.
    pub fn bytes_at(&self, relative: u64, len: usize) -> Bytes {
        self.source.read_zeroed(self.ctx.absolute(relative), len)
    }

    pub fn u16_at(&self, relative: u64) -> u16 {
        self.ctx.byte_order.read_u16(&self.bytes_at(relative, 2))
    }

    pub fn u32_at(&self, relative: u64) -> u32 {
        self.ctx.byte_order.read_u32(&self.bytes_at(relative, 4))
    }

    pub fn i16_at(&self, relative: u64) -> i16 {
        self.u16_at(relative) as i16
    }

    /// Unsigned rational (two u32) at a relative offset.
    pub fn rational_at(&self, relative: u64) -> Rational {
        let raw = self.bytes_at(relative, 8);
        let order = self.ctx.byte_order;
        Rational::new(order.read_u32(&raw[0..4]), order.read_u32(&raw[4..8]))
    }

    /// Signed rational as floating point, 0.0 for a zero denominator.
    pub fn signed_rational_at(&self, relative: u64) -> f64 {
        let raw = self.bytes_at(relative, 8);
        let order = self.ctx.byte_order;
        let num = order.read_u32(&raw[0..4]) as i32;
        let den = order.read_u32(&raw[4..8]) as i32;
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    /// Rational an entry points at.
    pub fn rational(&self, entry: &TagEntry) -> Rational {
        self.rational_at(entry.value as u64)
    }

    /// ASCII text of up to `count` bytes at a relative offset.
    ///
    /// Reading stops at the first NUL; trailing spaces are trimmed.
    pub fn string_at(&self, relative: u64, count: u32) -> String {
        let len = (count as usize).min(MAX_STRING_LEN);
        decode_ascii(&self.bytes_at(relative, len))
    }

    /// ASCII value of an entry.
    pub fn string(&self, entry: &TagEntry) -> String {
        self.string_at(entry.string_offset(), entry.count)
    }
}

/// Turn NUL-terminated, space-padded bytes into a string.
pub fn decode_ascii(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end])
        .trim_end_matches(' ')
        .to_string()
}

// =============================================================================
// Tests
// =============================================================================

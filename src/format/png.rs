//! PNG chunk walking.
//!
//! ```text
//! 89 50 4E 47 0D 0A 1A 0A          signature
//! <u32 BE length> <4cc type> <data> <u32 crc>   repeated
//! ```
//!
//! Only IHDR is needed, and it is always the first chunk, so the walk stops
//! as soon as it is read.

use tracing::debug;

use crate::io::ByteSource;

/// Offset of the first chunk.
const FIRST_CHUNK: u64 = 8;

/// Chunk length, type and CRC.
const CHUNK_OVERHEAD: u64 = 12;

/// Default cap on a single chunk's declared length.
pub const DEFAULT_MAX_CHUNK: u32 = 128 * 1024 * 1024;

/// Whether the full 8-byte PNG signature is present.
pub fn has_png_signature(source: &dyn ByteSource) -> bool {
    source.read_zeroed(0, 8)[..] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
}

/// Width and height from the IHDR chunk.
pub fn read_dimensions(source: &dyn ByteSource, max_chunk: u32) -> Option<(u32, u32)> {
    let mut offset = FIRST_CHUNK;

    while offset < source.size() {
        let header = source.read_zeroed(offset, 8);
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let kind = &header[4..8];

        if length > max_chunk {
            debug!("{}: png chunk at {} claims {} bytes", source.identifier(), offset, length);
            return None;
        }
        if kind == [0, 0, 0, 0] || kind == b"IEND" {
            return None;
        }
        if kind == b"IHDR" {
            let width = source.read_zeroed(offset + 8, 8);
            return Some((
                u32::from_be_bytes([width[0], width[1], width[2], width[3]]),
                u32::from_be_bytes([width[4], width[5], width[6], width[7]]),
            ));
        }

        offset += CHUNK_OVERHEAD + length as u64;
    }
    None
}

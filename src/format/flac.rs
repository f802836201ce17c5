//! FLAC metadata blocks.
//!
//! After the `fLaC` marker come metadata blocks, each with a big-endian
//! header: bit 31 flags the last block, bits 24..31 are the type and the
//! low 24 bits the length. Type 6 is PICTURE:
//!
//! ```text
//! u32 picture type
//! u32 mime length, mime bytes
//! u32 description length, description bytes
//! u32 width, u32 height, u32 depth, u32 indexed colours
//! u32 data length, image bytes
//! ```

use tracing::debug;

use crate::io::ByteSource;

use super::detect::has_image_signature;

const BLOCK_PICTURE: u8 = 6;

/// Longest MIME type or description accepted in a PICTURE block.
const MAX_PICTURE_STRING: u32 = 1000;

/// What the block walk found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlacScan {
    /// Declared dimensions of the last PICTURE block read
    pub dimensions: Option<(u32, u32)>,

    /// `(offset, length)` of the first picture whose bytes look like an image
    pub picture: Option<(u64, u64)>,
}

/// Walk metadata blocks looking for cover art.
pub fn find_picture(source: &dyn ByteSource) -> FlacScan {
    let mut scan = FlacScan::default();
    let mut offset: u64 = 4;

    while offset < source.size() {
        let header = source.read_u32_be_at(offset);
        offset += 4;

        let last = header & 0x8000_0000 != 0;
        let block_type = ((header >> 24) & 0x7F) as u8;
        let length = (header & 0x00FF_FFFF) as u64;

        if length == 0 {
            break;
        }

        if block_type == BLOCK_PICTURE {
            let mut o = offset + 4;

            let mime_len = source.read_u32_be_at(o);
            if mime_len > MAX_PICTURE_STRING {
                debug!("{}: flac picture mime length {}", source.identifier(), mime_len);
                return scan;
            }
            o += 4 + mime_len as u64;

            let description_len = source.read_u32_be_at(o);
            if description_len > MAX_PICTURE_STRING {
                debug!(
                    "{}: flac picture description length {}",
                    source.identifier(),
                    description_len
                );
                return scan;
            }
            o += 4 + description_len as u64;

            let width = source.read_u32_be_at(o);
            let height = source.read_u32_be_at(o + 4);
            scan.dimensions = Some((width, height));

            // Skip depth and indexed colours
            let data_len = source.read_u32_be_at(o + 16) as u64;
            let data = o + 20;

            if data_len > 2 && has_image_signature(source, data) {
                scan.picture = Some((data, data_len));
                return scan;
            }
        }

        offset += length;
        if last {
            break;
        }
    }

    scan
}

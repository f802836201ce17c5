//! Fujifilm RAF.
//!
//! RAF has no tag directory of its own. The header stores the location of a
//! full JPEG preview at fixed offsets, and that JPEG's Exif block carries
//! all the camera metadata:
//!
//! ```text
//! 0   "FUJIFILMCCD-RAW "
//! 84  u32 BE  JPEG offset
//! 88  u32 BE  JPEG length
//! ```

use tracing::debug;

use crate::io::ByteSource;

use super::jpeg::is_jpeg;

/// Header fields holding the embedded JPEG range.
const JPEG_OFFSET_FIELD: u64 = 84;
const JPEG_LENGTH_FIELD: u64 = 88;

/// The JPEG's Exif APP1 sits first, so its TIFF header is at a fixed spot.
const EXIF_TIFF_OFFSET: u64 = 12;

/// The embedded JPEG and where its TIFF header starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RafPreview {
    pub offset: u64,
    pub length: u64,

    /// Absolute offset of the little-endian TIFF header inside the JPEG
    pub tiff_header: u64,
}

/// Locate the embedded JPEG of a RAF file.
///
/// Returns `None` unless the range starts with SOI and carries a
/// little-endian TIFF header at the usual spot.
pub fn find_preview(source: &dyn ByteSource) -> Option<RafPreview> {
    let offset = source.read_u32_be_at(JPEG_OFFSET_FIELD) as u64;
    let length = source.read_u32_be_at(JPEG_LENGTH_FIELD) as u64;

    if !is_jpeg(&source.read_zeroed(offset, 2)) {
        debug!("{}: no JPEG at raf offset {}", source.identifier(), offset);
        return None;
    }

    let tiff_header = offset + EXIF_TIFF_OFFSET;
    if source.read_zeroed(tiff_header, 4)[..] != *b"II*\0" {
        debug!("{}: raf preview has no exif header", source.identifier());
        return None;
    }

    Some(RafPreview {
        offset,
        length,
        tiff_header,
    })
}

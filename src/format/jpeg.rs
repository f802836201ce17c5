//! JPEG marker scanning.
//!
//! JPEG files carry metadata in an APP1 "Exif" segment holding a complete
//! TIFF structure. The scan walks segments from just after SOI:
//!
//! ```text
//! FF <marker> <u16 BE length> <payload of length - 2 bytes>
//! ```
//!
//! Start-of-frame segments give the pixel dimensions. The scan stops at
//! SOS, EOI, a zero length or anything that isn't a marker. Segment lengths
//! are trusted; files with trailing junk in a segment simply stop early.

use tracing::trace;

use crate::io::ByteSource;

use super::tiff::is_tiff_header;

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// Start Of Frame, first of the SOFn range
const SOF0: u8 = 0xC0;

/// Start Of Frame, last of the SOFn range
const SOF15: u8 = 0xCF;

/// Define Huffman Table (inside the SOFn range, not a frame)
const DHT: u8 = 0xC4;

/// JPEG extensions (inside the SOFn range, not a frame)
const JPG: u8 = 0xC8;

/// Define Arithmetic Coding (inside the SOFn range, not a frame)
const DAC: u8 = 0xCC;

/// Start Of Scan
const SOS: u8 = 0xDA;

/// End Of Image
const EOI: u8 = 0xD9;

/// Application segment 1 (Exif)
const APP1: u8 = 0xE1;

/// Offset of the canonical TIFF header in a JPEG whose first segment is
/// the Exif APP1.
const COMMON_TIFF_OFFSET: u64 = 12;

/// Bytes of an APP1 payload searched for a misplaced TIFF header.
const APP1_HUNT_BYTES: usize = 64;

// =============================================================================
// Marker scan
// =============================================================================

/// What a marker scan found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JpegScan {
    /// Offset just past "Exif" in the last Exif APP1 (segment start + 8)
    pub exif_offset: Option<u64>,

    /// Dimensions of the last start-of-frame segment
    pub frame: Option<(u32, u32)>,

    /// Largest width and height over all start-of-frame segments
    pub largest: Option<(u32, u32)>,
}

/// Walk the segments of a JPEG stream starting after SOI.
pub fn scan_markers(source: &dyn ByteSource) -> JpegScan {
    let mut scan = JpegScan::default();
    let mut offset: u64 = 2;

    while offset < source.size() {
        let record = source.read_zeroed(offset, 9);
        let (marker, segment) = (record[0], record[1]);
        let length = u16::from_be_bytes([record[2], record[3]]);

        if marker != 0xFF || segment == EOI {
            break;
        }
        if segment == 0xFF {
            // Fill byte
            offset += 2;
            continue;
        }

        match segment {
            DHT | JPG | DAC => {}
            SOF0..=SOF15 => {
                let height = u16::from_be_bytes([record[5], record[6]]) as u32;
                let width = u16::from_be_bytes([record[7], record[8]]) as u32;
                scan.frame = Some((width, height));
                let (w, h) = scan.largest.unwrap_or((0, 0));
                scan.largest = Some((w.max(width), h.max(height)));
            }
            SOS => break,
            APP1 => {
                let tag = source.read_zeroed(offset + 4, 4);
                if tag.eq_ignore_ascii_case(b"exif") {
                    scan.exif_offset = Some(offset + 8);
                }
            }
            _ => {}
        }

        if length == 0 {
            break;
        }
        offset += length as u64 + 2;
    }

    trace!("{}: jpeg scan {:?}", source.identifier(), scan);
    scan
}

/// Find the TIFF header belonging to an Exif APP1.
///
/// Writers disagree on padding after "Exif", so several spots are tried:
/// five bytes in, the common absolute offset 12, the standard two bytes in,
/// then a short byte-by-byte hunt.
pub fn locate_tiff_header(source: &dyn ByteSource, exif_offset: u64) -> Option<u64> {
    let candidates = [exif_offset + 5, COMMON_TIFF_OFFSET, exif_offset + 2];
    if let Some(found) = candidates
        .into_iter()
        .find(|&at| is_tiff_header(&source.read_zeroed(at, 4)))
    {
        return Some(found);
    }

    let window = source.read_zeroed(exif_offset, APP1_HUNT_BYTES);
    window
        .windows(4)
        .position(is_tiff_header)
        .map(|i| exif_offset + i as u64)
}

/// Whether bytes start with SOI.
pub fn is_jpeg(head: &[u8]) -> bool {
    head.len() >= 2 && head[..2] == SOI
}

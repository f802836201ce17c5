//! ISO base media box walking (HEIC, HIF, CR3).
//!
//! # Box Layout
//!
//! ```text
//! u32 BE length (1 = 64-bit length follows, 0 = end of this level)
//! 4cc type
//! [u64 BE length]
//! payload
//! ```
//!
//! HEIF stores Exif as an item: `infe` names the item whose type is "Exif"
//! and `iloc` gives its byte range. Canon CR3 instead keeps complete TIFF
//! structures in `CMT1`..`CMT4` boxes inside a Canon `uuid` box, a preview
//! in `PRVW` and the full-size JPEG at the start of `mdat`.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::TiffError;
use crate::io::ByteSource;

use super::tiff::TraversalGuard;

/// Canon CR3 metadata container (CNCV, CMT1..CMT4, ...)
const UUID_CANON_METADATA: [u8; 16] = [
    0x85, 0xc0, 0xb6, 0x87, 0x82, 0x0f, 0x11, 0xe0, 0x81, 0x11, 0xf4, 0xce, 0x46, 0x2b, 0x6a, 0x48,
];

/// Canon CR3 preview container (PRVW)
const UUID_CANON_PREVIEW: [u8; 16] = [
    0xea, 0xf4, 0x2b, 0x5e, 0x1c, 0x98, 0x4b, 0x88, 0xb9, 0xfb, 0xb7, 0xdc, 0x40, 0x6e, 0x4d, 0x16,
];

/// Boxes whose payload is nothing but child boxes.
const PLAIN_CONTAINERS: [&[u8; 4]; 7] = [
    b"iprp", b"ipco", b"moov", b"trak", b"mdia", b"minf", b"stbl",
];

/// First four bytes of the full-size JPEG in a CR3 `mdat`.
const CR3_JPEG_HEAD: u32 = 0xFFD8_FFDB;

// =============================================================================
// BoxScan
// =============================================================================

/// Canon CR3 preview rectangle from `PRVW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewBox {
    pub offset: u64,
    pub length: u64,
    pub width: u16,
    pub height: u16,
}

/// Everything the box walk records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxScan {
    /// Item id of the HEIF "Exif" item
    pub exif_item: Option<u32>,

    /// First extent of each HEIF item: `(offset, length)`
    pub item_locations: HashMap<u32, (u64, u64)>,

    /// Absolute payload offsets of CMT1..CMT4 (IFD0, Exif, maker notes, GPS)
    pub canon_tiffs: [Option<u64>; 4],

    pub preview: Option<PreviewBox>,

    /// Full-size JPEG length from the first `stsz`
    pub cr3_jpeg_length: Option<u32>,

    /// Start of the first `mdat` that begins like a JPEG
    pub cr3_jpeg_start: Option<u64>,
}

impl BoxScan {
    /// Byte range of the HEIF Exif item.
    pub fn exif_range(&self) -> Option<(u64, u64)> {
        self.exif_item
            .and_then(|id| self.item_locations.get(&id).copied())
    }

    /// Whether Canon CR3 metadata boxes were seen.
    pub fn is_cr3(&self) -> bool {
        self.canon_tiffs[0].is_some()
    }

    pub fn cr3_ifd0(&self) -> Option<u64> {
        self.canon_tiffs[0]
    }

    pub fn cr3_exif(&self) -> Option<u64> {
        self.canon_tiffs[1]
    }

    pub fn cr3_makernote(&self) -> Option<u64> {
        self.canon_tiffs[2]
    }

    pub fn cr3_gps(&self) -> Option<u64> {
        self.canon_tiffs[3]
    }

    /// Full-size CR3 JPEG, once both its start and length are known.
    pub fn cr3_jpeg(&self) -> Option<(u64, u64)> {
        match (self.cr3_jpeg_start, self.cr3_jpeg_length) {
            (Some(start), Some(len)) if len != 0 => Some((start, len as u64)),
            _ => None,
        }
    }
}

// =============================================================================
// Walking
// =============================================================================

/// Walk every box of the source.
pub fn walk_boxes(source: &dyn ByteSource, guard: &mut TraversalGuard) -> BoxScan {
    let mut scan = BoxScan::default();
    walk_level(source, 0, source.size(), guard, &mut scan);
    scan
}

/// Cursor over big-endian fields inside one box.
struct FieldCursor<'a> {
    source: &'a dyn ByteSource,
    pos: u64,
}

impl<'a> FieldCursor<'a> {
    fn new(source: &'a dyn ByteSource, pos: u64) -> Self {
        Self { source, pos }
    }

    fn u16(&mut self) -> u16 {
        let v = self.source.read_u16_be_at(self.pos);
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = self.source.read_u32_be_at(self.pos);
        self.pos += 4;
        v
    }

    fn u64(&mut self) -> u64 {
        let v = self.source.read_u64_be_at(self.pos);
        self.pos += 8;
        v
    }

    /// Variable-width unsigned field from `iloc` (0, 4 or 8 bytes).
    fn sized(&mut self, size: u8) -> u64 {
        match size {
            4 => self.u32() as u64,
            8 => self.u64(),
            _ => 0,
        }
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.source.read_zeroed(self.pos, N));
        self.pos += N as u64;
        out
    }

    /// Full-box version and flags.
    fn version_flags(&mut self) -> (u8, u32) {
        let v = self.u32();
        ((v >> 24) as u8, v & 0x00FF_FFFF)
    }
}

fn walk_level(
    source: &dyn ByteSource,
    start: u64,
    end: u64,
    guard: &mut TraversalGuard,
    scan: &mut BoxScan,
) {
    let end = end.min(source.size());
    let mut offset = start;

    while offset < end {
        let mut cursor = FieldCursor::new(source, offset);
        let mut length = cursor.u32() as u64;
        if length == 0 {
            break;
        }
        let tag: [u8; 4] = cursor.bytes();
        if length == 1 {
            length = cursor.u64();
        }
        let header = cursor.pos - offset;
        if length < header {
            let e = TiffError::InvalidBoxLength {
                tag: String::from_utf8_lossy(&tag).into_owned(),
                offset,
                length,
            };
            debug!("{}: {}", source.identifier(), e);
            break;
        }
        let box_end = offset.saturating_add(length).min(end);

        trace!(
            "{}: box '{}' at {} ({} bytes, depth {})",
            source.identifier(),
            String::from_utf8_lossy(&tag),
            offset,
            length,
            guard.depth()
        );

        match &tag {
            b"meta" => {
                // Full box: skip version and flags
                descend(source, cursor.pos + 4, box_end, guard, scan);
            }
            b"iinf" => {
                let (version, _) = cursor.version_flags();
                let entries = if version == 0 {
                    cursor.u16() as u32
                } else {
                    cursor.u32()
                };
                if entries > 0 {
                    descend(source, cursor.pos, box_end, guard, scan);
                }
            }
            b"infe" => read_item_info(&mut cursor, scan),
            b"iloc" => read_item_locations(&mut cursor, box_end, scan),
            b"uuid" => {
                let guid: [u8; 16] = cursor.bytes();
                if guid == UUID_CANON_METADATA || guid == UUID_CANON_PREVIEW {
                    descend(source, cursor.pos, box_end, guard, scan);
                }
            }
            b"CMT1" | b"CMT2" | b"CMT3" | b"CMT4" => {
                let index = (tag[3] - b'1') as usize;
                scan.canon_tiffs[index] = Some(cursor.pos);
            }
            b"PRVW" => {
                cursor.u32();
                cursor.u16();
                let width = cursor.u16();
                let height = cursor.u16();
                cursor.u16();
                let length = cursor.u32() as u64;
                scan.preview = Some(PreviewBox {
                    offset: cursor.pos,
                    length,
                    width,
                    height,
                });
            }
            b"stsz" => {
                // The fourth word of the first stsz has matched the full-size
                // JPEG length in every CR3 seen so far
                if scan.cr3_jpeg_length.is_none() {
                    cursor.pos += 12;
                    scan.cr3_jpeg_length = Some(cursor.u32()).filter(|&len| len != 0);
                }
            }
            b"mdat" => {
                if scan.cr3_jpeg_start.is_none() && cursor.u32() == CR3_JPEG_HEAD {
                    scan.cr3_jpeg_start = Some(offset + header);
                }
            }
            t if PLAIN_CONTAINERS.contains(&t) => {
                descend(source, cursor.pos, box_end, guard, scan);
            }
            _ => {}
        }

        offset = offset.saturating_add(length);
    }
}

/// Walk the children of a container box, one nesting level down.
fn descend(
    source: &dyn ByteSource,
    start: u64,
    end: u64,
    guard: &mut TraversalGuard,
    scan: &mut BoxScan,
) {
    if let Err(e) = guard.descend() {
        debug!("{}: not entering box at {}: {}", source.identifier(), start, e);
        return;
    }
    walk_level(source, start, end, guard, scan);
    guard.ascend();
}

fn read_item_info(cursor: &mut FieldCursor<'_>, scan: &mut BoxScan) {
    let (version, _) = cursor.version_flags();
    if version < 2 {
        return;
    }
    let item_id = if version == 2 {
        cursor.u16() as u32
    } else {
        cursor.u32()
    };
    let _protection_index = cursor.u16();
    let item_type: [u8; 4] = cursor.bytes();
    if &item_type == b"Exif" {
        scan.exif_item = Some(item_id);
    }
}

fn read_item_locations(cursor: &mut FieldCursor<'_>, box_end: u64, scan: &mut BoxScan) {
    let (version, _) = cursor.version_flags();
    let sizes = cursor.u16();
    let offset_size = (sizes >> 12) as u8 & 0xF;
    let length_size = (sizes >> 8) as u8 & 0xF;
    let base_offset_size = (sizes >> 4) as u8 & 0xF;
    let index_size = if version >= 1 { sizes as u8 & 0xF } else { 0 };

    let item_count = if version < 2 {
        cursor.u16() as u32
    } else {
        cursor.u32()
    };

    for _ in 0..item_count {
        if cursor.pos >= box_end {
            break;
        }
        let item_id = if version < 2 {
            cursor.u16() as u32
        } else {
            cursor.u32()
        };
        if version >= 1 {
            // Reserved bits and construction method
            cursor.u16();
        }
        let _data_reference = cursor.u16();
        let base_offset = cursor.sized(base_offset_size);
        let extent_count = cursor.u16();

        for _ in 0..extent_count {
            if cursor.pos >= box_end {
                return;
            }
            if index_size > 0 {
                cursor.sized(index_size);
            }
            let extent_offset = cursor.sized(offset_size);
            let extent_length = cursor.sized(length_size);
            scan.item_locations
                .entry(item_id)
                .or_insert((base_offset.saturating_add(extent_offset), extent_length));
        }
    }
}

//! Container detection.
//!
//! Files are classified by their leading bytes, never by extension. The
//! extension only matters later as a hint for vendor quirks (see
//! [`crate::engine::ParseHint`]).
//!
//! Supported containers:
//!
//! - **JPEG**: `FF D8`
//! - **TIFF family**: `II*\0`, `MM\0*` (TIFF, DNG, CR2, NEF), `IIRO` / `IIRS`
//!   (Olympus ORF), `IIU\0` (Panasonic RW2)
//! - **RAF**: `FUJI`
//! - **PNG**: `89 50 4E 47 0D 0A 1A 0A`
//! - **FLAC**: `fLaC`
//! - **MP3**: `ID3` with version 2..=4, or a bare `FF FB 90` frame sync
//! - **ISO base media** (HEIC, HIF, CR3): `ftyp` at bytes 4..8

use serde::Serialize;

use crate::error::FormatError;
use crate::io::ByteSource;

// =============================================================================
// ContainerKind
// =============================================================================

/// Detected container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Jpeg,
    /// Classic TIFF header (TIFF, DNG, CR2, NEF and friends)
    Tiff,
    /// Olympus RAW
    Orf,
    /// Panasonic RAW
    Rw2,
    /// Fujifilm RAW
    Raf,
    Png,
    Flac,
    Mp3,
    /// ISO base media: HEIC, HIF, CR3
    Bmff,
}

impl ContainerKind {
    /// Get a human-readable name for the container.
    pub const fn name(&self) -> &'static str {
        match self {
            ContainerKind::Jpeg => "JPEG",
            ContainerKind::Tiff => "TIFF",
            ContainerKind::Orf => "Olympus ORF",
            ContainerKind::Rw2 => "Panasonic RW2",
            ContainerKind::Raf => "Fujifilm RAF",
            ContainerKind::Png => "PNG",
            ContainerKind::Flac => "FLAC",
            ContainerKind::Mp3 => "MP3",
            ContainerKind::Bmff => "ISO base media",
        }
    }

    /// Containers whose first bytes are a TIFF header.
    pub const fn is_tiff_family(&self) -> bool {
        matches!(
            self,
            ContainerKind::Tiff | ContainerKind::Orf | ContainerKind::Rw2
        )
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Bytes read for detection.
const SNIFF_BYTES: usize = 12;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Classify a container from its leading bytes.
pub fn sniff_container(head: &[u8]) -> Option<ContainerKind> {
    if head.len() < 4 {
        return None;
    }

    if head.len() >= 8 && &head[4..8] == b"ftyp" {
        return Some(ContainerKind::Bmff);
    }

    let kind = match &head[..4] {
        b"fLaC" => ContainerKind::Flac,
        [b'I', b'D', b'3', 2..=4] => ContainerKind::Mp3,
        [0xFF, 0xFB, 0x90, _] => ContainerKind::Mp3,
        [0xFF, 0xD8, _, _] => ContainerKind::Jpeg,
        b"II*\0" | b"MM\0*" => ContainerKind::Tiff,
        b"IIRO" | b"IIRS" => ContainerKind::Orf,
        b"IIU\0" => ContainerKind::Rw2,
        b"FUJI" => ContainerKind::Raf,
        _ if head.len() >= 8 && head[..8] == PNG_SIGNATURE => ContainerKind::Png,
        _ => return None,
    };
    Some(kind)
}

/// Detect the container of a source.
///
/// # Returns
/// * `Ok(ContainerKind)` - The detected container
/// * `Err(FormatError::UnsupportedContainer)` - No front end recognizes it
pub fn detect_container(source: &dyn ByteSource) -> Result<ContainerKind, FormatError> {
    let head = source.read_zeroed(0, SNIFF_BYTES);
    sniff_container(&head).ok_or_else(|| FormatError::UnsupportedContainer {
        reason: format!(
            "unrecognized leading bytes {:02X?} in {}",
            &head[..4],
            source.identifier()
        ),
    })
}

// =============================================================================
// Image signatures
// =============================================================================

/// Whether bytes start like an image a viewer can render: JPEG, PNG, BMP or
/// ISO base media.
pub fn is_image_signature(head: &[u8]) -> bool {
    if head.len() >= 8 && &head[4..8] == b"ftyp" {
        return true;
    }
    head.len() >= 2
        && matches!(
            [head[0], head[1]],
            [0xFF, 0xD8] | [0x89, 0x50] | [0x42, 0x4D]
        )
}

/// Whether the bytes at `offset` start like an image.
pub fn has_image_signature(source: &dyn ByteSource, offset: u64) -> bool {
    offset < source.size() && is_image_signature(&source.read_zeroed(offset, 8))
}

//! In-place orientation rewrite.
//!
//! Rotating a photo that carries an orientation tag never touches pixels:
//! the tag's 2-byte value is overwritten with the rotated orientation. The
//! parse pass records where the value lives ([`OrientationRecord`]); this
//! module turns that record into [`OrientationPatch`]es and writes them.
//!
//! Only the four non-mirrored orientations form the rotation cycle:
//!
//! ```text
//! right:  1 -> 6 -> 3 -> 8 -> 1
//! left:   1 -> 8 -> 3 -> 6 -> 1
//! ```
//!
//! Any other stored value is treated as 1 before rotating.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{IoError, RotateError};
use crate::format::tiff::FieldType;
use crate::metadata::{OrientationRecord, ParsedMetadata};

// =============================================================================
// Orientation
// =============================================================================

/// Direction of a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Left,
    Right,
}

/// One of the four rotation-only orientation values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    /// 1: top-left
    Normal,
    /// 3: bottom-right
    Rotate180,
    /// 6: right-top, shown rotated 90 degrees clockwise
    Rotate90,
    /// 8: left-bottom, shown rotated 270 degrees clockwise
    Rotate270,
}

impl Orientation {
    /// Map a stored value, normalizing anything outside the cycle to
    /// [`Orientation::Normal`].
    pub fn from_value(value: u16) -> Self {
        match value {
            3 => Orientation::Rotate180,
            6 => Orientation::Rotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub const fn value(self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::Rotate180 => 3,
            Orientation::Rotate90 => 6,
            Orientation::Rotate270 => 8,
        }
    }

    pub fn rotate(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Right => self.rotated_right(),
            Rotation::Left => self.rotated_left(),
        }
    }

    pub fn rotated_right(self) -> Self {
        match self {
            Orientation::Normal => Orientation::Rotate90,
            Orientation::Rotate90 => Orientation::Rotate180,
            Orientation::Rotate180 => Orientation::Rotate270,
            Orientation::Rotate270 => Orientation::Normal,
        }
    }

    pub fn rotated_left(self) -> Self {
        match self {
            Orientation::Normal => Orientation::Rotate270,
            Orientation::Rotate270 => Orientation::Rotate180,
            Orientation::Rotate180 => Orientation::Rotate90,
            Orientation::Rotate90 => Orientation::Normal,
        }
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Bytes to write at one absolute file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationPatch {
    pub offset: u64,
    pub bytes: [u8; 2],
}

/// Result of planning a rotation: the new value and the writes that store it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    pub orientation: Orientation,
    pub patches: Vec<OrientationPatch>,
}

/// Plan a rotation without touching any file.
///
/// Every recorded target must be a SHORT at a nonzero offset; otherwise the
/// rotation is refused and nothing is written. Each target is encoded in
/// the byte order it was read with.
pub fn plan_rotation(
    record: Option<&OrientationRecord>,
    rotation: Rotation,
) -> Result<RotationPlan, RotateError> {
    let record = record.ok_or(RotateError::NoOrientation)?;
    if record.targets.is_empty() {
        return Err(RotateError::NoOrientation);
    }

    for target in &record.targets {
        if target.field_type != FieldType::Short as u16 {
            return Err(RotateError::UnexpectedType(target.field_type));
        }
        if target.offset == 0 {
            return Err(RotateError::ZeroOffset);
        }
    }

    let orientation = Orientation::from_value(record.value).rotate(rotation);
    let patches = record
        .targets
        .iter()
        .map(|target| OrientationPatch {
            offset: target.offset,
            bytes: target.byte_order.u16_bytes(orientation.value()),
        })
        .collect();

    Ok(RotationPlan {
        orientation,
        patches,
    })
}

// =============================================================================
// Writing
// =============================================================================

/// Write patches to any seekable writer.
pub fn apply_patches<W: Write + Seek>(
    writer: &mut W,
    patches: &[OrientationPatch],
) -> Result<(), IoError> {
    for patch in patches {
        let write_error = |e: std::io::Error| IoError::Write {
            offset: patch.offset,
            message: e.to_string(),
        };
        writer
            .seek(SeekFrom::Start(patch.offset))
            .map_err(write_error)?;
        writer.write_all(&patch.bytes).map_err(write_error)?;
    }
    writer.flush().map_err(|e| IoError::Write {
        offset: patches.first().map_or(0, |p| p.offset),
        message: e.to_string(),
    })
}

/// Open `path` read-write and apply patches in one short burst.
pub fn apply_patches_to_file(path: &Path, patches: &[OrientationPatch]) -> Result<(), IoError> {
    let identifier = path.display().to_string();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| IoError::from_open(&identifier, e))?;
    apply_patches(&mut file, patches)
}

/// Rotate the file at `path` and update `meta` to match.
///
/// `meta` must come from parsing the same file. On any error the file and
/// `meta` are left as they were.
pub fn rotate_file(
    path: &Path,
    meta: &mut ParsedMetadata,
    rotation: Rotation,
) -> Result<Orientation, RotateError> {
    let plan = plan_rotation(meta.orientation.as_ref(), rotation).map_err(|e| {
        debug!("{}: refusing to rotate: {}", path.display(), e);
        e
    })?;

    apply_patches_to_file(path, &plan.patches)?;

    let value = plan.orientation.value();
    if let Some(record) = meta.orientation.as_mut() {
        record.value = value;
        for target in &mut record.targets {
            target.value = value;
        }
    }
    debug!("{}: orientation is now {}", path.display(), value);
    Ok(plan.orientation)
}

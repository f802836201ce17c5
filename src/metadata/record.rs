//! The aggregate result of one parse.
//!
//! Every field is optional: `None` is the "unknown" state, and a freshly
//! constructed [`ParsedMetadata`] is entirely unknown. Walkers only ever
//! fill fields in; nothing is cleared mid-parse.

use serde::Serialize;

use crate::format::tiff::ByteOrder;

// =============================================================================
// Rational
// =============================================================================

/// Unsigned rational as stored in RATIONAL tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Floating point value, `None` when either part is zero.
    pub fn to_f64(self) -> Option<f64> {
        if self.num == 0 || self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }

    /// Both parts nonzero.
    pub fn is_valid(self) -> bool {
        self.num != 0 && self.den != 0
    }
}

// =============================================================================
// Orientation record
// =============================================================================

/// Where an orientation tag's value field lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrientationTarget {
    /// Absolute file offset of the 2-byte value
    pub offset: u64,

    /// Field type code the tag was stored with
    pub field_type: u16,

    pub byte_order: ByteOrder,

    /// Value read at this location
    pub value: u16,
}

/// Orientation value plus every location it was read from (at most two).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrientationRecord {
    pub value: u16,
    pub targets: Vec<OrientationTarget>,
}

impl OrientationRecord {
    /// Maximum number of write targets kept.
    pub const MAX_TARGETS: usize = 2;
}

// =============================================================================
// Embedded image and sensor geometry
// =============================================================================

/// Byte range and dimensions of the best embedded preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddedImage {
    pub offset: u64,
    pub length: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Sensor border geometry from maker-note tag 224.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorBorder {
    pub width: i16,
    pub height: i16,
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

// =============================================================================
// ParsedMetadata
// =============================================================================

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedMetadata {
    pub make: Option<String>,
    pub model: Option<String>,
    pub body_serial: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub lens_serial: Option<String>,

    /// DateTimeOriginal (Exif 36867)
    pub date_time_original: Option<String>,
    /// DateTime (IFD0 306)
    pub date_time: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,

    pub iso: Option<u32>,
    pub exposure_time: Option<Rational>,
    pub aperture: Option<Rational>,
    pub exposure_program: Option<u32>,
    pub exposure_mode: Option<u32>,

    pub focal_length: Option<Rational>,
    pub focal_length_35mm: Option<u32>,

    /// Sensor size in whole millimetres, derived from focal-plane resolution
    pub sensor_width_mm: Option<u32>,
    pub sensor_height_mm: Option<u32>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub orientation: Option<OrientationRecord>,
    pub embedded: Option<EmbeddedImage>,
    pub sensor_border: Option<SensorBorder>,

    /// An XMP packet written by Adobe software is present
    pub holds_adobe_edits: bool,
}

impl ParsedMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture time, preferring DateTimeOriginal.
    pub fn capture_time(&self) -> Option<&str> {
        self.date_time_original
            .as_deref()
            .or(self.date_time.as_deref())
    }

    /// Current orientation value, if a tag was found.
    pub fn orientation_value(&self) -> Option<u16> {
        self.orientation.as_ref().map(|o| o.value)
    }

    /// Raise width to `value` if it is larger.
    pub fn merge_width(&mut self, value: u32) {
        merge_max(&mut self.width, value);
    }

    /// Raise height to `value` if it is larger.
    pub fn merge_height(&mut self, value: u32) {
        merge_max(&mut self.height, value);
    }

    /// Record one occurrence of the orientation tag.
    ///
    /// The first occurrence sets the value; a second adds a write target.
    /// Further occurrences are ignored.
    pub fn record_orientation(&mut self, target: OrientationTarget) {
        match &mut self.orientation {
            None => {
                self.orientation = Some(OrientationRecord {
                    value: target.value,
                    targets: vec![target],
                })
            }
            Some(record) if record.targets.len() < OrientationRecord::MAX_TARGETS => {
                record.targets.push(target)
            }
            Some(_) => {}
        }
    }
}

/// Store `value` only when it is not empty.
pub fn set_text(field: &mut Option<String>, value: String) {
    if !value.is_empty() {
        *field = Some(value);
    }
}

/// Raise `field` to `value` if it is larger (or unset), ignoring zero.
pub fn merge_max(field: &mut Option<u32>, value: u32) {
    if value != 0 && field.map_or(true, |current| value > current) {
        *field = Some(value);
    }
}

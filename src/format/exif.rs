//! Walkers for the standard directory trees: IFD0, SubIFDs, Exif and GPS.
//!
//! A [`TagWalker`] owns everything one pass over a TIFF structure needs:
//! the result being filled, the embedded-image locator, the traversal guard
//! and the entry cap. Maker notes are handed to the vendor table in
//! [`super::makernote`], which re-enters the walker with a new context.
//!
//! Tags are only trusted with the types cameras actually use for them; an
//! entry with an unexpected type is ignored rather than misread.

use tracing::{debug, trace};

use crate::io::ByteSource;
use crate::metadata::record::set_text;
use crate::metadata::{EmbeddedImageLocator, OrientationTarget, ParsedMetadata, Rational};

use super::detect::has_image_signature;
use super::tiff::{
    ChainCursor, Directory, DirectoryContext, DirectoryLimits, FieldType, TagEntry, TiffTag,
    TraversalGuard, ValueReader,
};

/// Make string whose files may set a high byte in type codes.
const PANASONIC: &str = "Panasonic";

/// Marker proving an XMP packet came from Adobe software.
const ADOBE_XMP_MARKER: &[u8] = b"Adobe XMP Core";

/// Bounds on the XMP packet size that is searched.
const XMP_MIN_LEN: u32 = 4;
const XMP_MAX_LEN: u32 = 65536;

/// Raw image data stored 16 bits per sample is never a preview.
const RAW_BITS_PER_SAMPLE: u32 = 16;

/// Offset values meaning "no data".
const INVALID_OFFSET: u32 = 0xFFFF_FFFF;

/// Focal plane resolution units.
const UNIT_INCH: u32 = 2;
const UNIT_CENTIMETER: u32 = 3;

// =============================================================================
// TagWalker
// =============================================================================

/// One pass over a TIFF directory tree.
pub struct TagWalker<'a> {
    pub(super) source: &'a dyn ByteSource,
    pub(super) meta: &'a mut ParsedMetadata,
    pub(super) locator: &'a mut EmbeddedImageLocator,
    pub(super) guard: &'a mut TraversalGuard,
    max_entries: u16,

    /// IFD0 tags below 254 and 280..=290 are Panasonic RW2 private tags
    rw2_private_tags: bool,
}

/// Raw-data gate shared by all directories of one chain.
#[derive(Debug, Default)]
struct StripGate {
    /// NewSubfileType bit 0 is clear: full-resolution raw data
    likely_raw: bool,
    bits_per_sample: u32,
}

/// Candidate offsets waiting for their length tag, reset per directory.
#[derive(Debug, Default)]
struct PendingImage {
    strip: Option<u64>,
    jpeg: Option<u64>,
}

impl<'a> TagWalker<'a> {
    pub fn new(
        source: &'a dyn ByteSource,
        meta: &'a mut ParsedMetadata,
        locator: &'a mut EmbeddedImageLocator,
        guard: &'a mut TraversalGuard,
        max_entries: u16,
    ) -> Self {
        Self {
            source,
            meta,
            locator,
            guard,
            max_entries,
            rw2_private_tags: false,
        }
    }

    /// Interpret Panasonic RW2 private tags in IFD0.
    pub fn with_rw2_private_tags(mut self, enabled: bool) -> Self {
        self.rw2_private_tags = enabled;
        self
    }

    pub(super) fn limits(&self) -> DirectoryLimits {
        DirectoryLimits {
            max_entries: self.max_entries,
            mask_type_high_byte: self.meta.make.as_deref() == Some(PANASONIC),
        }
    }

    /// Run `walk` one nesting level down, skipping it past the depth bound.
    pub(super) fn nested(&mut self, what: &str, walk: impl FnOnce(&mut Self)) {
        if let Err(e) = self.guard.descend() {
            debug!("{}: not entering {}: {}", self.source.identifier(), what, e);
            return;
        }
        walk(self);
        self.guard.ascend();
    }

    /// Visit every directory of the chain starting at relative `first`.
    pub(super) fn for_each_directory(
        &mut self,
        first: u64,
        ctx: &DirectoryContext,
        mut visit: impl FnMut(&mut Self, &Directory),
    ) {
        let mut cursor = ChainCursor::new(first);
        loop {
            let limits = self.limits();
            let Some(dir) = cursor.next_directory(self.source, ctx, &limits, self.guard) else {
                break;
            };
            trace!(
                "{}: directory at {} with {} entries",
                self.source.identifier(),
                ctx.absolute(dir.offset),
                dir.entries.len()
            );
            visit(self, &dir);
        }
    }

    /// Candidate image offset if `value` points at something image-like.
    fn image_at(&self, ctx: &DirectoryContext, value: u32) -> Option<u64> {
        if value == 0 || value == INVALID_OFFSET {
            return None;
        }
        let absolute = ctx.absolute(value as u64);
        has_image_signature(self.source, absolute).then_some(absolute)
    }

    pub(super) fn offer(&mut self, offset: u64, length: u32) {
        if length == 0 || length == INVALID_OFFSET {
            return;
        }
        if self.locator.offer(self.source, offset, length as u64) {
            debug!(
                "{}: embedded image candidate at {} ({} bytes)",
                self.source.identifier(),
                offset,
                length
            );
        }
    }

    // -------------------------------------------------------------------------
    // IFD0
    // -------------------------------------------------------------------------

    /// Walk the IFD0 chain at relative offset `first`.
    pub fn walk_ifd0(&mut self, first: u64, ctx: DirectoryContext) {
        let mut gate = StripGate::default();
        self.for_each_directory(first, &ctx, |walker, dir| {
            let mut pending = PendingImage::default();
            for entry in &dir.entries {
                walker.ifd0_entry(entry, &ctx, &mut gate, &mut pending);
            }
        });
    }

    fn ifd0_entry(
        &mut self,
        entry: &TagEntry,
        ctx: &DirectoryContext,
        gate: &mut StripGate,
        pending: &mut PendingImage,
    ) {
        if self.rw2_private_tags && (entry.id < 254 || (280..=290).contains(&entry.id)) {
            self.rw2_entry(entry, ctx);
            return;
        }

        let values = ValueReader::new(self.source, *ctx);
        let Some(tag) = TiffTag::from_u16(entry.id) else {
            return;
        };

        match tag {
            TiffTag::NewSubfileType if entry.is_integer() => {
                gate.likely_raw = entry.value & 1 == 0;
            }
            TiffTag::ImageWidth if entry.is_integer() => self.meta.merge_width(entry.value),
            TiffTag::ImageLength if entry.is_integer() => self.meta.merge_height(entry.value),
            TiffTag::BitsPerSample if entry.has_type(FieldType::Short) => match entry.count {
                1 => gate.bits_per_sample = entry.value,
                3 => gate.bits_per_sample = values.u16_at(entry.value as u64) as u32,
                _ => {}
            },
            TiffTag::Make if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.make, values.string(entry))
            }
            TiffTag::Model if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.model, values.string(entry))
            }
            TiffTag::StripOffsets if entry.is_integer() => {
                if !gate.likely_raw {
                    pending.strip = self.image_at(ctx, entry.value);
                }
            }
            TiffTag::StripByteCounts if entry.is_integer() => {
                if let Some(offset) = pending.strip {
                    if gate.bits_per_sample != RAW_BITS_PER_SAMPLE && !gate.likely_raw {
                        self.offer(offset, entry.value);
                    }
                }
            }
            TiffTag::Orientation if entry.is_integer() => {
                self.meta.record_orientation(OrientationTarget {
                    offset: ctx.absolute(entry.value_field),
                    field_type: entry.field_type_raw,
                    byte_order: ctx.byte_order,
                    value: entry.value as u16,
                });
            }
            TiffTag::DateTime if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.date_time, values.string(entry))
            }
            TiffTag::SubIfds
                if entry.has_type(FieldType::Long) || entry.has_type(FieldType::Ifd) =>
            {
                self.walk_sub_ifds(entry, ctx);
            }
            TiffTag::JpegInterchangeFormat if entry.is_integer() => {
                if !gate.likely_raw {
                    pending.jpeg = self.image_at(ctx, entry.value);
                }
            }
            TiffTag::JpegInterchangeFormatLength if entry.is_integer() => {
                if let Some(offset) = pending.jpeg {
                    self.offer(offset, entry.value);
                }
            }
            TiffTag::XmlPacket => self.check_xmp(entry, &values),
            TiffTag::ExifIfd => {
                let first = entry.value as u64;
                self.nested("Exif IFD", |w| w.walk_exif(first, *ctx));
            }
            TiffTag::GpsIfd => {
                let first = entry.value as u64;
                self.nested("GPS IFD", |w| w.walk_gps(first, *ctx));
            }
            // Nikon sometimes stores this in IFD0 rather than the Exif IFD
            TiffTag::FocalLengthIn35mmFilm if entry.is_integer() => {
                self.meta.focal_length_35mm = Some(entry.value);
            }
            TiffTag::LensSerialNumber if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.lens_serial, values.string(entry))
            }
            TiffTag::CameraSerialNumber if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.body_serial, values.string(entry))
            }
            // Sony and Ricoh keep a second maker note here
            TiffTag::DngPrivateData if entry.is_integer() => {
                let offset = entry.value as u64;
                self.nested("DNG private data", |w| w.walk_makernote(offset, *ctx));
            }
            _ => {}
        }
    }

    /// Panasonic RW2 private IFD0 tags.
    fn rw2_entry(&mut self, entry: &TagEntry, ctx: &DirectoryContext) {
        match entry.id {
            2 => self.meta.merge_width(entry.value),
            3 => self.meta.merge_height(entry.value),
            23 => self.meta.iso = Some(entry.value),
            // JpgFromRaw: the count is the byte length
            46 => {
                let offset = ctx.absolute(entry.value as u64);
                self.offer(offset, entry.count);
            }
            _ => {}
        }
    }

    fn check_xmp(&mut self, entry: &TagEntry, values: &ValueReader<'_>) {
        if entry.count <= XMP_MIN_LEN || entry.count >= XMP_MAX_LEN {
            return;
        }
        let packet = values.bytes_at(entry.value as u64, entry.count as usize);
        if packet
            .windows(ADOBE_XMP_MARKER.len())
            .any(|w| w == ADOBE_XMP_MARKER)
        {
            self.meta.holds_adobe_edits = true;
        }
    }

    // -------------------------------------------------------------------------
    // SubIFDs
    // -------------------------------------------------------------------------

    fn walk_sub_ifds(&mut self, entry: &TagEntry, ctx: &DirectoryContext) {
        if entry.count == 1 {
            let first = entry.value as u64;
            self.nested("SubIFD", |w| w.walk_generic(first, *ctx));
            return;
        }

        let values = ValueReader::new(self.source, *ctx);
        let count = entry.count.min(self.max_entries as u32) as u64;
        for i in 0..count {
            let first = values.u32_at(entry.value as u64 + i * 4) as u64;
            self.nested("SubIFD", |w| w.walk_generic(first, *ctx));
        }
    }

    /// Walk a SubIFD chain: dimensions and preview candidates only.
    pub fn walk_generic(&mut self, first: u64, ctx: DirectoryContext) {
        let mut gate = StripGate::default();
        self.for_each_directory(first, &ctx, |walker, dir| {
            let mut pending = PendingImage::default();
            for entry in &dir.entries {
                walker.generic_entry(entry, &ctx, &mut gate, &mut pending);
            }
        });
    }

    fn generic_entry(
        &mut self,
        entry: &TagEntry,
        ctx: &DirectoryContext,
        gate: &mut StripGate,
        pending: &mut PendingImage,
    ) {
        match TiffTag::from_u16(entry.id) {
            Some(TiffTag::NewSubfileType) if entry.has_type(FieldType::Long) => {
                gate.likely_raw = entry.value & 1 == 0;
            }
            Some(TiffTag::ImageWidth) if entry.is_integer() => self.meta.merge_width(entry.value),
            Some(TiffTag::ImageLength) if entry.is_integer() => self.meta.merge_height(entry.value),
            Some(TiffTag::StripOffsets) if entry.is_integer() => {
                if !gate.likely_raw {
                    pending.strip = self.image_at(ctx, entry.value);
                }
            }
            Some(TiffTag::StripByteCounts) if entry.is_integer() => {
                if let Some(offset) = pending.strip.filter(|_| !gate.likely_raw) {
                    self.offer(offset, entry.value);
                }
            }
            Some(TiffTag::JpegInterchangeFormat) if entry.is_integer() => {
                if !gate.likely_raw {
                    pending.jpeg = self.image_at(ctx, entry.value);
                }
            }
            Some(TiffTag::JpegInterchangeFormatLength) if entry.is_integer() => {
                if let Some(offset) = pending.jpeg {
                    self.offer(offset, entry.value);
                }
            }
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // Exif IFD
    // -------------------------------------------------------------------------

    /// Walk the Exif IFD chain at relative offset `first`.
    pub fn walk_exif(&mut self, first: u64, ctx: DirectoryContext) {
        let mut plane = FocalPlane::default();
        self.for_each_directory(first, &ctx, |walker, dir| {
            for entry in &dir.entries {
                walker.exif_entry(entry, &ctx, &mut plane);
            }
        });

        if let Some((width, height)) = plane.sensor_size_mm() {
            self.meta.sensor_width_mm = Some(width);
            self.meta.sensor_height_mm = Some(height);
        }
    }

    fn exif_entry(&mut self, entry: &TagEntry, ctx: &DirectoryContext, plane: &mut FocalPlane) {
        let values = ValueReader::new(self.source, *ctx);
        let Some(tag) = TiffTag::from_u16(entry.id) else {
            return;
        };

        match tag {
            TiffTag::ExposureTime if entry.has_type(FieldType::Rational) => {
                self.meta.exposure_time = Some(values.rational(entry));
            }
            // Some phones store the denominator alone
            TiffTag::ExposureTime if entry.has_type(FieldType::Long) => {
                self.meta.exposure_time = Some(Rational::new(1, entry.value));
            }
            TiffTag::FNumber if entry.has_type(FieldType::Rational) => {
                self.meta.aperture = Some(values.rational(entry));
            }
            TiffTag::ExposureProgram => self.meta.exposure_program = Some(entry.value),
            TiffTag::IsoSpeed => self.meta.iso = Some(entry.value),
            TiffTag::DateTimeOriginal if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.date_time_original, values.string(entry))
            }
            TiffTag::FocalLength if entry.has_type(FieldType::Rational) => {
                self.meta.focal_length = Some(values.rational(entry));
            }
            TiffTag::MakerNote => {
                let offset = entry.value as u64;
                self.nested("maker note", |w| w.walk_makernote(offset, *ctx));
            }
            TiffTag::PixelXDimension => {
                plane.pixel_width = entry.value;
                self.meta.merge_width(entry.value);
            }
            TiffTag::PixelYDimension => {
                plane.pixel_height = entry.value;
                self.meta.merge_height(entry.value);
            }
            TiffTag::FocalPlaneXResolution => plane.x_resolution = values.rational(entry),
            TiffTag::FocalPlaneYResolution => plane.y_resolution = values.rational(entry),
            TiffTag::FocalPlaneResolutionUnit => plane.unit = entry.value,
            TiffTag::ExposureMode => self.meta.exposure_mode = Some(entry.value),
            TiffTag::FocalLengthIn35mmFilm => self.meta.focal_length_35mm = Some(entry.value),
            TiffTag::BodySerialNumber if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.body_serial, values.string(entry))
            }
            TiffTag::LensMake if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.lens_make, values.string(entry))
            }
            TiffTag::LensModel if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.lens_model, values.string(entry))
            }
            TiffTag::LensSerialNumber if entry.has_type(FieldType::Ascii) => {
                set_text(&mut self.meta.lens_serial, values.string(entry))
            }
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // GPS IFD
    // -------------------------------------------------------------------------

    /// Walk the GPS IFD chain; the S and W references apply once at the end.
    pub fn walk_gps(&mut self, first: u64, ctx: DirectoryContext) {
        let mut south = false;
        let mut west = false;

        self.for_each_directory(first, &ctx, |walker, dir| {
            let values = ValueReader::new(walker.source, ctx);
            for entry in &dir.entries {
                match entry.id {
                    1 if entry.has_type(FieldType::Ascii) => {
                        south = values.string(entry).starts_with(['S', 's']);
                    }
                    2 => {
                        if let Some(deg) = degrees(&values, entry) {
                            walker.meta.latitude = Some(deg);
                        }
                    }
                    3 if entry.has_type(FieldType::Ascii) => {
                        west = values.string(entry).starts_with(['W', 'w']);
                    }
                    4 => {
                        if let Some(deg) = degrees(&values, entry) {
                            walker.meta.longitude = Some(deg);
                        }
                    }
                    _ => {}
                }
            }
        });

        if south {
            self.meta.latitude = self.meta.latitude.map(|v| -v);
        }
        if west {
            self.meta.longitude = self.meta.longitude.map(|v| -v);
        }
    }
}

/// Degrees + minutes / 60 + seconds / 3600 from three rationals.
fn degrees(values: &ValueReader<'_>, entry: &TagEntry) -> Option<f64> {
    if entry.count != 3 {
        return None;
    }
    let base = entry.value as u64;
    let part = |i: u64| -> f64 {
        if entry.has_type(FieldType::SRational) {
            values.signed_rational_at(base + i * 8)
        } else {
            let r = values.rational_at(base + i * 8);
            if r.den == 0 {
                0.0
            } else {
                r.num as f64 / r.den as f64
            }
        }
    };
    match entry.field_type {
        Some(FieldType::Rational) | Some(FieldType::SRational) => {
            Some(part(0) + part(1) / 60.0 + part(2) / 3600.0)
        }
        _ => None,
    }
}

// =============================================================================
// Focal plane
// =============================================================================

/// Focal plane resolution tags collected across one Exif chain.
#[derive(Debug, Clone, Copy)]
struct FocalPlane {
    x_resolution: Rational,
    y_resolution: Rational,
    unit: u32,
    pixel_width: u32,
    pixel_height: u32,
}

impl Default for FocalPlane {
    fn default() -> Self {
        Self {
            x_resolution: Rational::new(0, 0),
            y_resolution: Rational::new(0, 0),
            unit: 0,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl FocalPlane {
    /// Sensor size in whole millimetres, when every input is present.
    fn sensor_size_mm(&self) -> Option<(u32, u32)> {
        let x = self.x_resolution.to_f64()?;
        let y = self.y_resolution.to_f64()?;
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return None;
        }
        let mm_per_unit = match self.unit {
            UNIT_INCH => 25.4,
            UNIT_CENTIMETER => 10.0,
            _ => return None,
        };
        let width = self.pixel_width as f64 / x * mm_per_unit;
        let height = self.pixel_height as f64 / y * mm_per_unit;
        Some((width.round() as u32, height.round() as u32))
    }
}

//! Vendor maker notes.
//!
//! A maker note is a private directory inside the Exif IFD. Its layout is
//! keyed on the Make string: most vendors put a fixed-size signature before
//! an ordinary directory, some switch byte order, and a few measure their
//! offsets from somewhere other than the enclosing TIFF header.
//!
//! [`VENDOR_RULES`] holds the per-vendor preamble and byte order. The
//! vendor-specific tags are interpreted by the walkers below.

use tracing::debug;

use crate::metadata::record::set_text;
use crate::metadata::SensorBorder;

use super::exif::TagWalker;
use super::tiff::{
    decode_ascii, ByteOrder, DirectoryContext, FieldType, TagEntry, ValueReader, MAX_STRING_LEN,
};

/// Offset of the first directory inside Nikon's embedded TIFF header.
const NIKON_IFD_OFFSET: u64 = 8;

/// Tag 224 carries 17 shorts of sensor geometry.
const SENSOR_BORDER_COUNT: u32 = 17;

const INVALID_OFFSET: u32 = 0xFFFF_FFFF;

// =============================================================================
// Vendor table
// =============================================================================

/// Maker note families with distinct layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Nikon,
    Leica,
    /// RICOH IMAGING (GR, Pentax K bodies)
    RicohImaging,
    /// RICOH (THETA)
    Ricoh,
    Pentax,
    Olympus,
    /// Maker note cannot be parsed
    Kodak,
    Fujifilm,
    Panasonic,
    Apple,
    Sony,
    Canon,
}

/// How to find the directory inside one vendor's maker note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorRule {
    /// Exact Make string
    pub make: &'static str,
    /// Rule only applies to this exact Model
    pub model: Option<&'static str>,
    pub vendor: Vendor,
    /// Bytes between the maker note start and its directory
    pub preamble: u64,
    /// Forced byte order, else the enclosing one
    pub byte_order: Option<ByteOrder>,
}

impl VendorRule {
    const fn new(make: &'static str, vendor: Vendor, preamble: u64) -> Self {
        Self {
            make,
            model: None,
            vendor,
            preamble,
            byte_order: None,
        }
    }

    const fn for_model(self, model: &'static str) -> Self {
        Self {
            model: Some(model),
            ..self
        }
    }

    const fn big_endian(self) -> Self {
        Self {
            byte_order: Some(ByteOrder::BigEndian),
            ..self
        }
    }

    fn matches(&self, make: &str, model: &str) -> bool {
        self.make == make && self.model.map_or(true, |m| m == model)
    }
}

/// Maker note layouts, first match wins.
pub const VENDOR_RULES: &[VendorRule] = &[
    VendorRule::new("NIKON CORPORATION", Vendor::Nikon, 10),
    VendorRule::new("Nikon", Vendor::Nikon, 10),
    VendorRule::new("NIKON", Vendor::Nikon, 10),
    VendorRule::new("LEICA CAMERA AG", Vendor::Leica, 8),
    VendorRule::new("RICOH IMAGING COMPANY, LTD.", Vendor::RicohImaging, 10)
        .for_model("PENTAX K-3 Mark III"),
    VendorRule::new("RICOH IMAGING COMPANY, LTD.", Vendor::RicohImaging, 8),
    VendorRule::new("RICOH", Vendor::Ricoh, 8),
    VendorRule::new("PENTAX", Vendor::Pentax, 6),
    VendorRule::new("OLYMPUS IMAGING CORP.", Vendor::Olympus, 12),
    VendorRule::new("OLYMPUS CORPORATION", Vendor::Olympus, 12),
    VendorRule::new("Eastman Kodak Company", Vendor::Kodak, 0),
    VendorRule::new("FUJIFILM", Vendor::Fujifilm, 12),
    VendorRule::new("Panasonic", Vendor::Panasonic, 12),
    VendorRule::new("Apple", Vendor::Apple, 14).for_model("iPhone 12").big_endian(),
    VendorRule::new("Apple", Vendor::Apple, 14),
    // Cameras
    VendorRule::new("SONY", Vendor::Sony, 0),
    // Phones
    VendorRule::new("Sony", Vendor::Sony, 12),
    VendorRule::new("Canon", Vendor::Canon, 0),
    VendorRule::new("CANON", Vendor::Canon, 0),
    // Some GM1 firmware leaves Make empty
    VendorRule::new("", Vendor::Panasonic, 12).for_model("DMC-GM1"),
];

/// Rule for a Make / Model pair.
pub fn find_rule(make: &str, model: &str) -> Option<&'static VendorRule> {
    VENDOR_RULES.iter().find(|rule| rule.matches(make, model))
}

// =============================================================================
// Dispatch
// =============================================================================

impl TagWalker<'_> {
    /// Walk the maker note at relative `offset` using the rule for the Make
    /// and Model seen so far.
    pub fn walk_makernote(&mut self, offset: u64, ctx: DirectoryContext) {
        let make = self.meta.make.clone().unwrap_or_default();
        let model = self.meta.model.clone().unwrap_or_default();

        let Some(rule) = find_rule(&make, &model) else {
            debug!("{}: no maker note layout for make {:?}", self.source.identifier(), make);
            return;
        };

        let start = offset + rule.preamble;
        let ctx = rule.byte_order.map_or(ctx, |order| ctx.with_order(order));

        match rule.vendor {
            Vendor::Kodak => {
                debug!("{}: {} maker notes are not parsable", self.source.identifier(), make);
            }
            Vendor::Nikon => self.walk_nikon(start, ctx),
            Vendor::Fujifilm => self.walk_fujifilm(offset, start, ctx),
            Vendor::Panasonic => self.walk_panasonic(start, ctx),
            vendor => self.walk_vendor(vendor, offset, start, ctx),
        }
    }

    // -------------------------------------------------------------------------
    // Common layout
    // -------------------------------------------------------------------------

    fn walk_vendor(&mut self, vendor: Vendor, note_start: u64, first: u64, ctx: DirectoryContext) {
        self.for_each_directory(first, &ctx, |walker, dir| {
            for entry in &dir.entries {
                walker.vendor_entry(vendor, note_start, entry, &ctx);
            }
        });
    }

    fn vendor_entry(
        &mut self,
        vendor: Vendor,
        note_start: u64,
        entry: &TagEntry,
        ctx: &DirectoryContext,
    ) {
        let values = ValueReader::new(self.source, *ctx);

        match entry.id {
            5 if vendor == Vendor::Ricoh && entry.has_type(FieldType::Undefined) => {
                if (entry.count as usize) < MAX_STRING_LEN {
                    let raw = values.bytes_at(entry.payload_offset(), entry.count as usize);
                    set_text(&mut self.meta.body_serial, decode_ascii(&raw));
                }
            }
            12 if vendor == Vendor::Canon
                && entry.has_type(FieldType::Long)
                && entry.count == 1 =>
            {
                if self.meta.body_serial.is_none() {
                    self.meta.body_serial = Some(entry.value.to_string());
                }
            }
            224 if entry.count == SENSOR_BORDER_COUNT => {
                let at = entry.payload_offset();
                let field = |i: u64| values.i16_at(at + i * 2);
                self.meta.sensor_border = Some(SensorBorder {
                    width: field(1),
                    height: field(2),
                    left: field(5),
                    top: field(6),
                    right: field(7),
                    bottom: field(8),
                });
            }
            // Serial string measured from the maker note start
            553 if vendor == Vendor::RicohImaging && entry.has_type(FieldType::Ascii) => {
                let serial = note_relative(&values, note_start).string_at_entry(entry);
                set_text(&mut self.meta.body_serial, serial);
            }
            8224 if vendor == Vendor::Olympus && entry.has_type(FieldType::Ifd) => {
                let settings = ctx.rebased(ctx.absolute(note_start));
                let first = entry.value as u64;
                self.nested("Olympus camera settings", |w| {
                    w.walk_olympus_settings(first, settings)
                });
            }
            _ => {}
        }
    }

    /// Olympus CameraSettings: the preview is only trusted when flagged valid.
    fn walk_olympus_settings(&mut self, first: u64, ctx: DirectoryContext) {
        self.for_each_directory(first, &ctx, |walker, dir| {
            let mut valid = false;
            let mut start = None;
            for entry in dir.entries.iter().filter(|e| e.has_type(FieldType::Long)) {
                match entry.id {
                    // PreviewImageValid
                    256 => valid = entry.value != 0,
                    257 if valid => start = Some(ctx.absolute(entry.value as u64)),
                    258 if valid => {
                        if let Some(offset) = start {
                            walker.offer(offset, entry.value);
                        }
                    }
                    _ => {}
                }
            }
        });
    }

    // -------------------------------------------------------------------------
    // Nikon
    // -------------------------------------------------------------------------

    /// Nikon type 3 notes embed a complete TIFF header; every offset inside
    /// is relative to it.
    fn walk_nikon(&mut self, header: u64, ctx: DirectoryContext) {
        let marker = ValueReader::new(self.source, ctx).bytes_at(header, 2);
        let order = if marker[..] == *b"MM" {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let inner = DirectoryContext::new(ctx.absolute(header), order);

        self.for_each_directory(NIKON_IFD_OFFSET, &inner, |walker, dir| {
            let values = ValueReader::new(walker.source, inner);
            for entry in &dir.entries {
                match entry.id {
                    // ISO setting: the second of two shorts
                    2 if entry.has_type(FieldType::Short) => {
                        let iso = if entry.count >= 2 {
                            values.u16_at(entry.payload_offset() + 2) as u32
                        } else {
                            entry.value
                        };
                        if iso != 0 {
                            walker.meta.iso = Some(iso);
                        }
                    }
                    17 if entry.has_type(FieldType::Long) && entry.count == 1 => {
                        let first = entry.value as u64;
                        walker.nested("Nikon preview IFD", |w| w.walk_nikon_preview(first, inner));
                    }
                    _ => {}
                }
            }
        });
    }

    fn walk_nikon_preview(&mut self, first: u64, ctx: DirectoryContext) {
        self.for_each_directory(first, &ctx, |walker, dir| {
            let mut start = None;
            for entry in dir.entries.iter().filter(|e| e.has_type(FieldType::Long)) {
                match entry.id {
                    0x201 if entry.value != INVALID_OFFSET => {
                        start = Some(ctx.absolute(entry.value as u64));
                    }
                    0x202 => {
                        if let Some(offset) = start {
                            walker.offer(offset, entry.value);
                        }
                    }
                    _ => {}
                }
            }
        });
    }

    // -------------------------------------------------------------------------
    // Fujifilm
    // -------------------------------------------------------------------------

    /// Fujifilm measures out-of-line values from the maker note start.
    fn walk_fujifilm(&mut self, note_start: u64, first: u64, ctx: DirectoryContext) {
        self.for_each_directory(first, &ctx, |walker, dir| {
            let values = ValueReader::new(walker.source, ctx);
            for entry in dir.entries.iter().filter(|e| e.id == 16) {
                let serial = note_relative(&values, note_start).string_at_entry(entry);
                set_text(&mut walker.meta.body_serial, serial);
            }
        });
    }

    // -------------------------------------------------------------------------
    // Panasonic
    // -------------------------------------------------------------------------

    fn walk_panasonic(&mut self, first: u64, ctx: DirectoryContext) {
        self.for_each_directory(first, &ctx, |walker, dir| {
            let values = ValueReader::new(walker.source, ctx);
            for entry in &dir.entries {
                let field = match entry.id {
                    // Serial stored as UNDEFINED[16]
                    37 if entry.has_type(FieldType::Undefined) && entry.count == 16 => {
                        &mut walker.meta.body_serial
                    }
                    81 if entry.has_type(FieldType::Ascii) => &mut walker.meta.lens_model,
                    82 if entry.has_type(FieldType::Ascii) => &mut walker.meta.lens_serial,
                    _ => continue,
                };
                // Some editors rewrite these as binary garbage
                let text = values.string(entry);
                if !text.chars().any(char::is_control) {
                    set_text(field, text);
                }
            }
        });
    }
}

// =============================================================================
// Maker-note-relative strings
// =============================================================================

/// Reads strings whose out-of-line offsets count from the maker note start,
/// while short values stay in the entry's own value field.
struct NoteRelative<'a> {
    enclosing: ValueReader<'a>,
    note: ValueReader<'a>,
}

fn note_relative<'a>(values: &ValueReader<'a>, note_start: u64) -> NoteRelative<'a> {
    let ctx = values.context();
    NoteRelative {
        enclosing: *values,
        note: ValueReader::new(values.source(), ctx.rebased(ctx.absolute(note_start))),
    }
}

impl NoteRelative<'_> {
    fn string_at_entry(&self, entry: &TagEntry) -> String {
        if entry.count <= 4 {
            self.enclosing.string_at(entry.value_field, entry.count)
        } else {
            self.note.string_at(entry.value as u64, entry.count)
        }
    }
}

//! Test utilities for integration tests.
//!
//! This module provides a request-tracking byte source and builders for
//! synthetic camera and audio files: Exif TIFF structures plus the JPEG,
//! RW2, FLAC, ID3, HEIF and CR3 wrappers around them.

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tempfile::NamedTempFile;

use metascan::{ByteOrder, ByteSource};

// =============================================================================
// Byte Source with Request Tracking
// =============================================================================

/// An in-memory source that counts every read that reaches it.
///
/// This is useful for verifying block cache behavior.
pub struct TrackingSource {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl TrackingSource {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.lock().unwrap().clear();
    }
}

impl ByteSource for TrackingSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((offset, buf.len()));

        let start = (offset as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Image Generators
// =============================================================================

/// Create a grayscale JPEG with a diagonal gradient.
pub fn create_test_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = GrayImage::from_fn(width, height, |x, y| {
        let val = ((x + y) % 256) as u8;
        Luma([val])
    });

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Create an RGB PNG.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Write bytes to a named temporary file with the given extension.
pub fn write_temp(data: &[u8], extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

// =============================================================================
// TIFF Builder
// =============================================================================

/// Well-known tag numbers used by the tests.
pub mod tags {
    pub const MAKE: u16 = 271;
    pub const MODEL: u16 = 272;
    pub const ORIENTATION: u16 = 274;
    pub const DATE_TIME: u16 = 306;
    pub const JPEG_OFFSET: u16 = 513;
    pub const JPEG_LENGTH: u16 = 514;
    pub const EXIF_IFD: u16 = 34665;
    pub const GPS_IFD: u16 = 34853;
    pub const EXPOSURE_TIME: u16 = 33434;
    pub const F_NUMBER: u16 = 33437;
    pub const ISO: u16 = 34855;
    pub const DATE_TIME_ORIGINAL: u16 = 36867;
    pub const FOCAL_LENGTH: u16 = 37386;
    pub const FOCAL_LENGTH_35MM: u16 = 41989;
    pub const LENS_MODEL: u16 = 42036;
}

#[derive(Debug, Clone)]
enum Payload {
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    Ascii(String),
    Rationals(Vec<(u32, u32)>),
    Raw(Vec<u8>),
    ExifPointer,
    GpsPointer,
    ThumbnailOffset,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Payload,
}

/// Builder for one tag directory.
#[derive(Debug, Clone, Default)]
pub struct IfdBuilder {
    entries: Vec<PendingEntry>,
    thumbnail: Option<Vec<u8>>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, tag: u16, field_type: u16, count: u32, payload: Payload) -> &mut Self {
        self.entries.push(PendingEntry {
            tag,
            field_type,
            count,
            payload,
        });
        self
    }

    pub fn short(&mut self, tag: u16, value: u16) -> &mut Self {
        self.push(tag, 3, 1, Payload::Shorts(vec![value]))
    }

    pub fn ascii(&mut self, tag: u16, text: &str) -> &mut Self {
        let count = text.len() as u32 + 1;
        self.push(tag, 2, count, Payload::Ascii(text.to_string()))
    }

    pub fn rational(&mut self, tag: u16, num: u32, den: u32) -> &mut Self {
        self.rationals(tag, &[(num, den)])
    }

    pub fn rationals(&mut self, tag: u16, values: &[(u32, u32)]) -> &mut Self {
        self.push(tag, 5, values.len() as u32, Payload::Rationals(values.to_vec()))
    }

    /// Entry with pre-encoded bytes and an arbitrary type code.
    pub fn raw(&mut self, tag: u16, field_type: u16, count: u32, data: &[u8]) -> &mut Self {
        self.push(tag, field_type, count, Payload::Raw(data.to_vec()))
    }

    /// Store `jpeg` after the directory and point tags 513/514 at it.
    pub fn thumbnail(&mut self, jpeg: &[u8]) -> &mut Self {
        self.thumbnail = Some(jpeg.to_vec());
        self.push(tags::JPEG_OFFSET, 4, 1, Payload::ThumbnailOffset);
        self.push(tags::JPEG_LENGTH, 4, 1, Payload::Longs(vec![jpeg.len() as u32]))
    }
}

/// Offsets resolved during layout.
#[derive(Debug, Clone, Copy, Default)]
struct Layout {
    exif: u32,
    gps: u32,
}

/// Builder for a complete TIFF structure with optional Exif, GPS and IFD1.
#[derive(Debug, Clone)]
pub struct TiffBuilder {
    byte_order: ByteOrder,
    version: u16,
    ifd0: IfdBuilder,
    exif: Option<IfdBuilder>,
    gps: Option<IfdBuilder>,
    ifd1: Option<IfdBuilder>,
}

impl TiffBuilder {
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            version: 42,
            ifd0: IfdBuilder::new(),
            exif: None,
            gps: None,
            ifd1: None,
        }
    }

    /// Replace the version word (0x55 makes a Panasonic RW2 header).
    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn ifd0(mut self, ifd: IfdBuilder) -> Self {
        self.ifd0 = ifd;
        self
    }

    pub fn exif(mut self, ifd: IfdBuilder) -> Self {
        self.exif = Some(ifd);
        self
    }

    pub fn gps(mut self, ifd: IfdBuilder) -> Self {
        self.gps = Some(ifd);
        self
    }

    pub fn ifd1(mut self, ifd: IfdBuilder) -> Self {
        self.ifd1 = Some(ifd);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut ifd0 = self.ifd0.clone();
        if self.exif.is_some() {
            ifd0.push(tags::EXIF_IFD, 4, 1, Payload::ExifPointer);
        }
        if self.gps.is_some() {
            ifd0.push(tags::GPS_IFD, 4, 1, Payload::GpsPointer);
        }

        // Directory sizes don't depend on the values, so lay out first
        let sizes = |ifd: &IfdBuilder| self.write_ifd(ifd, 0, 0, Layout::default()).len() as u32;
        let ifd0_at = 8u32;
        let mut cursor = ifd0_at + sizes(&ifd0);
        let mut layout = Layout::default();
        if let Some(exif) = &self.exif {
            layout.exif = cursor;
            cursor += sizes(exif);
        }
        if let Some(gps) = &self.gps {
            layout.gps = cursor;
            cursor += sizes(gps);
        }
        let ifd1_at = self.ifd1.as_ref().map(|_| cursor);

        let mut data = Vec::new();
        data.extend_from_slice(match self.byte_order {
            ByteOrder::LittleEndian => b"II",
            ByteOrder::BigEndian => b"MM",
        });
        data.extend_from_slice(&self.u16_bytes(self.version));
        data.extend_from_slice(&self.u32_bytes(ifd0_at));

        data.extend(self.write_ifd(&ifd0, ifd0_at, ifd1_at.unwrap_or(0), layout));
        if let Some(exif) = &self.exif {
            data.extend(self.write_ifd(exif, layout.exif, 0, layout));
        }
        if let Some(gps) = &self.gps {
            data.extend(self.write_ifd(gps, layout.gps, 0, layout));
        }
        if let (Some(ifd1), Some(at)) = (&self.ifd1, ifd1_at) {
            data.extend(self.write_ifd(ifd1, at, 0, layout));
        }
        data
    }

    /// Serialize one directory at offset `base`, followed by its
    /// out-of-line values (thumbnail first).
    fn write_ifd(&self, ifd: &IfdBuilder, base: u32, next: u32, layout: Layout) -> Vec<u8> {
        let count = ifd.entries.len() as u32;
        let external_start = base + 2 + count * 12 + 4;

        let mut external = Vec::new();
        let thumbnail_at = external_start;
        if let Some(jpeg) = &ifd.thumbnail {
            external.extend_from_slice(jpeg);
            pad_even(&mut external);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&self.u16_bytes(count as u16));
        for entry in &ifd.entries {
            let bytes = match &entry.payload {
                Payload::Raw(v) => v.clone(),
                Payload::Shorts(v) => v.iter().flat_map(|&s| self.u16_bytes(s)).collect(),
                Payload::Longs(v) => v.iter().flat_map(|&l| self.u32_bytes(l)).collect(),
                Payload::Ascii(s) => {
                    let mut b = s.as_bytes().to_vec();
                    b.push(0);
                    b
                }
                Payload::Rationals(v) => v
                    .iter()
                    .flat_map(|&(n, d)| {
                        let mut b = self.u32_bytes(n).to_vec();
                        b.extend_from_slice(&self.u32_bytes(d));
                        b
                    })
                    .collect(),
                Payload::ExifPointer => self.u32_bytes(layout.exif).to_vec(),
                Payload::GpsPointer => self.u32_bytes(layout.gps).to_vec(),
                Payload::ThumbnailOffset => self.u32_bytes(thumbnail_at).to_vec(),
            };

            out.extend_from_slice(&self.u16_bytes(entry.tag));
            out.extend_from_slice(&self.u16_bytes(entry.field_type));
            out.extend_from_slice(&self.u32_bytes(entry.count));
            if bytes.len() <= 4 {
                let mut inline = bytes;
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                let at = external_start + external.len() as u32;
                out.extend_from_slice(&self.u32_bytes(at));
                external.extend_from_slice(&bytes);
                pad_even(&mut external);
            }
        }
        out.extend_from_slice(&self.u32_bytes(next));
        out.extend(external);
        out
    }

    fn u16_bytes(&self, value: u16) -> [u8; 2] {
        match self.byte_order {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self.byte_order {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

fn pad_even(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

/// Typical camera IFD0: make, model and orientation.
pub fn camera_ifd0(make: &str, model: &str, orientation: u16) -> IfdBuilder {
    let mut ifd = IfdBuilder::new();
    ifd.ascii(tags::MAKE, make)
        .ascii(tags::MODEL, model)
        .short(tags::ORIENTATION, orientation);
    ifd
}

// =============================================================================
// Container Wrappers
// =============================================================================

/// Insert an Exif APP1 segment holding `tiff` right after SOI.
pub fn jpeg_with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG stream");

    let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
    out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Offset of the TIFF header inside a file built by [`jpeg_with_exif`].
pub const JPEG_EXIF_TIFF_OFFSET: u64 = 12;

/// Wrap `image` as the cover art of an ID3v2.3 tag, followed by a few audio
/// frame bytes. Returns the file and the image offset inside it.
pub fn mp3_with_cover(image: &[u8], mime: &str) -> (Vec<u8>, u64) {
    let mut title = vec![0u8];
    title.extend_from_slice(b"Track One");
    let title_frame = id3_frame(b"TIT2", &title);

    let mut apic = vec![0u8];
    apic.extend_from_slice(mime.as_bytes());
    apic.push(0);
    apic.push(3);
    apic.extend_from_slice(b"Front\0");
    let image_in_frame = apic.len();
    apic.extend_from_slice(image);
    let apic_frame = id3_frame(b"APIC", &apic);

    let body_len = title_frame.len() + apic_frame.len();
    let mut out = b"ID3".to_vec();
    out.extend_from_slice(&[3, 0, 0]);
    out.extend_from_slice(&synchsafe(body_len as u32));
    out.extend_from_slice(&title_frame);
    let image_at = out.len() + 10 + image_in_frame;
    out.extend_from_slice(&apic_frame);

    out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
    out.resize(out.len() + 400, 0);
    (out, image_at as u64)
}

fn id3_frame(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(payload);
    out
}

fn synchsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// A FLAC stream with STREAMINFO and one PICTURE block holding `image`.
/// Returns the file and the image offset inside it.
pub fn flac_with_picture(image: &[u8], mime: &str, width: u32, height: u32) -> (Vec<u8>, u64) {
    let mut picture = Vec::new();
    picture.extend_from_slice(&3u32.to_be_bytes());
    picture.extend_from_slice(&(mime.len() as u32).to_be_bytes());
    picture.extend_from_slice(mime.as_bytes());
    picture.extend_from_slice(&0u32.to_be_bytes());
    picture.extend_from_slice(&width.to_be_bytes());
    picture.extend_from_slice(&height.to_be_bytes());
    picture.extend_from_slice(&24u32.to_be_bytes());
    picture.extend_from_slice(&0u32.to_be_bytes());
    picture.extend_from_slice(&(image.len() as u32).to_be_bytes());
    let image_in_block = picture.len();
    picture.extend_from_slice(image);

    let mut out = b"fLaC".to_vec();
    out.extend_from_slice(&flac_block_header(false, 0, 34));
    out.extend_from_slice(&[0u8; 34]);
    out.extend_from_slice(&flac_block_header(true, 6, picture.len()));
    let image_at = out.len() + image_in_block;
    out.extend_from_slice(&picture);
    out.extend_from_slice(&[0xFF, 0xF8, 0x69, 0x08]);
    (out, image_at as u64)
}

fn flac_block_header(last: bool, kind: u8, len: usize) -> [u8; 4] {
    let flag = if last { 0x80 } else { 0 };
    let len = len as u32;
    [flag | kind, (len >> 16) as u8, (len >> 8) as u8, len as u8]
}

/// A Panasonic RW2: IIU header, private width/height tags and a JpgFromRaw
/// (tag 46) preview carrying its own Exif.
pub fn rw2_with_preview(make: &str, preview: &[u8]) -> Vec<u8> {
    // IFD0: 2 (width), 3 (height), 46 (preview), 271 (make)
    let mut ifd0 = IfdBuilder::new();
    ifd0.short(2, 4000)
        .short(3, 3000)
        .raw(46, 7, preview.len() as u32, preview)
        .ascii(tags::MAKE, make);

    TiffBuilder::new(ByteOrder::LittleEndian)
        .with_version(0x55)
        .ifd0(ifd0)
        .build()
}

/// Build an ISO base media box.
pub fn make_box(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    out
}

fn full_box(tag: &[u8; 4], version: u8, rest: &[u8]) -> Vec<u8> {
    let mut payload = vec![version, 0, 0, 0];
    payload.extend_from_slice(rest);
    make_box(tag, &payload)
}

/// A HEIC file whose only item is an Exif block holding `tiff`.
pub fn heif_with_exif(tiff: &[u8]) -> Vec<u8> {
    const ITEM_ID: u16 = 1;

    // Exif item: offset to the TIFF header, "Exif\0\0", TIFF
    let mut item = 6u32.to_be_bytes().to_vec();
    item.extend_from_slice(b"Exif\0\0");
    item.extend_from_slice(tiff);

    let mut infe = ITEM_ID.to_be_bytes().to_vec();
    infe.extend_from_slice(&0u16.to_be_bytes());
    infe.extend_from_slice(b"Exif");
    infe.push(0);
    let mut iinf = 1u16.to_be_bytes().to_vec();
    iinf.extend(full_box(b"infe", 2, &infe));
    let iinf = full_box(b"iinf", 0, &iinf);

    let iloc_for = |item_at: u32| {
        let mut rest = vec![0x44, 0x00];
        rest.extend_from_slice(&1u16.to_be_bytes());
        rest.extend_from_slice(&ITEM_ID.to_be_bytes());
        rest.extend_from_slice(&0u16.to_be_bytes());
        rest.extend_from_slice(&1u16.to_be_bytes());
        rest.extend_from_slice(&item_at.to_be_bytes());
        rest.extend_from_slice(&(item.len() as u32).to_be_bytes());
        full_box(b"iloc", 0, &rest)
    };
    let meta_for = |item_at: u32| {
        let mut payload = vec![0, 0, 0, 0];
        payload.extend_from_slice(&iinf);
        payload.extend(iloc_for(item_at));
        make_box(b"meta", &payload)
    };

    let ftyp = make_box(b"ftyp", b"heic\0\0\0\0mif1heic");
    let item_at = (ftyp.len() + meta_for(0).len()) as u32;

    let mut data = ftyp;
    data.extend(meta_for(item_at));
    data.extend_from_slice(&item);
    data
}

const UUID_CANON_METADATA: [u8; 16] = [
    0x85, 0xc0, 0xb6, 0x87, 0x82, 0x0f, 0x11, 0xe0, 0x81, 0x11, 0xf4, 0xce, 0x46, 0x2b, 0x6a, 0x48,
];

const UUID_CANON_PREVIEW: [u8; 16] = [
    0xea, 0xf4, 0x2b, 0x5e, 0x1c, 0x98, 0x4b, 0x88, 0xb9, 0xfb, 0xb7, 0xdc, 0x40, 0x6e, 0x4d, 0x16,
];

/// A hand-made JPEG stream in the layout Canon writes into `mdat`
/// (starts FFD8 FFDB), padded to `len` bytes.
pub fn canon_full_jpeg(width: u16, height: u16, len: usize) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
    out.extend_from_slice(&[1u8; 64]);
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[3, 1, 0x22, 0, 2, 0x11, 0, 3, 0x11, 0]);
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]);
    out.resize(len - 2, 0x5A);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// A Canon CR3. `cmt1` is the IFD0 TIFF and `cmt2` the Exif TIFF (both
/// with their directory at offset 8). Returns the file and the offset of
/// `full_jpeg` inside it.
pub fn cr3_file(cmt1: &[u8], cmt2: &[u8], preview: &[u8], full_jpeg: &[u8]) -> (Vec<u8>, u64) {
    let mut canon = UUID_CANON_METADATA.to_vec();
    canon.extend(make_box(b"CMT1", cmt1));
    canon.extend(make_box(b"CMT2", cmt2));

    let mut stsz = Vec::new();
    stsz.extend_from_slice(&0u32.to_be_bytes());
    stsz.extend_from_slice(&1u32.to_be_bytes());
    stsz.extend_from_slice(&(full_jpeg.len() as u32).to_be_bytes());
    let stbl = make_box(b"stbl", &full_box(b"stsz", 0, &stsz));
    let trak = make_box(b"trak", &make_box(b"mdia", &make_box(b"minf", &stbl)));

    let mut moov = make_box(b"uuid", &canon);
    moov.extend(trak);

    let mut prvw = vec![0u8; 6];
    prvw.extend_from_slice(&1620u16.to_be_bytes());
    prvw.extend_from_slice(&1080u16.to_be_bytes());
    prvw.extend_from_slice(&[0, 0]);
    prvw.extend_from_slice(&(preview.len() as u32).to_be_bytes());
    prvw.extend_from_slice(preview);
    let mut preview_uuid = UUID_CANON_PREVIEW.to_vec();
    preview_uuid.extend(make_box(b"PRVW", &prvw));

    let mut data = make_box(b"ftyp", b"crx \0\0\0\x01");
    data.extend(make_box(b"moov", &moov));
    data.extend(make_box(b"uuid", &preview_uuid));
    let jpeg_at = data.len() as u64 + 8;
    data.extend(make_box(b"mdat", full_jpeg));
    (data, jpeg_at)
}

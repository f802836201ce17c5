//! Top-level driver: one source in, one [`ParsedMetadata`] out.
//!
//! The container is chosen by content. Each front end finds the TIFF
//! structure (or, for PNG, just the dimensions) and hands it to a
//! [`TagWalker`]. Audio files re-enter the driver on their cover art
//! through a [`Window`], so a FLAC album cover reports the camera that shot
//! it.
//!
//! After the main pass, the best embedded image (if any) is measured by
//! sniffing its own header.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::error::{FormatError, IoError};
use crate::format::bmff::{walk_boxes, BoxScan};
use crate::format::detect::{detect_container, ContainerKind};
use crate::format::exif::TagWalker;
use crate::format::tiff::{
    ByteOrder, DirectoryContext, TiffHeader, TraversalGuard, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_ENTRIES,
};
use crate::format::{flac, id3, jpeg, png, raf};
use crate::io::{BlockCache, ByteSource, FileSource, Window};
use crate::metadata::{EmbeddedImage, EmbeddedImageLocator, ParsedMetadata};

/// Canon CR3 metadata boxes hold a TIFF header with the directory right after it.
const CR3_DIRECTORY_OFFSET: u64 = 8;

/// Read size when copying an embedded image out.
const COPY_CHUNK: usize = 64 * 1024;

// =============================================================================
// Options
// =============================================================================

/// Caps applied while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Directories declaring more entries are rejected
    pub max_directory_entries: u16,

    /// Nesting bound for directories, boxes and re-entered windows
    pub max_depth: usize,

    /// Largest ID3 frame considered
    pub max_frame_size: u32,

    /// Largest PNG chunk considered
    pub max_png_chunk: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_directory_entries: DEFAULT_MAX_ENTRIES,
            max_depth: DEFAULT_MAX_DEPTH,
            max_frame_size: id3::DEFAULT_MAX_FRAME,
            max_png_chunk: png::DEFAULT_MAX_CHUNK,
        }
    }
}

/// Out-of-band hints about a source. Only vendor quirks consult these;
/// the container itself is always detected from content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseHint {
    /// Lowercase file extension without the dot
    pub extension: Option<String>,
}

impl ParseHint {
    pub fn from_path(path: &Path) -> Self {
        Self {
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
        }
    }

    pub fn with_extension(extension: &str) -> Self {
        Self {
            extension: Some(extension.trim_start_matches('.').to_ascii_lowercase()),
        }
    }

    /// Panasonic RAW, whose IFD0 carries private tags.
    pub fn is_rw2(&self) -> bool {
        self.extension.as_deref() == Some("rw2")
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse the file at `path`.
pub fn parse_path(
    path: impl AsRef<Path>,
    options: &ParseOptions,
) -> Result<ParsedMetadata, FormatError> {
    let path = path.as_ref();
    let source = BlockCache::new(FileSource::open(path)?);
    parse_source(&source, &ParseHint::from_path(path), options)
}

/// Parse an already opened source.
///
/// Structural problems inside the file never fail the parse; only an
/// unrecognized container does.
pub fn parse_source(
    source: &dyn ByteSource,
    hint: &ParseHint,
    options: &ParseOptions,
) -> Result<ParsedMetadata, FormatError> {
    let mut guard = TraversalGuard::new(options.max_depth);
    Parser::new(source, hint, options, &mut guard).run()
}

/// Copy the embedded image of the file at `path` to `out`.
///
/// Returns the number of bytes written, which is short only when the file
/// ends inside the range.
pub fn copy_embedded<W: Write>(
    path: impl AsRef<Path>,
    embedded: &EmbeddedImage,
    out: &mut W,
) -> Result<u64, IoError> {
    let window = FileSource::open_range(path, embedded.offset, embedded.length)?;
    let mut copied: u64 = 0;

    while copied < window.size() {
        let want = COPY_CHUNK.min((window.size() - copied) as usize);
        let chunk = window.read_available(copied, want);
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk).map_err(|e| IoError::Write {
            offset: copied,
            message: e.to_string(),
        })?;
        copied += chunk.len() as u64;
    }
    Ok(copied)
}

// =============================================================================
// Parser
// =============================================================================

/// State of one pass over one source.
struct Parser<'a> {
    source: &'a dyn ByteSource,
    hint: &'a ParseHint,
    options: &'a ParseOptions,
    guard: &'a mut TraversalGuard,
    meta: ParsedMetadata,
    locator: EmbeddedImageLocator,

    /// Range whose metadata is what the main pass parsed (RAF preview)
    parsed_payload: Option<(u64, u64)>,
}

impl<'a> Parser<'a> {
    fn new(
        source: &'a dyn ByteSource,
        hint: &'a ParseHint,
        options: &'a ParseOptions,
        guard: &'a mut TraversalGuard,
    ) -> Self {
        Self {
            source,
            hint,
            options,
            guard,
            meta: ParsedMetadata::new(),
            locator: EmbeddedImageLocator::new(),
            parsed_payload: None,
        }
    }

    fn run(mut self) -> Result<ParsedMetadata, FormatError> {
        let kind = detect_container(self.source)?;
        debug!("{}: detected {}", self.source.identifier(), kind.name());

        match kind {
            ContainerKind::Png => {
                let max_chunk = self.options.max_png_chunk;
                if let Some((width, height)) = png::read_dimensions(self.source, max_chunk) {
                    self.meta.width = Some(width);
                    self.meta.height = Some(height);
                }
                return Ok(self.meta);
            }
            ContainerKind::Flac => {
                let scan = flac::find_picture(self.source);
                return Ok(match scan.picture {
                    Some(range) => self.parse_cover(range, scan.dimensions),
                    None => {
                        // The declared size is all there is without a usable payload
                        if let Some((width, height)) = scan.dimensions {
                            self.meta.width = Some(width);
                            self.meta.height = Some(height);
                        }
                        self.meta
                    }
                });
            }
            ContainerKind::Mp3 => {
                return Ok(match id3::find_picture(self.source, self.options.max_frame_size) {
                    Some(range) => self.parse_cover(range, None),
                    None => self.meta,
                });
            }
            ContainerKind::Jpeg => {
                self.locator = EmbeddedImageLocator::disabled();
                self.parse_jpeg();
            }
            ContainerKind::Tiff | ContainerKind::Orf | ContainerKind::Rw2 => {
                let rw2 = kind == ContainerKind::Rw2 || self.hint.is_rw2();
                self.walk_tiff_at(0, rw2);
                if rw2 {
                    self.walk_rw2_preview();
                }
            }
            ContainerKind::Raf => self.parse_raf(),
            ContainerKind::Bmff => self.parse_bmff(),
        }

        if kind != ContainerKind::Jpeg {
            self.measure_embedded();
        }
        Ok(self.meta)
    }

    /// Walk the TIFF structure whose header is at absolute `header_at`.
    fn walk_tiff_at(&mut self, header_at: u64, rw2_private_tags: bool) {
        let header = match TiffHeader::read_at(self.source, header_at) {
            Ok(header) => header,
            Err(e) => {
                debug!("{}: no TIFF header at {}: {}", self.source.identifier(), header_at, e);
                return;
            }
        };
        let ctx = DirectoryContext::for_header(header_at, &header);
        self.walker()
            .with_rw2_private_tags(rw2_private_tags)
            .walk_ifd0(header.first_ifd_offset as u64, ctx);
    }

    fn walker(&mut self) -> TagWalker<'_> {
        TagWalker::new(
            self.source,
            &mut self.meta,
            &mut self.locator,
            self.guard,
            self.options.max_directory_entries,
        )
    }

    // -------------------------------------------------------------------------
    // JPEG
    // -------------------------------------------------------------------------

    fn parse_jpeg(&mut self) {
        let scan = jpeg::scan_markers(self.source);
        if let Some((width, height)) = scan.largest {
            self.meta.merge_width(width);
            self.meta.merge_height(height);
        }

        let Some(exif) = scan.exif_offset else {
            debug!("{}: jpeg has no exif block", self.source.identifier());
            return;
        };
        match jpeg::locate_tiff_header(self.source, exif) {
            Some(header_at) => self.walk_tiff_at(header_at, false),
            None => debug!("{}: exif block without TIFF header", self.source.identifier()),
        }
    }

    // -------------------------------------------------------------------------
    // RAF
    // -------------------------------------------------------------------------

    fn parse_raf(&mut self) {
        let Some(preview) = raf::find_preview(self.source) else {
            return;
        };
        self.locator.offer(self.source, preview.offset, preview.length);
        self.parsed_payload = Some((preview.offset, preview.length));
        self.walk_tiff_at(preview.tiff_header, false);
    }

    // -------------------------------------------------------------------------
    // Panasonic RW2
    // -------------------------------------------------------------------------

    /// The RW2 preview JPEG carries serial and lens fields the RAW lacks.
    fn walk_rw2_preview(&mut self) {
        let Some((offset, length)) = self.locator.best() else {
            return;
        };
        let window = match Window::new(self.source, offset, length) {
            Ok(window) => window,
            Err(e) => {
                debug!("{}: rw2 preview: {}", self.source.identifier(), e);
                return;
            }
        };

        let scan = jpeg::scan_markers(&window);
        let Some(header_at) = scan
            .exif_offset
            .and_then(|exif| jpeg::locate_tiff_header(&window, exif))
        else {
            return;
        };
        let Ok(header) = TiffHeader::read_at(&window, header_at) else {
            return;
        };

        // Offsets inside the window must not reach the outer locator
        let mut locator = EmbeddedImageLocator::disabled();
        let mut guard = self.guard.nested();
        let known_targets = self.meta.orientation.as_ref().map_or(0, |o| o.targets.len());
        TagWalker::new(
            &window,
            &mut self.meta,
            &mut locator,
            &mut guard,
            self.options.max_directory_entries,
        )
        .walk_ifd0(
            header.first_ifd_offset as u64,
            DirectoryContext::for_header(header_at, &header),
        );
        shift_orientation_targets(&mut self.meta, known_targets, offset);
    }

    // -------------------------------------------------------------------------
    // ISO base media
    // -------------------------------------------------------------------------

    fn parse_bmff(&mut self) {
        let scan = walk_boxes(self.source, self.guard);

        if scan.is_cr3() {
            self.parse_cr3(&scan);
        } else if let Some((exif, _)) = scan.exif_range() {
            // The Exif item starts with the offset of the TIFF header
            let skip = self.source.read_u32_be_at(exif) as u64;
            self.walk_tiff_at(exif + 4 + skip, false);
        } else {
            debug!("{}: no exif item", self.source.identifier());
        }
    }

    fn parse_cr3(&mut self, scan: &BoxScan) {
        if let Some(preview) = scan.preview {
            self.locator
                .offer(self.source, preview.offset, preview.length);
        }
        if let Some((start, length)) = scan.cr3_jpeg() {
            self.locator.offer(self.source, start, length);
        }

        if let Some(ifd0) = scan.cr3_ifd0() {
            self.walk_tiff_at(ifd0, false);
        }
        if let Some(exif) = scan.cr3_exif() {
            let ctx = self.cr3_context(exif);
            self.walker().walk_exif(CR3_DIRECTORY_OFFSET, ctx);
        }
        if let Some(note) = scan.cr3_makernote() {
            let ctx = self.cr3_context(note);
            self.walker().walk_makernote(CR3_DIRECTORY_OFFSET, ctx);
        }
        if let Some(gps) = scan.cr3_gps() {
            let ctx = self.cr3_context(gps);
            self.walker().walk_gps(CR3_DIRECTORY_OFFSET, ctx);
        }
    }

    /// CMTn payloads start with their own byte-order mark.
    fn cr3_context(&self, base: u64) -> DirectoryContext {
        let mark = self.source.read_zeroed(base, 2);
        let order = match ByteOrder::from_marker([mark[0], mark[1]]) {
            Some(ByteOrder::LittleEndian) => ByteOrder::LittleEndian,
            _ => ByteOrder::BigEndian,
        };
        DirectoryContext::new(base, order)
    }

    // -------------------------------------------------------------------------
    // Audio cover art
    // -------------------------------------------------------------------------

    /// Parse the cover image as if it were the whole file.
    fn parse_cover(
        self,
        (offset, length): (u64, u64),
        declared: Option<(u32, u32)>,
    ) -> ParsedMetadata {
        let Parser {
            source,
            options,
            guard,
            meta,
            ..
        } = self;

        let window = match Window::new(source, offset, length) {
            Ok(window) => window,
            Err(e) => {
                debug!("{}: cover art: {}", source.identifier(), e);
                return meta;
            }
        };
        if let Err(e) = guard.descend() {
            debug!("{}: not parsing cover art: {}", source.identifier(), e);
            return meta;
        }

        let hint = ParseHint::default();
        let mut inner_guard = guard.nested();
        let parsed = Parser::new(&window, &hint, options, &mut inner_guard).run();
        guard.ascend();

        let mut cover = match parsed {
            Ok(cover) => cover,
            Err(e) => {
                debug!("{}: cover art: {}", source.identifier(), e);
                let mut meta = meta;
                meta.embedded = Some(EmbeddedImage {
                    offset,
                    length,
                    width: declared.map(|(w, _)| w),
                    height: declared.map(|(_, h)| h),
                });
                return meta;
            }
        };

        shift_orientation_targets(&mut cover, 0, offset);
        cover.embedded = Some(EmbeddedImage {
            offset,
            length,
            width: cover.width.or(declared.map(|(w, _)| w)),
            height: cover.height.or(declared.map(|(_, h)| h)),
        });
        cover
    }

    // -------------------------------------------------------------------------
    // Embedded image
    // -------------------------------------------------------------------------

    fn measure_embedded(&mut self) {
        let Some((offset, length)) = self.locator.best() else {
            return;
        };

        let (width, height) = if self.parsed_payload == Some((offset, length)) {
            (self.meta.width, self.meta.height)
        } else {
            match embedded_dimensions(self.source, offset, length, self.options) {
                Some((w, h)) => (Some(w), Some(h)),
                None => (None, None),
            }
        };

        self.meta.embedded = Some(EmbeddedImage {
            offset,
            length,
            width,
            height,
        });
    }
}

/// Move orientation targets recorded inside a window (from index `skip` on)
/// to absolute file offsets.
fn shift_orientation_targets(meta: &mut ParsedMetadata, skip: usize, base: u64) {
    if let Some(record) = meta.orientation.as_mut() {
        for target in record.targets.iter_mut().skip(skip) {
            target.offset += base;
        }
    }
}

/// Width and height read from the header of the image at `offset`.
fn embedded_dimensions(
    source: &dyn ByteSource,
    offset: u64,
    length: u64,
    options: &ParseOptions,
) -> Option<(u32, u32)> {
    let window = match Window::new(source, offset, length) {
        Ok(window) => window,
        Err(e) => {
            debug!("{}: embedded image: {}", source.identifier(), e);
            return None;
        }
    };

    let head = window.read_zeroed(0, 8);
    if jpeg::is_jpeg(&head) {
        jpeg::scan_markers(&window).frame
    } else if png::has_png_signature(&window) {
        png::read_dimensions(&window, options.max_png_chunk)
    } else {
        debug!(
            "{}: embedded image with unexpected header {:02X?}",
            source.identifier(),
            &head[..]
        );
        None
    }
}

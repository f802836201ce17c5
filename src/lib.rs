//! # metascan
//!
//! Photo and audio metadata extraction straight from container bytes, with
//! no codec or vendor SDK involved.
//!
//! ## Features
//!
//! - **Containers**: JPEG, TIFF-family RAW (CR2, NEF, ORF, RW2, DNG), Fujifilm
//!   RAF, HEIC/HIF and Canon CR3, PNG, FLAC and MP3 cover art
//! - **Maker notes**: serials, lens data and preview directories for a dozen
//!   camera vendors, driven by a table keyed on the Make string
//! - **Embedded previews**: the largest image-like byte range in the file
//! - **Focal length**: 35mm equivalent from the stated value, a model table
//!   or the focal-plane resolution
//! - **Orientation rewrite**: quarter turns by patching two bytes in place
//!
//! ## Architecture
//!
//! - [`io`] - byte sources: files, windows, memory, block cache
//! - [`mod@format`] - container front ends and the tag directory walkers
//! - [`metadata`] - the parse result and values derived from it
//! - [`engine`] - the top-level driver
//! - [`orientation`] - orientation rewrite
//! - [`cache`] - memoized results per path
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use metascan::{MetadataCache, Rotation};
//!
//! let cache = MetadataCache::default();
//! let path = Path::new("DSC_0042.NEF");
//!
//! if let Some((make, model)) = cache.camera_info(path) {
//!     println!("{make} {model}");
//! }
//! if let Some(focal) = cache.focal_lengths(path) {
//!     println!("{:?}mm", focal.best);
//! }
//! cache.rotate(path, Rotation::Right).ok();
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod metadata;
pub mod orientation;

// Re-export commonly used types
pub use cache::{CacheOptions, MetadataCache};
pub use config::{Command, Config};
pub use engine::{copy_embedded, parse_path, parse_source, ParseHint, ParseOptions};
pub use error::{FormatError, IoError, RotateError, TiffError};
pub use format::detect::{detect_container, ContainerKind};
pub use format::tiff::{ByteOrder, FieldType, TiffHeader, TiffTag};
pub use io::{BlockCache, ByteSource, FileSource, MemorySource, Window};
pub use metadata::{
    interesting_metadata, resolve_focal_lengths, BuiltinCropTable, CropFactorLookup,
    EmbeddedImage, FocalLengths, OrientationRecord, OrientationTarget, ParsedMetadata,
    Rational,
};
pub use orientation::{plan_rotation, Orientation, OrientationPatch, Rotation};

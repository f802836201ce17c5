//! Container front ends and the directory walkers they feed.
//!
//! Every container eventually hands a TIFF structure to a [`TagWalker`],
//! except PNG (dimensions only) and the audio containers (cover art that is
//! parsed again as a file of its own).
//!
//! # Containers
//!
//! - **JPEG**: marker scan, then the Exif APP1 TIFF header
//! - **TIFF family**: TIFF, DNG, CR2, NEF, ORF, RW2
//! - **RAF**: fixed-offset embedded JPEG
//! - **PNG**: IHDR dimensions
//! - **FLAC / MP3**: embedded picture
//! - **ISO base media**: HEIC/HIF Exif item, Canon CR3 metadata boxes
//!
//! Use [`detect::detect_container`] to classify a source.

pub mod bmff;
pub mod detect;
pub mod exif;
pub mod flac;
pub mod id3;
pub mod jpeg;
pub mod makernote;
pub mod png;
pub mod raf;
pub mod tiff;


pub use bmff::{walk_boxes, BoxScan};
pub use detect::{detect_container, has_image_signature, sniff_container, ContainerKind};
pub use exif::TagWalker;
pub use jpeg::{locate_tiff_header, scan_markers, JpegScan};
pub use makernote::{find_rule, Vendor, VendorRule, VENDOR_RULES};
pub use raf::{find_preview, RafPreview};

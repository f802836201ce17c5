//! The parse result and everything derived from it.
//!
//! - [`record`]: [`ParsedMetadata`], the aggregate every walker fills in
//! - [`embedded`]: running best guess for the embedded preview
//! - [`focal`] / [`crop`]: 35mm-equivalent focal length
//! - [`summary`]: the text block a viewer shows next to an image

pub mod crop;
pub mod embedded;
pub mod focal;
pub mod record;
pub mod summary;

pub use crop::{lookup_crop_factor, BuiltinCropTable, CropFactorLookup};
pub use embedded::EmbeddedImageLocator;
pub use focal::{resolve_focal_lengths, same_focal_length, FocalLengths};
pub use record::{
    EmbeddedImage, OrientationRecord, OrientationTarget, ParsedMetadata, Rational, SensorBorder,
};
pub use summary::interesting_metadata;

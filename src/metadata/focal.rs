//! 35mm-equivalent focal length resolution.

use serde::Serialize;

use super::crop::{lookup_crop_factor, CropFactorLookup};
use super::record::ParsedMetadata;

/// Full-frame sensor size in millimetres.
const FULL_FRAME_MM: (f64, f64) = (36.0, 24.0);

/// Relative difference below which two focal lengths display as equal.
const SAME_FOCAL_LENGTH_PERCENT: f64 = 5.0;

/// Every focal-length variant that could be derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FocalLengths {
    /// Stated focal length in mm
    pub stated: Option<f64>,
    /// Stated 35mm-film equivalent
    pub equivalent_35mm: Option<u32>,
    /// Stated × crop factor from the model table
    pub guess: Option<f64>,
    /// Stated × crop factor computed from focal-plane resolution
    pub computed: Option<f64>,
    /// Preferred value: equivalent, then guess, then computed, then stated
    pub best: Option<f64>,
}

/// Crop factor implied by the computed sensor size.
pub fn computed_crop_factor(meta: &ParsedMetadata) -> Option<f64> {
    let width = meta.sensor_width_mm.filter(|&w| w != 0)? as f64;
    let height = meta.sensor_height_mm.filter(|&h| h != 0)? as f64;
    Some(FULL_FRAME_MM.0.hypot(FULL_FRAME_MM.1) / width.hypot(height))
}

/// Resolve all focal-length variants for a parsed file.
pub fn resolve_focal_lengths(meta: &ParsedMetadata, table: &dyn CropFactorLookup) -> FocalLengths {
    let make = meta.make.as_deref().unwrap_or("");
    let model = meta.model.as_deref().unwrap_or("");
    resolve(
        meta.focal_length.and_then(|r| r.to_f64()),
        meta.focal_length_35mm.filter(|&v| v != 0),
        lookup_crop_factor(table, make, model),
        computed_crop_factor(meta),
    )
}

/// Combine the inputs into [`FocalLengths`].
pub fn resolve(
    stated: Option<f64>,
    equivalent_35mm: Option<u32>,
    table_crop: Option<f64>,
    computed_crop: Option<f64>,
) -> FocalLengths {
    let table_crop = table_crop.filter(|&c| c != 0.0);
    let computed_crop = computed_crop.filter(|&c| c != 0.0);

    let guess = stated.zip(table_crop).map(|(f, c)| f * c);
    let computed = stated.zip(computed_crop).map(|(f, c)| f * c);
    let best = equivalent_35mm
        .map(f64::from)
        .or(guess)
        .or(computed)
        .or(stated);

    FocalLengths {
        stated,
        equivalent_35mm,
        guess,
        computed,
        best,
    }
}

/// Whether two focal lengths are within 5% of `a`.
pub fn same_focal_length(a: f64, b: f64) -> bool {
    (a - b).abs() / a * 100.0 < SAME_FOCAL_LENGTH_PERCENT
}

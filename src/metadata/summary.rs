//! Human-readable summary of the fields a photo viewer shows.

use std::fmt::Write;

use super::crop::{lookup_crop_factor, CropFactorLookup};
use super::focal::{computed_crop_factor, same_focal_length};
use super::record::ParsedMetadata;

/// Percent difference above which the preview resolution is shown too.
const DIFFERENT_RESOLUTION_PERCENT: f64 = 5.0;

/// Name of an Exif ExposureProgram value.
pub fn exposure_program_name(value: u32) -> &'static str {
    match value {
        1 => "manual",
        2 => "program AE",
        3 => "aperture-priority AE",
        4 => "shutter speed priority AE",
        5 => "creative (slow speed)",
        6 => "action (high speed)",
        7 => "portrait",
        8 => "landscape",
        9 => "bulb",
        _ => "unknown",
    }
}

/// Name of an Exif ExposureMode value.
pub fn exposure_mode_name(value: u32) -> &'static str {
    match value {
        0 => "auto",
        1 => "manual",
        2 => "auto bracket",
        _ => "unknown",
    }
}

/// Whether `b` differs from `a` by more than 5% of `a`.
pub fn substantially_different_resolution(a: u32, b: u32) -> bool {
    if a == 0 || b == 0 {
        return false;
    }
    (a as f64 - b as f64).abs() / a as f64 * 100.0 > DIFFERENT_RESOLUTION_PERCENT
}

/// Exposure time as "1/250 sec" or "2 sec", reducing n/d to 1/round(d/n).
pub fn format_exposure(num: u32, den: u32) -> String {
    let (num, den) = if num != 0 && num != 1 {
        (1, (den as f64 / num as f64).round() as u32)
    } else {
        (num, den)
    };

    if den == 0 || den == 1 {
        format!("{num} sec")
    } else {
        format!("{num}/{den} sec")
    }
}

/// Build the newline-separated summary block.
///
/// `preview` is the size of the image actually being displayed; it is
/// reported next to the stored dimensions when they differ noticeably and
/// stands in for them when the file has none.
pub fn interesting_metadata(
    meta: &ParsedMetadata,
    table: &dyn CropFactorLookup,
    preview: Option<(u32, u32)>,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(when) = meta.capture_time() {
        lines.push(when.to_string());
    }

    match (meta.width, meta.height) {
        (Some(width), Some(height)) => {
            let (w, h) = match meta.orientation_value() {
                Some(5..=8) => (height, width),
                _ => (width, height),
            };
            match preview {
                Some((pw, ph)) if substantially_different_resolution(w, pw) => {
                    lines.push(format!("{w} x {h} ({pw} x {ph})"))
                }
                _ => lines.push(format!("{w} x {h}")),
            }
        }
        _ => {
            if let Some((pw, ph)) = preview {
                lines.push(format!("{pw} x {ph}"));
            }
        }
    }

    if let Some(iso) = meta.iso {
        lines.push(format!("ISO {iso}"));
    }

    if let Some(exposure) = meta.exposure_time {
        lines.push(format_exposure(exposure.num, exposure.den));
    }

    if let Some(aperture) = meta.aperture.filter(|a| a.den != 0) {
        lines.push(format!("f / {:.1}", aperture.num as f64 / aperture.den as f64));
    }

    if let Some(line) = focal_length_line(meta, table) {
        lines.push(line);
    }

    if let Some(program) = meta.exposure_program {
        lines.push(exposure_program_name(program).to_string());
    } else if let Some(mode) = meta.exposure_mode {
        lines.push(exposure_mode_name(mode).to_string());
    }

    if let Some(line) = join_pair(meta.make.as_deref(), meta.model.as_deref()) {
        lines.push(line);
    }
    if let Some(line) = join_pair(meta.lens_make.as_deref(), meta.lens_model.as_deref()) {
        lines.push(line);
    }

    if let (Some(lat), Some(lon)) = (meta.latitude, meta.longitude) {
        lines.push(format!("{lat:.7}, {lon:.7}"));
    }

    lines.join("\n")
}

fn focal_length_line(meta: &ParsedMetadata, table: &dyn CropFactorLookup) -> Option<String> {
    let equivalent = meta.focal_length_35mm.filter(|&v| v != 0);

    let Some(stated) = meta.focal_length.and_then(|r| r.to_f64()) else {
        return equivalent.map(|eq| format!(" {eq}mm equivalent"));
    };

    let make = meta.make.as_deref().unwrap_or("");
    let model = meta.model.as_deref().unwrap_or("");

    let mut line = String::new();
    if let Some(eq) = equivalent {
        if same_focal_length(eq as f64, stated) {
            let _ = write!(line, "{stated:.1}mm");
        } else {
            let _ = write!(line, "{stated:.1}mm ({eq}mm equivalent)");
        }
    } else if let Some(crop) = lookup_crop_factor(table, make, model) {
        let fl = stated * crop;
        if same_focal_length(fl, stated) {
            let _ = write!(line, "{stated:.1}mm");
        } else {
            let _ = write!(line, "{stated:.1}mm (approx. {fl:.1}mm)");
        }
    } else if let Some(crop) = computed_crop_factor(meta) {
        let fl = stated * crop;
        if same_focal_length(fl, stated) {
            let _ = write!(line, "{stated:.1}mm");
        } else {
            let _ = write!(line, "{stated:.1}mm (computed {fl:.1}mm)");
        }
    } else {
        let _ = write!(line, "{stated:.1}mm");
    }
    Some(line)
}

fn join_pair(first: Option<&str>, second: Option<&str>) -> Option<String> {
    match (first, second) {
        (None, None) => None,
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
    }
}

use tracing::trace;

use crate::format::detect::has_image_signature;
use crate::io::ByteSource;

/// Running best guess for the embedded preview image.
///
/// A candidate replaces the current one only when it is strictly longer and
/// its first bytes look like an image. Many RAW directories carry strip
/// pointers to raw sensor data or to nothing at all; the signature check
/// throws those out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedImageLocator {
    best: Option<(u64, u64)>,
    disabled: bool,
}

impl EmbeddedImageLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A locator that ignores every candidate (outer file is a plain JPEG).
    pub fn disabled() -> Self {
        Self {
            best: None,
            disabled: true,
        }
    }

    /// Offer a candidate; returns whether it became the new best.
    pub fn offer(&mut self, source: &dyn ByteSource, offset: u64, length: u64) -> bool {
        if self.disabled || length == 0 {
            return false;
        }
        if self.best.is_some_and(|(_, best_len)| length <= best_len) {
            return false;
        }
        if offset.checked_add(length).map_or(true, |end| end > source.size()) {
            trace!(
                "{}: candidate at {} ({} bytes) runs past the end",
                source.identifier(),
                offset,
                length
            );
            return false;
        }
        if !has_image_signature(source, offset) {
            trace!(
                "{}: candidate at {} ({} bytes) has no image signature",
                source.identifier(),
                offset,
                length
            );
            return false;
        }

        self.best = Some((offset, length));
        true
    }

    /// Best `(offset, length)` so far.
    pub fn best(&self) -> Option<(u64, u64)> {
        self.best
    }
}

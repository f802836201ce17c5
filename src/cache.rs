//! Memoized parse results keyed by path.
//!
//! Viewers ask for one field at a time (dimensions, then capture time, then
//! GPS...) for the file currently on screen. [`MetadataCache`] parses a file
//! once and answers every accessor from the cached [`ParsedMetadata`] until
//! a different path is asked for, or (optionally) the file's modification
//! time changes.
//!
//! Refresh and read happen under one mutex, so callers working on
//! different files are serialized. Use separate caches to parse in
//! parallel.

use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use lru::LruCache;
use tracing::debug;

use crate::engine::{parse_path, ParseOptions};
use crate::error::RotateError;
use crate::metadata::{
    interesting_metadata, resolve_focal_lengths, BuiltinCropTable, CropFactorLookup,
    EmbeddedImage, FocalLengths, ParsedMetadata,
};
use crate::orientation::{rotate_file, Orientation, Rotation};

/// Default number of files kept: just the current one.
pub const DEFAULT_CACHE_CAPACITY: usize = 1;

/// Cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Reparse when the file's last-write time differs from the cached one
    pub check_modified: bool,

    /// Number of files kept (clamped to 1)
    pub capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            check_modified: false,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

struct CachedEntry {
    modified: Option<SystemTime>,
    meta: Arc<ParsedMetadata>,
}

/// Single-slot (by default) metadata cache.
pub struct MetadataCache {
    parse_options: ParseOptions,
    options: CacheOptions,
    crop_table: Arc<dyn CropFactorLookup>,
    entries: Mutex<LruCache<String, CachedEntry>>,
}

impl MetadataCache {
    pub fn new(parse_options: ParseOptions, options: CacheOptions) -> Self {
        Self {
            parse_options,
            options,
            crop_table: Arc::new(BuiltinCropTable),
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(options.capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Use a different model to crop factor table.
    pub fn with_crop_table(mut self, table: Arc<dyn CropFactorLookup>) -> Self {
        self.crop_table = table;
        self
    }

    /// Refresh `path` if needed and run `read` on its entry.
    fn with_entry<T>(&self, path: &Path, read: impl FnOnce(&mut CachedEntry) -> T) -> T {
        let key = cache_key(path);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let modified = if self.options.check_modified {
            modified_time(path)
        } else {
            None
        };
        let stale = match entries.peek(&key) {
            None => true,
            Some(entry) => self.options.check_modified && entry.modified != modified,
        };
        if stale {
            entries.pop(&key);
        }

        let entry = entries.get_or_insert_mut(key, || CachedEntry {
            modified,
            meta: Arc::new(self.load(path)),
        });
        read(entry)
    }

    /// Parse `path`, yielding an all-unknown record on failure.
    fn load(&self, path: &Path) -> ParsedMetadata {
        match parse_path(path, &self.parse_options) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("{}: {}", path.display(), e);
                ParsedMetadata::new()
            }
        }
    }

    /// Everything parsed from `path`.
    pub fn metadata(&self, path: &Path) -> Arc<ParsedMetadata> {
        self.with_entry(path, |entry| Arc::clone(&entry.meta))
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Make and model; `None` when neither is known.
    pub fn camera_info(&self, path: &Path) -> Option<(String, String)> {
        let meta = self.metadata(path);
        pair(meta.make.as_deref(), meta.model.as_deref())
    }

    /// Lens make and model; `None` when neither is known.
    pub fn lens_info(&self, path: &Path) -> Option<(String, String)> {
        let meta = self.metadata(path);
        pair(meta.lens_make.as_deref(), meta.lens_model.as_deref())
    }

    pub fn capture_time(&self, path: &Path) -> Option<String> {
        self.metadata(path).capture_time().map(str::to_string)
    }

    pub fn dimensions(&self, path: &Path) -> Option<(u32, u32)> {
        let meta = self.metadata(path);
        meta.width.zip(meta.height)
    }

    /// Decimal latitude and longitude.
    pub fn gps_location(&self, path: &Path) -> Option<(f64, f64)> {
        let meta = self.metadata(path);
        meta.latitude.zip(meta.longitude)
    }

    /// All focal-length variants; `None` without a stated focal length.
    pub fn focal_lengths(&self, path: &Path) -> Option<FocalLengths> {
        let meta = self.metadata(path);
        let lengths = resolve_focal_lengths(&meta, self.crop_table.as_ref());
        lengths.stated.is_some().then_some(lengths)
    }

    pub fn embedded_image(&self, path: &Path) -> Option<EmbeddedImage> {
        self.metadata(path).embedded
    }

    pub fn orientation(&self, path: &Path) -> Option<u16> {
        self.metadata(path).orientation_value()
    }

    /// Summary text block; `None` when nothing interesting was found.
    pub fn interesting_metadata(&self, path: &Path, preview: Option<(u32, u32)>) -> Option<String> {
        let meta = self.metadata(path);
        let text = interesting_metadata(&meta, self.crop_table.as_ref(), preview);
        (!text.is_empty()).then_some(text)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Rotate `path` in place, updating the cached record on success.
    pub fn rotate(&self, path: &Path, rotation: Rotation) -> Result<Orientation, RotateError> {
        let check_modified = self.options.check_modified;
        self.with_entry(path, |entry| {
            let orientation = rotate_file(path, Arc::make_mut(&mut entry.meta), rotation)?;
            if check_modified {
                entry.modified = modified_time(path);
            }
            Ok(orientation)
        })
    }

    /// Drop every cached record.
    pub fn purge(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(ParseOptions::default(), CacheOptions::default())
    }
}

fn pair(first: Option<&str>, second: Option<&str>) -> Option<(String, String)> {
    if first.is_none() && second.is_none() {
        return None;
    }
    Some((
        first.unwrap_or_default().to_string(),
        second.unwrap_or_default().to_string(),
    ))
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Case-insensitive, lexically normalized absolute path.
pub fn cache_key(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.to_string_lossy().to_lowercase()
}

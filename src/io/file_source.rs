//! Concrete byte sources: local files, in-memory buffers and windows.
//!
//! A [`Window`] exposes a sub-range of another source as if it were a whole
//! file. The engine uses it to re-enter itself on an embedded image (FLAC
//! cover art, an RW2 preview JPEG) without copying the bytes out.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use super::ByteSource;
use crate::error::IoError;

// =============================================================================
// FileSource
// =============================================================================

/// Read-only, shared access to a local file.
pub struct FileSource {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileSource {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let file = File::open(path).map_err(|e| IoError::from_open(&identifier, e))?;
        let size = file
            .metadata()
            .map_err(|e| IoError::from_open(&identifier, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier,
        })
    }

    /// Open `path` and expose only `[offset, offset + len)`.
    pub fn open_range(
        path: impl AsRef<Path>,
        offset: u64,
        len: u64,
    ) -> Result<Window<Self>, IoError> {
        let source = Self::open(path)?;
        Window::new(source, offset, len)
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        if offset >= self.size || buf.is_empty() {
            return 0;
        }
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if file.seek(SeekFrom::Start(offset)).is_err() {
            return 0;
        }

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        filled
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// MemorySource
// =============================================================================

/// Byte source over an owned buffer.
#[derive(Clone)]
pub struct MemorySource {
    data: Bytes,
    identifier: String,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }

    /// The whole buffer.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let len = self.data.len() as u64;
        if offset >= len {
            return 0;
        }
        let start = offset as usize;
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
// Window
// =============================================================================

/// A sub-range of another source, addressed from zero.
pub struct Window<S> {
    inner: S,
    offset: u64,
    len: u64,
    identifier: String,
}

impl<S: ByteSource> Window<S> {
    /// Wrap `inner`, exposing `len` bytes starting at `offset`.
    ///
    /// The window must lie inside the source.
    pub fn new(inner: S, offset: u64, len: u64) -> Result<Self, IoError> {
        let size = inner.size();
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len,
                size,
            });
        }
        let identifier = format!("{}[{}+{}]", inner.identifier(), offset, len);
        Ok(Self {
            inner,
            offset,
            len,
            identifier,
        })
    }

    /// Absolute offset of the window inside the wrapped source.
    pub fn base(&self) -> u64 {
        self.offset
    }
}

impl<S: ByteSource> ByteSource for Window<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        if offset >= self.len {
            return 0;
        }
        let n = (buf.len() as u64).min(self.len - offset) as usize;
        self.inner.read_at(self.offset + offset, &mut buf[..n])
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

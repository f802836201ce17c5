use bytes::{Bytes, BytesMut};

/// Random-access byte source the parsers read from.
///
/// This is the only way the engine touches file contents. Reads never fail
/// hard: past the end of the source they return fewer bytes (or none), and
/// [`ByteSource::read_zeroed`] pads the difference with zeros so a truncated
/// file degrades into "unknown" fields instead of an error.
pub trait ByteSource: Send + Sync {
    /// Copy up to `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied; 0 at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize;

    /// Total size of the source in bytes.
    fn size(&self) -> u64;

    /// Identifier for logging (usually the path).
    fn identifier(&self) -> &str;

    /// Read `len` bytes at `offset`, zero-filling anything past the end.
    fn read_zeroed(&self, offset: u64, len: usize) -> Bytes {
        let mut buf = BytesMut::zeroed(len);
        let _ = self.read_at(offset, &mut buf);
        buf.freeze()
    }

    /// Read up to `len` bytes at `offset` without padding.
    fn read_available(&self, offset: u64, len: usize) -> Bytes {
        let mut buf = BytesMut::zeroed(len);
        let n = self.read_at(offset, &mut buf);
        buf.truncate(n);
        buf.freeze()
    }

    /// Read one byte, 0 past the end.
    fn read_u8(&self, offset: u64) -> u8 {
        let mut b = [0u8; 1];
        self.read_at(offset, &mut b);
        b[0]
    }

    /// Big-endian u16, used by the marker and chunk based containers.
    fn read_u16_be_at(&self, offset: u64) -> u16 {
        let mut b = [0u8; 2];
        self.read_at(offset, &mut b);
        read_u16_be(&b)
    }

    /// Big-endian u32.
    fn read_u32_be_at(&self, offset: u64) -> u32 {
        let mut b = [0u8; 4];
        self.read_at(offset, &mut b);
        read_u32_be(&b)
    }

    /// Big-endian u64.
    fn read_u64_be_at(&self, offset: u64) -> u64 {
        let mut b = [0u8; 8];
        self.read_at(offset, &mut b);
        read_u64_be(&b)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &S {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// Callers always pass slices of the right width; every read above goes through
// a fixed-size buffer so these never see a short slice in practice.

#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
pub fn read_u64_be(bytes: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(b)
}

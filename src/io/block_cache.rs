use std::num::NonZeroUsize;
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;

use super::ByteSource;

/// Default block size: 16KB.
///
/// Tag directories, box headers and maker notes cluster near the start of a
/// file, so a handful of blocks serves most of a parse.
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Default cache capacity in number of blocks.
const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any [`ByteSource`].
///
/// Directory walking issues many 2-, 4- and 12-byte reads at scattered
/// offsets. The cache turns them into a few block-sized reads of the
/// underlying file and keeps the most recently used blocks around.
///
/// Reads spanning several blocks are stitched together; the last block of
/// the source may be short.
pub struct BlockCache<S> {
    inner: S,
    block_size: usize,
    cache: Mutex<LruCache<u64, Bytes>>,
}

impl<S: ByteSource> BlockCache<S> {
    /// Wrap `inner` with the default block size and capacity.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner` with a custom block size and capacity (both clamped to 1).
    pub fn with_capacity(inner: S, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// The wrapped source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a block from cache or fetch it from the underlying source.
    fn get_block(&self, block_idx: u64) -> Bytes {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = cache.get(&block_idx) {
            return data.clone();
        }

        let offset = block_idx * self.block_size as u64;
        let data = self.inner.read_available(offset, self.block_size);
        cache.put(block_idx, data.clone());
        data
    }
}

impl<S: ByteSource> ByteSource for BlockCache<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let size = self.inner.size();
        if offset >= size || buf.is_empty() {
            return 0;
        }
        let want = (buf.len() as u64).min(size - offset) as usize;

        let mut filled = 0;
        let mut current = offset;
        while filled < want {
            let block_idx = current / self.block_size as u64;
            let within = (current % self.block_size as u64) as usize;
            let block = self.get_block(block_idx);
            if within >= block.len() {
                break;
            }
            let n = (block.len() - within).min(want - filled);
            buf[filled..filled + n].copy_from_slice(&block[within..within + n]);
            filled += n;
            current += n as u64;
        }
        filled
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

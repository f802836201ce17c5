mod block_cache;
mod file_source;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE};
pub use file_source::{FileSource, MemorySource, Window};
pub use range_reader::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, ByteSource};

use thiserror::Error;

/// I/O errors raised by byte sources and the orientation writer.
///
/// Short reads are not errors: sources report how many bytes they produced
/// and callers treat the remainder as zeros.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The file could not be opened
    #[error("Cannot open {path}: {message}")]
    Open { path: String, message: String },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Requested window exceeds the underlying resource
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Writing patched bytes back failed
    #[error("Write failed at offset {offset}: {message}")]
    Write { offset: u64, message: String },
}

impl IoError {
    /// Map a `std::io::Error` raised while opening `path`.
    pub fn from_open(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path.to_string())
        } else {
            IoError::Open {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Errors related to container detection.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// No front end recognizes the leading bytes
    #[error("Unsupported container: {reason}")]
    UnsupportedContainer { reason: String },
}

/// Structural errors that abort a single directory or box subtree.
///
/// These never abort a whole parse: the walker that hits one logs it and
/// keeps every field decoded so far.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42, got {0}")]
    InvalidVersion(u16),

    /// Directory declares more entries than the configured cap
    #[error("Directory at {offset} declares {count} entries (cap {max})")]
    TooManyEntries { offset: u64, count: u16, max: u16 },

    /// Unknown field type in a directory entry
    #[error("Unknown field type {field_type} in tag {tag}")]
    UnknownFieldType { tag: u16, field_type: u16 },

    /// Recursion went deeper than allowed
    #[error("Nesting depth {0} exceeded")]
    DepthExceeded(usize),

    /// Offset was already visited during this parse
    #[error("Cyclic offset {0}")]
    CyclicOffset(u64),

    /// A box declared a length that cannot be right
    #[error("Invalid box length {length} for '{tag}' at {offset}")]
    InvalidBoxLength {
        tag: String,
        offset: u64,
        length: u64,
    },
}

/// Reasons the orientation rewrite refuses to touch a file.
#[derive(Debug, Clone, Error)]
pub enum RotateError {
    /// No orientation tag was recorded during parsing
    #[error("No orientation tag recorded")]
    NoOrientation,

    /// The recorded tag is not a SHORT
    #[error("Orientation tag has type {0}, expected SHORT")]
    UnexpectedType(u16),

    /// The recorded write offset is zero
    #[error("Orientation write offset is zero")]
    ZeroOffset,

    /// I/O error while patching
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

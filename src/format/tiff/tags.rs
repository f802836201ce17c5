//! Tag field types and the tag ids the walkers understand.
//!
//! Camera files use the thirteen classic TIFF field types, including the
//! ones with no official definition that vendors repurposed (6 as an
//! unsigned byte, 8 as an integer, 11/12 as floats, 13 as an IFD pointer).
//! Any code above 13 means the directory is being read under the wrong
//! assumptions and is rejected as a whole.

use serde::Serialize;

// =============================================================================
// Field Types
// =============================================================================

/// Field type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum FieldType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    /// Unofficial, used as an unsigned byte
    SByte = 6,
    Undefined = 7,
    /// Unofficial, Nokia writes ISO with it
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    /// Pointer to a sub-directory (Olympus ORF)
    Ifd = 13,
}

impl FieldType {
    /// Highest type code accepted before a directory is rejected.
    pub const MAX_CODE: u16 = 13;

    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            13 => FieldType::Ifd,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Integer types whose single value can be taken straight from the entry.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Byte
                | FieldType::Short
                | FieldType::Long
                | FieldType::SByte
                | FieldType::SShort
                | FieldType::SLong
        )
    }

    /// One-byte types that get narrowed when stored inline.
    #[inline]
    pub const fn is_byte_like(self) -> bool {
        matches!(self, FieldType::Byte | FieldType::SByte)
    }

    /// Two-byte types that get narrowed when stored inline.
    #[inline]
    pub const fn is_short_like(self) -> bool {
        matches!(self, FieldType::Short | FieldType::SShort)
    }

    /// Whether `count` values of this type fit in the 4-byte value field.
    #[inline]
    pub fn fits_inline(self, count: u32) -> bool {
        (self.size_in_bytes() as u64) * (count as u64) <= 4
    }
}

// =============================================================================
// Tags
// =============================================================================

/// Standard tag ids found in IFD0, the Exif IFD and generic sub-IFDs.
///
/// GPS and maker-note tag ids overlap these numerically and live next to
/// the walkers that interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // IFD0 / generic IFDs
    // -------------------------------------------------------------------------
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Make = 271,
    Model = 272,
    StripOffsets = 273,
    Orientation = 274,
    StripByteCounts = 279,
    DateTime = 306,
    SubIfds = 330,
    JpegInterchangeFormat = 513,
    JpegInterchangeFormatLength = 514,
    XmlPacket = 700,
    ExifIfd = 34665,
    GpsIfd = 34853,
    CameraSerialNumber = 50735,
    DngPrivateData = 50740,

    // -------------------------------------------------------------------------
    // Exif IFD
    // -------------------------------------------------------------------------
    ExposureTime = 33434,
    FNumber = 33437,
    ExposureProgram = 34850,
    IsoSpeed = 34855,
    DateTimeOriginal = 36867,
    FocalLength = 37386,
    MakerNote = 37500,
    PixelXDimension = 40962,
    PixelYDimension = 40963,
    FocalPlaneXResolution = 41486,
    FocalPlaneYResolution = 41487,
    FocalPlaneResolutionUnit = 41488,
    ExposureMode = 41986,
    FocalLengthIn35mmFilm = 41989,
    BodySerialNumber = 42033,
    LensMake = 42035,
    LensModel = 42036,
    LensSerialNumber = 42037,
}

impl TiffTag {
    /// Map a raw tag id to a known tag.
    pub fn from_u16(value: u16) -> Option<Self> {
        use TiffTag::*;
        Some(match value {
            254 => NewSubfileType,
            256 => ImageWidth,
            257 => ImageLength,
            258 => BitsPerSample,
            271 => Make,
            272 => Model,
            273 => StripOffsets,
            274 => Orientation,
            279 => StripByteCounts,
            306 => DateTime,
            330 => SubIfds,
            513 => JpegInterchangeFormat,
            514 => JpegInterchangeFormatLength,
            700 => XmlPacket,
            34665 => ExifIfd,
            34853 => GpsIfd,
            50735 => CameraSerialNumber,
            50740 => DngPrivateData,
            33434 => ExposureTime,
            33437 => FNumber,
            34850 => ExposureProgram,
            34855 => IsoSpeed,
            36867 => DateTimeOriginal,
            37386 => FocalLength,
            37500 => MakerNote,
            40962 => PixelXDimension,
            40963 => PixelYDimension,
            41486 => FocalPlaneXResolution,
            41487 => FocalPlaneYResolution,
            41488 => FocalPlaneResolutionUnit,
            41986 => ExposureMode,
            41989 => FocalLengthIn35mmFilm,
            42033 => BodySerialNumber,
            42035 => LensMake,
            42036 => LensModel,
            42037 => LensSerialNumber,
            _ => return None,
        })
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

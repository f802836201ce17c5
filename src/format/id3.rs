//! ID3v2 tags at the front of MP3 files.
//!
//! ```text
//! "ID3" <major> <minor> <flags> <4 synchsafe size bytes>
//! frames until the declared size:
//!   v2.2:  3-byte id, 3-byte BE size                  (6-byte header)
//!   v2.3+: 4-byte id, 4-byte BE size, 2 flag bytes    (10-byte header)
//! ```
//!
//! The only frame of interest is APIC (PIC in v2.2), the cover art:
//!
//! ```text
//! u8 text encoding, ASCII mime type + NUL, u8 picture type,
//! description in the text encoding + NUL, image bytes
//! ```
//!
//! iTunes writes the mime as a bare "JPG" or "PNG" without terminator; for
//! those the image start is found by looking for its signature instead.

use tracing::{debug, trace};

use crate::io::ByteSource;

use super::detect::has_image_signature;

/// Size of the ID3v2 tag header.
const TAG_HEADER_SIZE: u64 = 10;

/// Smallest file that can hold a tag worth reading.
const MIN_FILE_SIZE: u64 = 128;

/// Bytes of an APIC frame read to find where the image starts.
const APIC_PREFIX: usize = 200;

/// Longest mime type, including its terminator.
const MAX_MIME_LEN: usize = 40;

/// Bytes searched for the image signature after a bare "JPG" / "PNG" mime.
const SIGNATURE_HUNT: usize = 20;

/// Smallest image accepted as cover art.
const MIN_PICTURE_SIZE: u64 = 1000;

/// Default cap on a single frame's declared size.
pub const DEFAULT_MAX_FRAME: u32 = 100 * 1024 * 1024;

const KNOWN_MIME_TYPES: [&str; 6] = [
    "JPG",
    "PNG",
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/bmp",
];

/// Decode a 4-byte synchsafe integer (7 bits per byte).
pub fn synchsafe(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 7) | (b & 0x7F) as u32)
}

/// Whether a frame id is plausible: uppercase letters and digits, with
/// NUL padding allowed after the first character.
pub fn is_valid_frame_id(id: &[u8]) -> bool {
    id.iter().enumerate().all(|(i, &c)| match c {
        0 => i != 0,
        b'A'..=b'Z' | b'0'..=b'9' => true,
        _ => false,
    })
}

/// Find the first plausible cover image, returning `(offset, length)`.
pub fn find_picture(source: &dyn ByteSource, max_frame: u32) -> Option<(u64, u64)> {
    if source.size() < MIN_FILE_SIZE {
        return None;
    }

    let header = source.read_zeroed(0, TAG_HEADER_SIZE as usize);
    if &header[..3] != b"ID3" {
        trace!("{}: no ID3 header", source.identifier());
        return None;
    }
    let version = header[3];
    let tag_end = TAG_HEADER_SIZE + synchsafe([header[6], header[7], header[8], header[9]]) as u64;

    let mut offset = TAG_HEADER_SIZE;
    while offset < tag_end {
        let (id, size, header_size) = match version {
            2 => {
                let raw = source.read_zeroed(offset, 6);
                let size = u32::from_be_bytes([0, raw[3], raw[4], raw[5]]);
                ([raw[0], raw[1], raw[2], 0], size, 6u64)
            }
            3.. => {
                let raw = source.read_zeroed(offset, 10);
                let size = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
                ([raw[0], raw[1], raw[2], raw[3]], size, 10u64)
            }
            _ => {
                debug!("{}: unsupported ID3v2 version {}", source.identifier(), version);
                return None;
            }
        };

        if size == 0 {
            break;
        }
        if size > max_frame {
            debug!("{}: ID3 frame at {} claims {} bytes", source.identifier(), offset, size);
            break;
        }
        if !is_valid_frame_id(&id) {
            debug!("{}: invalid ID3 frame id {:02X?}", source.identifier(), id);
            break;
        }

        if &id == b"APIC" || &id == b"PIC\0" {
            let data = offset + header_size;
            match picture_start(source, data) {
                PictureStart::Found(start) => {
                    if start < size as u64 {
                        let image = data + start;
                        let length = size as u64 - start;
                        if length > MIN_PICTURE_SIZE && has_image_signature(source, image) {
                            return Some((image, length));
                        }
                        trace!(
                            "{}: skipping APIC image of {} bytes at {}",
                            source.identifier(),
                            length,
                            image
                        );
                    }
                }
                PictureStart::Malformed => return None,
            }
        }

        offset += header_size + size as u64;
        if offset >= source.size() {
            break;
        }
    }

    None
}

enum PictureStart {
    /// Image bytes begin this far into the frame data
    Found(u64),
    /// The frame's text fields are unusable; stop looking
    Malformed,
}

/// Skip the encoding, mime, picture type and description of an APIC frame.
fn picture_start(source: &dyn ByteSource, data: u64) -> PictureStart {
    let apic = source.read_zeroed(data, APIC_PREFIX);
    let mut pos = 0usize;

    let encoding = apic[pos];
    pos += 1;
    if !matches!(encoding, 0 | 1 | 3) {
        debug!("{}: unsupported APIC text encoding {}", source.identifier(), encoding);
        return PictureStart::Malformed;
    }

    let mime_start = pos;
    let Some(mime_len) = apic[mime_start..mime_start + MAX_MIME_LEN - 1]
        .iter()
        .position(|&c| c == 0)
    else {
        debug!("{}: APIC mime type is not terminated", source.identifier());
        return PictureStart::Malformed;
    };
    let mime = String::from_utf8_lossy(&apic[mime_start..mime_start + mime_len]).into_owned();
    pos = mime_start + mime_len + 1;

    if mime == "JPG" || mime == "PNG" {
        let wanted: [u8; 2] = if mime == "JPG" { [0xFF, 0xD8] } else { [0x89, 0x50] };
        if let Some(z) = (0..SIGNATURE_HUNT).find(|&z| apic[pos + z..pos + z + 2] == wanted) {
            // Back up to the picture type and empty description
            pos = pos + z - 2;
        }
    }

    if !KNOWN_MIME_TYPES.contains(&mime.as_str()) {
        debug!("{}: unknown APIC mime type {:?}", source.identifier(), mime);
        return PictureStart::Malformed;
    }

    // Picture type
    pos += 1;

    let terminated = match encoding {
        1 => loop {
            if pos + 2 > APIC_PREFIX {
                break false;
            }
            let wc = u16::from_le_bytes([apic[pos], apic[pos + 1]]);
            pos += 2;
            if wc == 0 {
                break true;
            }
        },
        _ => loop {
            if pos >= APIC_PREFIX {
                break false;
            }
            let c = apic[pos];
            pos += 1;
            if c == 0 {
                break true;
            }
        },
    };

    if !terminated || pos >= APIC_PREFIX {
        debug!("{}: APIC description runs past the frame prefix", source.identifier());
        return PictureStart::Malformed;
    }

    PictureStart::Found(pos as u64)
}

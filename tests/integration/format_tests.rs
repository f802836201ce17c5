//! End-to-end parsing tests over synthetic files.
//!
//! Every file here is assembled from the builders in `test_utils`, parsed
//! through the public API and checked field by field.

use metascan::{
    detect_container, parse_path, parse_source, plan_rotation, resolve_focal_lengths,
    BlockCache, BuiltinCropTable, ByteOrder, ContainerKind, MemorySource, ParseHint,
    ParseOptions, ParsedMetadata, RotateError, Rotation,
};

use super::test_utils::{
    camera_ifd0, canon_full_jpeg, cr3_file, create_test_jpeg, create_test_png,
    flac_with_picture, heif_with_exif, jpeg_with_exif, mp3_with_cover, rw2_with_preview, tags,
    write_temp, IfdBuilder, TiffBuilder, TrackingSource,
};

fn parse(data: Vec<u8>) -> ParsedMetadata {
    parse_with(data, &ParseOptions::default())
}

fn parse_with(data: Vec<u8>, options: &ParseOptions) -> ParsedMetadata {
    let source = MemorySource::new(data, "mem://test");
    parse_source(&source, &ParseHint::default(), options).unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap()
}

/// Camera TIFF with Exif and GPS directories.
fn full_camera_tiff(order: ByteOrder) -> Vec<u8> {
    let mut ifd0 = camera_ifd0("NIKON CORPORATION", "NIKON D100", 1);
    ifd0.ascii(tags::DATE_TIME, "2024:05:01 12:00:00");

    let mut exif = IfdBuilder::new();
    exif.rational(tags::EXPOSURE_TIME, 1, 250)
        .rational(tags::F_NUMBER, 28, 10)
        .short(tags::ISO, 200)
        .ascii(tags::DATE_TIME_ORIGINAL, "2024:05:01 10:00:00")
        .rational(tags::FOCAL_LENGTH, 50, 1)
        .ascii(tags::LENS_MODEL, "AF Nikkor 50mm f/1.8D");

    let mut gps = IfdBuilder::new();
    gps.ascii(1, "N")
        .rationals(2, &[(52, 1), (30, 1), (0, 1)])
        .ascii(3, "W")
        .rationals(4, &[(13, 1), (15, 1), (0, 1)]);

    TiffBuilder::new(order)
        .ifd0(ifd0)
        .exif(exif)
        .gps(gps)
        .build()
}

// =============================================================================
// Container Detection
// =============================================================================

#[test]
fn test_detect_generated_containers() {
    let cases = [
        (create_test_jpeg(16, 16, 80), ContainerKind::Jpeg),
        (create_test_png(16, 16), ContainerKind::Png),
        (full_camera_tiff(ByteOrder::LittleEndian), ContainerKind::Tiff),
        (full_camera_tiff(ByteOrder::BigEndian), ContainerKind::Tiff),
        (rw2_with_preview("Panasonic", &create_test_jpeg(16, 16, 80)), ContainerKind::Rw2),
        (mp3_with_cover(&create_test_jpeg(64, 64, 90), "image/jpeg").0, ContainerKind::Mp3),
        (
            flac_with_picture(&create_test_png(16, 16), "image/png", 16, 16).0,
            ContainerKind::Flac,
        ),
    ];

    for (data, expected) in cases {
        let source = MemorySource::new(data, "mem://detect");
        assert_eq!(detect_container(&source).unwrap(), expected);
    }
}

#[test]
fn test_unknown_container_is_an_error() {
    let source = MemorySource::new(b"RIFF\0\0\0\0WEBPVP8 ".to_vec(), "mem://webp");
    assert!(parse_source(&source, &ParseHint::default(), &ParseOptions::default()).is_err());
}

// =============================================================================
// Camera Fields
// =============================================================================

#[test]
fn test_full_camera_tiff_both_byte_orders() {
    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let meta = parse(full_camera_tiff(order));

        assert_eq!(meta.make.as_deref(), Some("NIKON CORPORATION"));
        assert_eq!(meta.model.as_deref(), Some("NIKON D100"));
        assert_eq!(meta.lens_model.as_deref(), Some("AF Nikkor 50mm f/1.8D"));
        assert_eq!(meta.iso, Some(200));
        assert_eq!(meta.exposure_time.map(|r| (r.num, r.den)), Some((1, 250)));
        assert_eq!(meta.aperture.map(|r| (r.num, r.den)), Some((28, 10)));
        assert_eq!(meta.capture_time(), Some("2024:05:01 10:00:00"));
        assert_eq!(meta.date_time.as_deref(), Some("2024:05:01 12:00:00"));

        let lat = meta.latitude.unwrap();
        let lon = meta.longitude.unwrap();
        assert!((lat - 52.5).abs() < 1e-9, "latitude {lat}");
        assert!((lon + 13.25).abs() < 1e-9, "longitude {lon}");
    }
}

#[test]
fn test_nikon_d100_focal_length_guess() {
    let meta = parse(full_camera_tiff(ByteOrder::BigEndian));
    let focal = resolve_focal_lengths(&meta, &BuiltinCropTable);

    assert_eq!(focal.stated, Some(50.0));
    assert_eq!(focal.equivalent_35mm, None);
    let guess = focal.guess.unwrap();
    assert!((guess - 76.39).abs() < 0.01, "guess {guess}");
    assert_eq!(focal.best, focal.guess);
}

#[test]
fn test_stated_35mm_equivalent_wins() {
    let mut exif = IfdBuilder::new();
    exif.rational(tags::FOCAL_LENGTH, 50, 1)
        .short(tags::FOCAL_LENGTH_35MM, 75);
    let data = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(camera_ifd0("NIKON CORPORATION", "NIKON D100", 1))
        .exif(exif)
        .build();

    let focal = resolve_focal_lengths(&parse(data), &BuiltinCropTable);
    assert_eq!(focal.best, Some(75.0));
}

#[test]
fn test_jpeg_with_exif() {
    let jpeg = create_test_jpeg(320, 240, 90);
    let data = jpeg_with_exif(&jpeg, &full_camera_tiff(ByteOrder::LittleEndian));
    let meta = parse(data);

    assert_eq!((meta.width, meta.height), (Some(320), Some(240)));
    assert_eq!(meta.model.as_deref(), Some("NIKON D100"));
    assert_eq!(meta.orientation_value(), Some(1));
    // A plain JPEG never reports itself as an embedded image
    assert!(meta.embedded.is_none());
}

#[test]
fn test_png_has_dimensions_only() {
    let meta = parse(create_test_png(800, 600));

    assert_eq!((meta.width, meta.height), (Some(800), Some(600)));
    assert!(meta.make.is_none());
    assert!(meta.model.is_none());
    assert!(meta.orientation.is_none());
    assert!(meta.embedded.is_none());
    assert!(meta.capture_time().is_none());
}

// =============================================================================
// Audio Cover Art
// =============================================================================

#[test]
fn test_mp3_cover_exact_bounds() {
    let cover = create_test_jpeg(320, 240, 90);
    let (data, image_at) = mp3_with_cover(&cover, "image/jpeg");
    let meta = parse(data.clone());

    let embedded = meta.embedded.unwrap();
    assert_eq!(embedded.offset, image_at);
    assert_eq!(embedded.length, cover.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(320), Some(240)));

    let start = embedded.offset as usize;
    assert_eq!(&data[start..start + cover.len()], &cover[..]);
}

#[test]
fn test_mp3_cover_exif_is_reported() {
    let cover = jpeg_with_exif(
        &create_test_jpeg(320, 240, 90),
        &full_camera_tiff(ByteOrder::BigEndian),
    );
    let (data, _) = mp3_with_cover(&cover, "image/jpeg");
    let meta = parse(data);

    assert_eq!(meta.make.as_deref(), Some("NIKON CORPORATION"));
    assert_eq!(meta.iso, Some(200));
}

#[test]
fn test_flac_png_cover() {
    let cover = create_test_png(800, 600);
    let (data, image_at) = flac_with_picture(&cover, "image/png", 800, 600);
    let meta = parse(data);

    let embedded = meta.embedded.unwrap();
    assert_eq!(embedded.offset, image_at);
    assert_eq!(embedded.length, cover.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(800), Some(600)));
    assert!(meta.make.is_none());
}

#[test]
fn test_flac_declared_size_without_usable_picture() {
    let (data, _) = flac_with_picture(&[0x11; 2000], "image/png", 640, 480);
    let meta = parse(data);

    assert_eq!((meta.width, meta.height), (Some(640), Some(480)));
    assert!(meta.embedded.is_none());
    assert!(meta.orientation.is_none());
}

// =============================================================================
// RAW Previews
// =============================================================================

#[test]
fn test_rw2_preview_metadata_and_bounds() {
    let preview_tiff = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(camera_ifd0("Panasonic", "DC-GH5", 6))
        .build();
    let preview = jpeg_with_exif(&create_test_jpeg(160, 120, 85), &preview_tiff);
    let data = rw2_with_preview("Panasonic", &preview);
    let preview_at = find(&data, &preview);

    let file = write_temp(&data, "RW2");
    let meta = parse_path(file.path(), &ParseOptions::default()).unwrap();

    assert_eq!(meta.make.as_deref(), Some("Panasonic"));
    assert_eq!(meta.model.as_deref(), Some("DC-GH5"));
    assert_eq!((meta.width, meta.height), (Some(4000), Some(3000)));

    let embedded = meta.embedded.unwrap();
    assert_eq!(embedded.offset, preview_at as u64);
    assert_eq!(embedded.length, preview.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(160), Some(120)));

    // The preview's orientation tag is addressed in file coordinates
    let target = meta.orientation.as_ref().unwrap().targets[0];
    let at = target.offset as usize;
    assert!(at > preview_at);
    assert_eq!(&data[at..at + 2], &[6, 0]);
}

#[test]
fn test_locator_prefers_larger_later_candidate() {
    let small = create_test_jpeg(32, 24, 80);
    let large = create_test_jpeg(320, 240, 90);
    assert!(large.len() > small.len());

    let mut ifd0 = camera_ifd0("Canon", "Canon EOS 5D", 1);
    ifd0.thumbnail(&small);
    let mut ifd1 = IfdBuilder::new();
    ifd1.thumbnail(&large);

    let data = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(ifd0)
        .ifd1(ifd1)
        .build();
    let large_at = find(&data, &large);
    let embedded = parse(data).embedded.unwrap();

    assert_eq!(embedded.offset, large_at as u64);
    assert_eq!(embedded.length, large.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(320), Some(240)));
}

#[test]
fn test_locator_keeps_earlier_larger_candidate() {
    let small = create_test_jpeg(32, 24, 80);
    let large = create_test_jpeg(320, 240, 90);

    let mut ifd0 = camera_ifd0("Canon", "Canon EOS 5D", 1);
    ifd0.thumbnail(&large);
    let mut ifd1 = IfdBuilder::new();
    ifd1.thumbnail(&small);

    let data = TiffBuilder::new(ByteOrder::BigEndian)
        .ifd0(ifd0)
        .ifd1(ifd1)
        .build();
    let embedded = parse(data).embedded.unwrap();
    assert_eq!(embedded.length, large.len() as u64);
}

#[test]
fn test_locator_ignores_length_past_end_of_file() {
    let thumbnail = create_test_jpeg(160, 120, 85);

    // IFD0 points at the real thumbnail with a bogus length, IFD1 gets it right
    let build = |offset: u32| {
        let mut ifd0 = camera_ifd0("Canon", "Canon EOS 5D", 1);
        ifd0.raw(tags::JPEG_OFFSET, 4, 1, &offset.to_le_bytes())
            .raw(tags::JPEG_LENGTH, 4, 1, &u32::MAX.to_le_bytes());
        let mut ifd1 = IfdBuilder::new();
        ifd1.thumbnail(&thumbnail);
        TiffBuilder::new(ByteOrder::LittleEndian)
            .ifd0(ifd0)
            .ifd1(ifd1)
            .build()
    };
    let thumbnail_at = find(&build(0), &thumbnail);
    let data = build(thumbnail_at as u32);
    assert_eq!(find(&data, &thumbnail), thumbnail_at);

    let embedded = parse(data).embedded.unwrap();
    assert_eq!(embedded.offset, thumbnail_at as u64);
    assert_eq!(embedded.length, thumbnail.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(160), Some(120)));
}

#[test]
fn test_thumbnail_without_signature_is_ignored() {
    let mut ifd0 = camera_ifd0("Canon", "Canon EOS 5D", 1);
    ifd0.thumbnail(&[0x12u8; 4000]);
    let data = TiffBuilder::new(ByteOrder::LittleEndian).ifd0(ifd0).build();

    let meta = parse(data);
    assert!(meta.embedded.is_none());
    assert_eq!(meta.make.as_deref(), Some("Canon"));
}

// =============================================================================
// ISO Base Media
// =============================================================================

#[test]
fn test_heif_exif_item() {
    let data = heif_with_exif(&full_camera_tiff(ByteOrder::BigEndian));
    let source = MemorySource::new(data.clone(), "mem://photo.heic");
    assert_eq!(detect_container(&source).unwrap(), ContainerKind::Bmff);

    let meta = parse(data.clone());
    assert_eq!(meta.model.as_deref(), Some("NIKON D100"));
    assert_eq!(meta.iso, Some(200));
    assert!(meta.latitude.is_some());

    let target = meta.orientation.as_ref().unwrap().targets[0];
    let at = target.offset as usize;
    assert_eq!(&data[at..at + 2], &[0, 1]);
}

#[test]
fn test_cr3_metadata_and_full_size_jpeg() {
    let cmt1 = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(camera_ifd0("Canon", "Canon EOS R5", 8))
        .build();

    let mut exif = IfdBuilder::new();
    exif.short(tags::ISO, 800)
        .rational(tags::EXPOSURE_TIME, 1, 1000)
        .rational(tags::FOCAL_LENGTH, 85, 1)
        .ascii(tags::LENS_MODEL, "RF85mm F1.2 L USM");
    let cmt2 = TiffBuilder::new(ByteOrder::LittleEndian).ifd0(exif).build();

    let preview = create_test_jpeg(160, 120, 80);
    let full = canon_full_jpeg(6000, 4000, 60_000);
    assert!(full.len() > preview.len());
    let (data, full_at) = cr3_file(&cmt1, &cmt2, &preview, &full);

    let meta = parse(data.clone());
    assert_eq!(meta.make.as_deref(), Some("Canon"));
    assert_eq!(meta.model.as_deref(), Some("Canon EOS R5"));
    assert_eq!(meta.iso, Some(800));
    assert_eq!(meta.lens_model.as_deref(), Some("RF85mm F1.2 L USM"));
    assert_eq!(meta.exposure_time.map(|r| (r.num, r.den)), Some((1, 1000)));

    let target = meta.orientation.as_ref().unwrap().targets[0];
    let at = target.offset as usize;
    assert_eq!(&data[at..at + 2], &[8, 0]);

    let embedded = meta.embedded.unwrap();
    assert_eq!(embedded.offset, full_at);
    assert_eq!(embedded.length, full.len() as u64);
    assert_eq!((embedded.width, embedded.height), (Some(6000), Some(4000)));
}

// =============================================================================
// Tag Directory Edge Cases
// =============================================================================

#[test]
fn test_oversized_directory_is_rejected() {
    let mut ifd0 = IfdBuilder::new();
    ifd0.ascii(tags::MAKE, "Canon");
    for i in 0..250 {
        ifd0.short(1000 + i, i);
    }
    let data = TiffBuilder::new(ByteOrder::LittleEndian).ifd0(ifd0).build();

    let meta = parse(data.clone());
    assert!(meta.make.is_none());

    let relaxed = ParseOptions {
        max_directory_entries: 300,
        ..ParseOptions::default()
    };
    assert_eq!(parse_with(data, &relaxed).make.as_deref(), Some("Canon"));
}

#[test]
fn test_inline_short_unpacking() {
    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let data = TiffBuilder::new(order)
            .ifd0(camera_ifd0("Sony", "ILCE-7M3", 8))
            .build();
        let meta = parse(data.clone());

        assert_eq!(meta.orientation_value(), Some(8));
        let target = meta.orientation.as_ref().unwrap().targets[0];
        assert_eq!(target.byte_order, order);
        let at = target.offset as usize;
        assert_eq!([data[at], data[at + 1]], order.u16_bytes(8));
    }
}

#[test]
fn test_long_orientation_is_read_but_not_rotatable() {
    let mut ifd0 = IfdBuilder::new();
    ifd0.ascii(tags::MAKE, "Canon")
        .raw(tags::ORIENTATION, 4, 1, &[0, 0, 0, 3]);
    let data = TiffBuilder::new(ByteOrder::BigEndian).ifd0(ifd0).build();

    let meta = parse(data);
    assert_eq!(meta.orientation_value(), Some(3));
    assert!(matches!(
        plan_rotation(meta.orientation.as_ref(), Rotation::Right),
        Err(RotateError::UnexpectedType(4))
    ));
}

#[test]
fn test_cyclic_directory_chain_terminates() {
    let mut data = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(camera_ifd0("Canon", "Canon EOS R5", 1))
        .build();

    // IFD0 sits at 8 with three entries; point its next link back at itself
    let next_at = 8 + 2 + 3 * 12;
    data[next_at..next_at + 4].copy_from_slice(&8u32.to_le_bytes());

    let meta = parse(data);
    assert_eq!(meta.model.as_deref(), Some("Canon EOS R5"));
    assert_eq!(meta.orientation.as_ref().unwrap().targets.len(), 1);
}

#[test]
fn test_truncated_file_keeps_what_was_read() {
    let data = full_camera_tiff(ByteOrder::LittleEndian);
    let cut = data.len() - 40;
    let meta = parse(data[..cut].to_vec());

    assert_eq!(meta.make.as_deref(), Some("NIKON CORPORATION"));
}

// =============================================================================
// Block Cache Effectiveness
// =============================================================================

#[test]
fn test_block_cache_reduces_requests() {
    let data = jpeg_with_exif(
        &create_test_jpeg(64, 64, 80),
        &full_camera_tiff(ByteOrder::LittleEndian),
    );
    let tracking = TrackingSource::new(data, "mem://tracked.jpg");
    let hint = ParseHint::default();
    let options = ParseOptions::default();

    let direct = parse_source(&tracking, &hint, &options).unwrap();
    let direct_requests = tracking.request_count();

    tracking.reset_tracking();
    let cached_source = BlockCache::new(&tracking);
    let cached = parse_source(&cached_source, &hint, &options).unwrap();
    let cached_requests = tracking.request_count();

    assert_eq!(direct, cached);
    assert!(
        cached_requests < direct_requests,
        "cached {cached_requests} vs direct {direct_requests}"
    );
    // The whole file fits in one block
    assert!(cached_requests <= 2, "cached {cached_requests}");
    assert!(tracking.get_requests().iter().all(|&(offset, _)| offset == 0));
}

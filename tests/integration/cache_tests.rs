//! MetadataCache behavior through real files on disk.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use metascan::{
    copy_embedded, ByteOrder, CacheOptions, CropFactorLookup, MetadataCache, ParseOptions,
};

use super::test_utils::{
    camera_ifd0, create_test_jpeg, create_test_png, jpeg_with_exif, mp3_with_cover, tags,
    write_temp, IfdBuilder, TiffBuilder,
};

fn camera_jpeg(orientation: u16) -> Vec<u8> {
    let mut exif = IfdBuilder::new();
    exif.rational(tags::EXPOSURE_TIME, 1, 125)
        .rational(tags::F_NUMBER, 4, 1)
        .short(tags::ISO, 400)
        .ascii(tags::DATE_TIME_ORIGINAL, "2023:12:24 18:30:00")
        .rational(tags::FOCAL_LENGTH, 35, 1)
        .ascii(tags::LENS_MODEL, "RF35mm F1.8 MACRO IS STM");

    let mut gps = IfdBuilder::new();
    gps.ascii(1, "S")
        .rationals(2, &[(33, 1), (52, 1), (0, 1)])
        .ascii(3, "E")
        .rationals(4, &[(151, 1), (12, 1), (0, 1)]);

    let tiff = TiffBuilder::new(ByteOrder::LittleEndian)
        .ifd0(camera_ifd0("Canon", "Canon EOS R6", orientation))
        .exif(exif)
        .gps(gps)
        .build();
    jpeg_with_exif(&create_test_jpeg(320, 240, 90), &tiff)
}

fn push_mtime_forward(path: &std::path::Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

// =============================================================================
// Accessors
// =============================================================================

#[test]
fn test_accessors_answer_from_one_parse() {
    let file = write_temp(&camera_jpeg(1), "jpg");
    let cache = MetadataCache::default();
    let path = file.path();

    assert_eq!(
        cache.camera_info(path),
        Some(("Canon".to_string(), "Canon EOS R6".to_string()))
    );
    assert_eq!(
        cache.lens_info(path),
        Some((String::new(), "RF35mm F1.8 MACRO IS STM".to_string()))
    );
    assert_eq!(cache.capture_time(path).as_deref(), Some("2023:12:24 18:30:00"));
    assert_eq!(cache.dimensions(path), Some((320, 240)));
    assert_eq!(cache.orientation(path), Some(1));
    assert!(cache.embedded_image(path).is_none());

    let (lat, lon) = cache.gps_location(path).unwrap();
    assert!((lat + 33.8666).abs() < 1e-3, "latitude {lat}");
    assert!((lon - 151.2).abs() < 1e-9, "longitude {lon}");

    let focal = cache.focal_lengths(path).unwrap();
    assert_eq!(focal.stated, Some(35.0));

    let first = cache.metadata(path);
    let second = cache.metadata(path);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_summary_mentions_camera_and_exposure() {
    let file = write_temp(&camera_jpeg(1), "jpg");
    let cache = MetadataCache::default();

    let summary = cache.interesting_metadata(file.path(), None).unwrap();
    assert!(summary.contains("Canon EOS R6"), "{summary}");
    assert!(summary.contains("ISO 400"), "{summary}");
}

#[test]
fn test_png_has_no_camera_fields() {
    let file = write_temp(&create_test_png(800, 600), "png");
    let cache = MetadataCache::default();

    assert_eq!(cache.dimensions(file.path()), Some((800, 600)));
    assert_eq!(cache.camera_info(file.path()), None);
    assert_eq!(cache.lens_info(file.path()), None);
    assert_eq!(cache.focal_lengths(file.path()), None);
    assert_eq!(cache.gps_location(file.path()), None);
}

#[test]
fn test_custom_crop_table() {
    struct Doubler;
    impl CropFactorLookup for Doubler {
        fn crop_factor(&self, _model: &str) -> Option<f64> {
            Some(2.0)
        }
    }

    let file = write_temp(&camera_jpeg(1), "jpg");
    let cache = MetadataCache::default().with_crop_table(Arc::new(Doubler));

    let focal = cache.focal_lengths(file.path()).unwrap();
    assert_eq!(focal.guess, Some(70.0));
    assert_eq!(focal.best, Some(70.0));
}

// =============================================================================
// Invalidation
// =============================================================================

#[test]
fn test_single_slot_follows_current_file() {
    let a = write_temp(&camera_jpeg(1), "jpg");
    let b = write_temp(&create_test_png(64, 48), "png");
    let cache = MetadataCache::default();

    assert_eq!(cache.dimensions(a.path()), Some((320, 240)));
    assert_eq!(cache.dimensions(b.path()), Some((64, 48)));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.dimensions(a.path()), Some((320, 240)));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_larger_capacity_keeps_several_files() {
    let a = write_temp(&camera_jpeg(1), "jpg");
    let b = write_temp(&create_test_png(64, 48), "png");
    let cache = MetadataCache::new(
        ParseOptions::default(),
        CacheOptions {
            capacity: 2,
            ..CacheOptions::default()
        },
    );

    let first = cache.metadata(a.path());
    cache.metadata(b.path());
    assert_eq!(cache.len(), 2);
    assert!(Arc::ptr_eq(&first, &cache.metadata(a.path())));
}

#[test]
fn test_modified_file_is_reparsed_when_checking() {
    let file = write_temp(&camera_jpeg(1), "jpg");
    let checking = MetadataCache::new(
        ParseOptions::default(),
        CacheOptions {
            check_modified: true,
            ..CacheOptions::default()
        },
    );
    let trusting = MetadataCache::default();

    assert_eq!(checking.orientation(file.path()), Some(1));
    assert_eq!(trusting.orientation(file.path()), Some(1));

    std::fs::write(file.path(), camera_jpeg(8)).unwrap();
    push_mtime_forward(file.path());

    assert_eq!(checking.orientation(file.path()), Some(8));
    assert_eq!(trusting.orientation(file.path()), Some(1));

    trusting.purge();
    assert!(trusting.is_empty());
    assert_eq!(trusting.orientation(file.path()), Some(8));
}

#[test]
fn test_unreadable_file_is_all_unknown() {
    let cache = MetadataCache::default();
    let missing = std::path::Path::new("/definitely/not/here.cr3");

    assert_eq!(cache.camera_info(missing), None);
    assert_eq!(cache.dimensions(missing), None);
    assert_eq!(cache.interesting_metadata(missing, None), None);

    let garbage = write_temp(b"this is not an image at all", "jpg");
    assert_eq!(cache.orientation(garbage.path()), None);
    assert_eq!(*cache.metadata(garbage.path()), metascan::ParsedMetadata::new());
}

// =============================================================================
// Embedded Image Extraction
// =============================================================================

#[test]
fn test_cover_art_copy_matches_original_bytes() {
    let cover = create_test_jpeg(200, 200, 90);
    let (data, _) = mp3_with_cover(&cover, "image/jpeg");
    let file = write_temp(&data, "mp3");
    let cache = MetadataCache::default();

    let embedded = cache.embedded_image(file.path()).unwrap();
    assert_eq!((embedded.width, embedded.height), (Some(200), Some(200)));

    let mut out = Vec::new();
    let copied = copy_embedded(file.path(), &embedded, &mut out).unwrap();
    assert_eq!(copied, cover.len() as u64);
    assert_eq!(out, cover);
}

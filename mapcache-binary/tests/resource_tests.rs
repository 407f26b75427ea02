//! Resource and metadata tests against a synthetic Reach retail map

mod common;

use mapcache_binary::dependency::{Constructible, Constructor};
use mapcache_binary::{
    BinaryError, CacheFile, FieldDescriptor, PageType, ResourceIdentifier, Result, Structure,
    TypeSchema,
};
use std::sync::Arc;

/// A bitmap-like tag: dimensions and the resource holding its pixels
#[derive(Debug, Default)]
struct Bitmap {
    width: i16,
    height: i16,
    resource: Option<ResourceIdentifier>,
}

impl Constructible for Bitmap {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::default_value()]
    }
}

impl Structure for Bitmap {
    fn build_schema() -> Result<TypeSchema<Self>> {
        TypeSchema::builder("Bitmap")
            .field(FieldDescriptor::new("width", |b: &mut Self, v: i16| b.width = v).at(0))
            .field(FieldDescriptor::new("height", |b: &mut Self, v: i16| b.height = v).at(2))
            .field(
                FieldDescriptor::new("resource", |b: &mut Self, v: ResourceIdentifier| {
                    b.resource = Some(v)
                })
                .at(4),
            )
            .fixed_size(8)
            .build()
    }
}

fn resource(cache: &CacheFile, row: u32) -> ResourceIdentifier {
    ResourceIdentifier::new(0x0003_0000 | row, cache.clone())
}

fn assert_not_found(result: Result<Vec<u8>>) {
    match result {
        Err(BinaryError::ResourceNotFound { .. }) => {}
        other => panic!("expected ResourceNotFound, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_gestalt_and_layout() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let gestalt = cache.resource_gestalt().unwrap();
    let segments: Vec<i16> = (0..6)
        .map(|row| gestalt.entry(row).unwrap().segment_index)
        .collect();
    assert_eq!(segments, vec![0, 1, -1, 2, 3, 4]);
    assert!(gestalt.entry(6).is_none());

    let layout = cache.resource_layout().unwrap();
    assert_eq!(layout.shared_cache(0).unwrap().base_name(), "shared.map");
    assert_eq!(layout.page(1).unwrap().cache_index, 0);
    assert_eq!(layout.segment(0).unwrap().primary_offset, 16);
    assert_eq!(layout.segment(3).unwrap().secondary_page, 2);
    assert!(layout.segment(5).is_none());
}

#[test]
fn test_system_metadata_is_cached() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let first = cache.resource_gestalt().unwrap();
    let second = cache.resource_gestalt().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // Clones share the container state
    let third = cache.clone().resource_layout().unwrap();
    assert!(Arc::ptr_eq(&third, &cache.resource_layout().unwrap()));
}

#[test]
fn test_local_compressed_page() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();
    let start = common::LOCAL_CHUNK_OFFSET;

    let data = resource(&cache, common::LOCAL_ROW)
        .read_data(PageType::Auto, 8)
        .unwrap();
    assert_eq!(hex::encode(&data), hex::encode(&fixture.local_page[start..start + 8]));

    let all = resource(&cache, common::LOCAL_ROW)
        .read_data(PageType::Primary, usize::MAX)
        .unwrap();
    assert_eq!(all, fixture.local_page[start..]);
}

#[test]
fn test_shared_stored_page() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let data = resource(&cache, common::SHARED_ROW)
        .read_data(PageType::Auto, usize::MAX)
        .unwrap();
    assert_eq!(data, fixture.shared_page[common::SHARED_CHUNK_OFFSET..]);
}

#[test]
fn test_missing_companion() {
    let fixture = common::build();
    std::fs::remove_file(fixture.dir.path().join("shared.map")).unwrap();
    let cache = CacheFile::open(&fixture.path).unwrap();

    assert_not_found(
        resource(&cache, common::SHARED_ROW).read_data(PageType::Auto, usize::MAX),
    );
    // Local pages are unaffected
    assert!(
        resource(&cache, common::LOCAL_ROW)
            .read_data(PageType::Auto, 4)
            .is_ok()
    );
}

#[test]
fn test_unresolvable_resources() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    assert_not_found(resource(&cache, common::NO_SEGMENT_ROW).read_data(PageType::Auto, 16));
    assert_not_found(resource(&cache, common::NO_DATA_ROW).read_data(PageType::Auto, 16));
    assert_not_found(resource(&cache, 0xFFFF).read_data(PageType::Auto, 16));
    assert_not_found(resource(&cache, common::LOCAL_ROW).read_data(PageType::Secondary, 16));
    assert_not_found(resource(&cache, common::LOCAL_ROW).read_data(PageType::Tertiary, 16));
}

#[test]
fn test_auto_falls_back_to_primary() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let data = resource(&cache, common::FALLBACK_ROW)
        .read_data(PageType::Auto, usize::MAX)
        .unwrap();
    assert_eq!(data, fixture.local_page[common::LOCAL_CHUNK_OFFSET..]);
}

#[test]
fn test_explicit_mode_does_not_fall_back() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    // Secondary page with a negative data offset
    assert_not_found(resource(&cache, common::FALLBACK_ROW).read_data(PageType::Secondary, 16));
    // Secondary page with no compressed bytes
    assert_not_found(
        resource(&cache, common::DEAD_FALLBACK_ROW).read_data(PageType::Secondary, 16),
    );
    // The primary page itself is still readable on request
    assert_eq!(
        resource(&cache, common::FALLBACK_ROW)
            .read_data(PageType::Primary, 4)
            .unwrap(),
        fixture.local_page[common::LOCAL_CHUNK_OFFSET..common::LOCAL_CHUNK_OFFSET + 4]
    );
}

#[test]
fn test_auto_fallback_to_missing_primary() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    assert_not_found(
        resource(&cache, common::DEAD_FALLBACK_ROW).read_data(PageType::Auto, usize::MAX),
    );
}

#[test]
fn test_bitmap_metadata() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let tag = cache.tag(4).unwrap();
    let bitmap = cache.read_metadata::<Bitmap>(tag).unwrap();
    assert_eq!((bitmap.width, bitmap.height), (64, 32));

    let resource = bitmap.resource.as_ref().unwrap();
    assert_eq!(resource.value(), 0x0007_0000 | common::LOCAL_ROW);
    assert_eq!(resource.row(), common::LOCAL_ROW as usize);
    assert_eq!(
        resource.read_data(PageType::Auto, 4).unwrap(),
        fixture.local_page[common::LOCAL_CHUNK_OFFSET..common::LOCAL_CHUNK_OFFSET + 4]
    );

    // Ordinary tags are read fresh on every request
    let again = cache.read_metadata::<Bitmap>(tag).unwrap();
    assert!(!Arc::ptr_eq(&bitmap, &again));
}

#[test]
fn test_metadata_without_pointer() {
    let fixture = common::build();
    let cache = CacheFile::open(&fixture.path).unwrap();

    let result = cache.read_metadata::<Bitmap>(cache.tag(3).unwrap());
    assert!(matches!(result, Err(BinaryError::MissingEntry { .. })));
}

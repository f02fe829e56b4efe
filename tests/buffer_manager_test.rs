//! Integration tests for the buffer manager, pools and file mappings.

use framepool::mmap::MapMode;
use framepool::{
    AccessMode, BufferManager, BufferType, DType, EngineConfig, Error, Strategy,
};
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn manager_in(dir: &TempDir) -> BufferManager {
    let config = EngineConfig {
        scratch_dir: dir.path().join("scratch"),
        normal_capacity: 4096,
        stream_capacity: 4096,
        pipeline_capacity: 4096,
        shared_capacity: 4096,
        temporary_capacity: 4096,
        max_cached_maps: 2,
        ..EngineConfig::default()
    };
    BufferManager::new(config).unwrap()
}

#[test]
fn allocate_get_put_round_trip() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    let handle = m
        .allocate(BufferType::Normal, "frame", &[4, 4], DType::U8, AccessMode::ReadWrite)
        .unwrap();
    assert!(handle.read().iter().all(|&b| b == 0)); // zero-initialized

    let data: Vec<u8> = (0u8..16).collect();
    m.put(BufferType::Normal, "frame", &data, &[4, 4], DType::U8, AccessMode::ReadWrite)
        .unwrap();

    assert_eq!(m.get(BufferType::Normal, "frame").unwrap().to_vec(), data);
}

#[test]
fn capacity_is_never_exceeded() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    // Fill well past capacity; eviction must keep the pool within bounds.
    for i in 0..20 {
        m.allocate(
            BufferType::Normal,
            &format!("b{}", i),
            &[512],
            DType::U8,
            AccessMode::ReadWrite,
        )
        .unwrap();
        let (_, snapshot) = m.get_buffer_stats(Some(BufferType::Normal))[0];
        assert!(snapshot.current_size <= 4096);
    }

    let (_, snapshot) = m.get_buffer_stats(Some(BufferType::Normal))[0];
    assert!(snapshot.evictions >= 12);
    assert_eq!(snapshot.allocations, 20);
}

#[test]
fn oversized_request_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    m.allocate(BufferType::Normal, "keep", &[128], DType::U8, AccessMode::ReadWrite)
        .unwrap();

    let result = m.allocate(
        BufferType::Normal,
        "huge",
        &[8192],
        DType::U8,
        AccessMode::ReadWrite,
    );
    assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
    assert!(m.get(BufferType::Normal, "keep").is_some());
}

#[test]
fn views_alias_pool_storage() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    m.allocate(BufferType::Normal, "img", &[8], DType::U8, AccessMode::ReadWrite)
        .unwrap();

    let view = m.view(BufferType::Normal, "img", 2..6).unwrap();
    view.write().copy_from_slice(&[1, 2, 3, 4]);

    let full = m.get(BufferType::Normal, "img").unwrap();
    assert_eq!(&full.read()[2..6], &[1, 2, 3, 4]);
}

#[test]
fn typed_views_respect_element_size() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    // 8 f32 elements = 32 bytes; elements 2..4 = bytes 8..16.
    m.allocate(BufferType::Normal, "floats", &[8], DType::F32, AccessMode::ReadWrite)
        .unwrap();

    let view = m.view(BufferType::Normal, "floats", 2..4).unwrap();
    assert_eq!(view.offset(), 8);
    assert_eq!(view.len(), 8);

    // Past the last element: rejected.
    assert!(m.view(BufferType::Normal, "floats", 6..9).is_none());
}

#[test]
fn lru_eviction_prefers_stale_entries() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        scratch_dir: dir.path().join("scratch"),
        normal_capacity: 100,
        strategy: Strategy::Lru,
        ..EngineConfig::default()
    };
    let m = BufferManager::new(config).unwrap();

    for key in ["first", "second", "third"] {
        m.allocate(BufferType::Normal, key, &[40], DType::U8, AccessMode::ReadWrite)
            .unwrap();
    }

    assert!(m.get(BufferType::Normal, "first").is_none());
    assert!(m.get(BufferType::Normal, "second").is_some());
    assert!(m.get(BufferType::Normal, "third").is_some());
}

#[test]
fn temp_buffers_live_in_scratch_files() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    let (key, handle) = m.create_temp_buffer(&[1024], DType::U8).unwrap();
    handle.write().fill(0x5A);

    let scratch = &m.config().scratch_dir;
    let files: Vec<_> = fs::read_dir(scratch).unwrap().collect();
    assert_eq!(files.len(), 1);

    // Releasing the buffer deletes its backing file.
    assert!(m.release(BufferType::Temporary, &key));
    assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);
}

#[test]
fn mapping_cache_bounded_and_clearable() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir); // max_cached_maps: 2

    let mut paths = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("file{}.bin", i));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(&[i as u8; 64]).unwrap();
        paths.push(path);
    }

    for path in &paths {
        m.map_file(path, MapMode::ReadOnly).unwrap();
    }

    // One past the bound: the least recently used mapping was evicted.
    assert_eq!(m.mapping_cache().cached_count(), 2);
    assert!(!m.mapping_cache().is_cached(&paths[0]));

    m.mapping_cache().clear_all();
    assert_eq!(m.mapping_cache().cached_count(), 0);
}

#[test]
fn stream_buffers_carry_frame_geometry() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    let handle = m.create_stream_buffer("clip", 2, 4, 4, 3, DType::U8).unwrap();
    assert_eq!(handle.shape(), &[2, 4, 4, 3]);

    // Frame 1 occupies elements 48..96.
    let frame1 = m.view(BufferType::Stream, "clip", 48..96).unwrap();
    frame1.write().fill(7);
    assert_eq!(m.get(BufferType::Stream, "clip").unwrap().read()[48], 7);
}

#[test]
fn clear_resets_pools_but_keeps_counters() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    m.allocate(BufferType::Normal, "a", &[64], DType::U8, AccessMode::ReadWrite)
        .unwrap();
    m.allocate(BufferType::Shared, "b", &[64], DType::U8, AccessMode::ReadWrite)
        .unwrap();

    m.clear(None);

    for (_, snapshot) in m.get_buffer_stats(None) {
        assert_eq!(snapshot.current_size, 0);
    }
    let (_, normal) = m.get_buffer_stats(Some(BufferType::Normal))[0];
    assert_eq!(normal.allocations, 1);
}

#[test]
fn handles_outlive_release() {
    let dir = TempDir::new().unwrap();
    let m = manager_in(&dir);

    let handle = m
        .allocate(BufferType::Normal, "gone", &[16], DType::U8, AccessMode::ReadWrite)
        .unwrap();
    handle.write()[0] = 42;

    m.release(BufferType::Normal, "gone");
    assert!(m.get(BufferType::Normal, "gone").is_none());

    // The payload survives until the last handle drops.
    assert_eq!(handle.read()[0], 42);
}

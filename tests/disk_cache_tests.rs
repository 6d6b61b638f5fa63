//! Disk Cache Tests
//!
//! Tests for:
//! - Header creation and layout validation (unknown layouts start fresh)
//! - Append/replay ordering
//! - Fail-soft tail truncation: damage loses only the trailing records
//! - Full persist → reopen round trip through the shader cache with zero
//!   recompilation

mod common;

use std::fs::{self, OpenOptions};
use std::io::Write as _;

use common::{CountingBackend, TestState, default_config, harness_with};
use kiln::{DiskCache, Role, ShaderStatus, WaitMode};

const KEY_SIZE: usize = 16;

fn key(tag: u8) -> [u8; KEY_SIZE] {
    let mut bytes = [0u8; KEY_SIZE];
    bytes[0] = tag;
    bytes
}

// ============================================================================
// Raw store
// ============================================================================

#[test]
fn fresh_file_is_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.cache");

    let cache = DiskCache::open(&path, KEY_SIZE, |_, _| panic!("fresh cache has no records")).unwrap();
    assert_eq!(cache.records(), 0);
    drop(cache);

    assert_eq!(fs::metadata(&path).unwrap().len(), 12, "magic + version + key size");
}

#[test]
fn appended_records_replay_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.cache");

    let mut cache = DiskCache::open(&path, KEY_SIZE, |_, _| {}).unwrap();
    cache.append(&key(1), b"one").unwrap();
    cache.append(&key(2), b"two").unwrap();
    cache.append(&key(3), b"three").unwrap();
    cache.sync().unwrap();
    drop(cache);

    let mut seen = Vec::new();
    let cache = DiskCache::open(&path, KEY_SIZE, |k, v| seen.push((k.to_vec(), v.to_vec()))).unwrap();
    assert_eq!(cache.records(), 3);
    assert_eq!(
        seen,
        vec![
            (key(1).to_vec(), b"one".to_vec()),
            (key(2).to_vec(), b"two".to_vec()),
            (key(3).to_vec(), b"three".to_vec()),
        ]
    );
}

#[test]
fn damaged_tail_loses_only_trailing_records() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("damaged.cache");

    let mut cache = DiskCache::open(&path, KEY_SIZE, |_, _| {}).unwrap();
    cache.append(&key(1), b"first").unwrap();
    cache.append(&key(2), b"second").unwrap();
    cache.append(&key(3), b"third").unwrap();
    cache.sync().unwrap();
    drop(cache);

    // Chop two bytes off the last record, as a crash mid-append would.
    let full_len = fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 2).unwrap();
    drop(file);

    let mut seen = Vec::new();
    let mut cache = DiskCache::open(&path, KEY_SIZE, |k, v| seen.push((k.to_vec(), v.to_vec()))).unwrap();
    assert_eq!(cache.records(), 2, "only the damaged record is lost");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], (key(2).to_vec(), b"second".to_vec()));

    // The file keeps working after truncation.
    cache.append(&key(3), b"third again").unwrap();
    cache.sync().unwrap();
    drop(cache);

    let mut replayed = 0;
    let cache = DiskCache::open(&path, KEY_SIZE, |_, _| replayed += 1).unwrap();
    assert_eq!(cache.records(), 3);
    assert_eq!(replayed, 3);
}

#[test]
fn trailing_garbage_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage_tail.cache");

    let mut cache = DiskCache::open(&path, KEY_SIZE, |_, _| {}).unwrap();
    cache.append(&key(7), b"payload").unwrap();
    cache.sync().unwrap();
    drop(cache);

    let clean_len = fs::metadata(&path).unwrap().len();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0xAB; 9]).unwrap();
    drop(file);

    let mut replayed = 0;
    let cache = DiskCache::open(&path, KEY_SIZE, |_, _| replayed += 1).unwrap();
    assert_eq!(cache.records(), 1);
    assert_eq!(replayed, 1);
    drop(cache);
    assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);
}

#[test]
fn unknown_layout_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alien.cache");
    fs::write(&path, b"this is definitely not a shader cache file").unwrap();

    let cache = DiskCache::open(&path, KEY_SIZE, |_, _| panic!("alien records must be dropped")).unwrap();
    assert_eq!(cache.records(), 0);
    drop(cache);
    assert_eq!(fs::metadata(&path).unwrap().len(), 12);
}

#[test]
fn key_size_change_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resized.cache");

    let mut cache = DiskCache::open(&path, KEY_SIZE, |_, _| {}).unwrap();
    cache.append(&key(1), b"old era").unwrap();
    cache.sync().unwrap();
    drop(cache);

    let cache = DiskCache::open(&path, KEY_SIZE * 2, |_, _| panic!("mismatched keys must not replay"))
        .unwrap();
    assert_eq!(cache.records(), 0);
}

// ============================================================================
// Round trip through the shader cache
// ============================================================================

#[test]
fn reopened_cache_serves_identical_bytecode_without_recompiling() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = default_config();
    config.cache_dir = Some(dir.path().to_path_buf());

    let variants: Vec<u64> = vec![0x11, 0x22, 0x33, 0x44, 0x55];
    let mut originals = Vec::new();

    {
        let h = harness_with(CountingBackend::instant(), &config);
        let mut client = h.cache.client(Role::Authoritative);
        for &bits in &variants {
            client.prepare(&TestState::new(bits));
            assert_eq!(client.wait_ready(WaitMode::Block), ShaderStatus::Ready);
            originals.push(client.bytecode().unwrap().to_vec());
        }
        h.cache.shutdown();
    }

    let h = harness_with(CountingBackend::instant(), &config);
    assert_eq!(h.cache.stats().loaded_from_disk, variants.len() as u64);
    assert_eq!(h.cache.entry_count(), variants.len());

    let mut client = h.cache.client(Role::Authoritative);
    for (index, &bits) in variants.iter().enumerate() {
        client.prepare(&TestState::new(bits));
        assert_eq!(
            client.wait_ready(WaitMode::Poll),
            ShaderStatus::Ready,
            "hydrated entries are ready without waiting"
        );
        assert_eq!(client.bytecode().unwrap(), originals[index].as_slice());
    }

    assert_eq!(h.compiles(), 0, "replay must not invoke the compiler");
    assert_eq!(h.generates(), 0, "replay must not invoke the generator");
}

#[test]
fn append_survives_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = default_config();
    config.cache_dir = Some(dir.path().to_path_buf());

    {
        let h = harness_with(CountingBackend::instant(), &config);
        let mut client = h.cache.client(Role::Authoritative);
        client.prepare(&TestState::new(1));
        assert_eq!(client.wait_ready(WaitMode::Block), ShaderStatus::Ready);
        h.cache.shutdown();
    }
    {
        let h = harness_with(CountingBackend::instant(), &config);
        let mut client = h.cache.client(Role::Authoritative);
        client.prepare(&TestState::new(2));
        assert_eq!(client.wait_ready(WaitMode::Block), ShaderStatus::Ready);
        assert_eq!(h.compiles(), 1, "only the new variant compiles");
        h.cache.shutdown();
    }

    let h = harness_with(CountingBackend::instant(), &config);
    assert_eq!(h.cache.stats().loaded_from_disk, 2);
}

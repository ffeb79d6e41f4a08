// ABOUTME: Integration tests for the content cache and the transfer ledger.
// ABOUTME: Property tests for cache validity plus persistence and corruption handling.

use outrider::store::{ContentCache, StateDir, TransferLedger};
use outrider::types::ImageName;
use proptest::prelude::*;
use std::fs;

fn images(names: &[&str]) -> Vec<ImageName> {
    names.iter().map(|n| ImageName::parse(n).unwrap()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any content is valid right after update and invalid once a byte changes.
    #[test]
    fn changed_content_is_never_valid(
        content in proptest::collection::vec(any::<u8>(), 1..4096),
        flip in any::<prop::sample::Index>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("images.tar");
        let set = images(&["app:1", "db:2"]);
        fs::write(&archive, &content).unwrap();

        let mut cache = ContentCache::open(&dir.path().join("cache"));
        cache.update(&archive, &set).unwrap();
        prop_assert!(cache.is_valid(&archive, &set));

        let mut changed = content.clone();
        let i = flip.index(changed.len());
        changed[i] ^= 0xff;
        fs::write(&archive, &changed).unwrap();
        prop_assert!(!cache.is_valid(&archive, &set));
    }

    /// The key depends on the image set, not on its order or duplicates.
    #[test]
    fn key_is_order_insensitive(mut names in proptest::collection::vec("[a-z]{1,8}:[0-9]{1,3}", 1..6)) {
        let path = std::path::Path::new("/tmp/images.tar");
        let forward = ContentCache::cache_key(&images(&names.iter().map(String::as_str).collect::<Vec<_>>()), path);
        names.reverse();
        names.push(names[0].clone());
        let reversed = ContentCache::cache_key(&images(&names.iter().map(String::as_str).collect::<Vec<_>>()), path);
        prop_assert_eq!(forward, reversed);
    }

    /// Recorded percentage stays within 0..=100.
    #[test]
    fn ledger_percentage_bounded(total in 1u64..1_000_000, frac in 0.0f64..=1.0) {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("images.tar");
        fs::write(&archive, b"x").unwrap();
        let sent = (total as f64 * frac) as u64;

        let mut ledger = TransferLedger::open(&dir.path().join("resume"));
        ledger.save_progress(&archive, "edge-1", "/tmp/images.tar", sent, total).unwrap();
        let entry = ledger.get_progress(&archive, "edge-1", "/tmp/images.tar").unwrap();
        prop_assert!((0.0..=100.0).contains(&entry.percentage));
    }
}

/// Test: Cache written by one handle, read by a fresh one.
/// Expected: The entry survives on disk.
#[test]
fn cache_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateDir::new(dir.path());
    let archive = dir.path().join("images.tar");
    fs::write(&archive, b"layers").unwrap();
    let set = images(&["app:1"]);

    state.open_cache().update(&archive, &set).unwrap();

    assert!(state.open_cache().is_valid(&archive, &set));
    assert!(state.cache_dir().join("metadata.json").exists());
}

/// Test: Cache metadata is not valid JSON.
/// Expected: Everything reads as a miss, and the next update repairs it.
#[test]
fn corrupt_cache_degrades_to_miss() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateDir::new(dir.path());
    fs::create_dir_all(state.cache_dir()).unwrap();
    fs::write(state.cache_dir().join("metadata.json"), b"{ not json").unwrap();

    let archive = dir.path().join("images.tar");
    fs::write(&archive, b"layers").unwrap();
    let set = images(&["app:1"]);

    let mut cache = state.open_cache();
    assert!(!cache.is_valid(&archive, &set));
    cache.update(&archive, &set).unwrap();
    assert!(state.open_cache().is_valid(&archive, &set));
}

/// Test: Ledger progress recorded, then the archive is repackaged.
/// Expected: The stale entry is ignored and removed from disk.
#[test]
fn ledger_drops_entry_for_changed_archive() {
    let dir = tempfile::tempdir().unwrap();
    let state = StateDir::new(dir.path());
    let archive = dir.path().join("images.tar");
    fs::write(&archive, vec![0u8; 100]).unwrap();

    state
        .open_ledger()
        .save_progress(&archive, "edge-1", "/tmp/images.tar", 40, 100)
        .unwrap();
    let entry = state
        .open_ledger()
        .get_progress(&archive, "edge-1", "/tmp/images.tar")
        .unwrap();
    assert_eq!(entry.percentage, 40.0);
    assert!(!entry.is_complete());

    fs::write(&archive, vec![0u8; 120]).unwrap();
    assert!(
        state
            .open_ledger()
            .get_progress(&archive, "edge-1", "/tmp/images.tar")
            .is_none()
    );
    assert_eq!(state.open_ledger().stats().entries.len(), 0);
}

/// Test: Ledger entries for different hosts and paths.
/// Expected: Each is tracked separately.
#[test]
fn ledger_keys_by_host_and_remote_path() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("images.tar");
    fs::write(&archive, vec![0u8; 10]).unwrap();

    let mut ledger = TransferLedger::open(&dir.path().join("resume"));
    ledger.save_progress(&archive, "a", "/tmp/x.tar", 10, 10).unwrap();
    ledger.save_progress(&archive, "b", "/tmp/x.tar", 5, 10).unwrap();
    ledger.save_progress(&archive, "a", "/srv/x.tar", 0, 10).unwrap();

    let stats = ledger.stats();
    assert_eq!(stats.entries.len(), 3);
    assert_eq!(stats.completed_transfers, 1);
    assert_eq!(stats.pending_transfers, 2);

    ledger.clear_progress(&archive, "b", "/tmp/x.tar").unwrap();
    assert!(ledger.get_progress(&archive, "b", "/tmp/x.tar").is_none());
}

/// End-to-end key ring lifecycle driven through simulated time.
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use iidj_keys::{
    DiskKeyManager, KeyError, KeyManager, KeyManagerConfig, KeyStore, KeyType, ManualClock, Slot,
    TickOutcome,
};
use tempfile::TempDir;

const PERIOD_HOURS: u64 = 720;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn config(tmp: &TempDir, key_type: KeyType, interval: StdDuration) -> KeyManagerConfig {
    KeyManagerConfig::new(
        key_type,
        tmp.path().join("keys.json"),
        StdDuration::from_secs(PERIOD_HOURS * 3600),
        interval,
    )
}

fn manager(tmp: &TempDir, clock: &Arc<ManualClock>) -> DiskKeyManager {
    DiskKeyManager::new(config(tmp, KeyType::EcP384, StdDuration::from_secs(5)))
        .unwrap()
        .with_clock(clock.clone())
}

#[test]
fn full_rotation_cycle() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = manager(&tmp, &clock);
    m.load_or_bootstrap().unwrap();

    // Bootstrap: slot A signs, slot B empty.
    let (first_id, _) = m.get_private_key().unwrap();
    let ring = m.ring().unwrap();
    assert_eq!(ring.current_slot(), Slot::A);
    assert_eq!(ring.get(Slot::A).unwrap().id, first_id);
    assert!(ring.get(Slot::B).is_none());
    let keys = m.get_public_keys().unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys.contains_key(&first_id));

    // Just before half-life: nothing happens.
    let outcome = m.rotate_tick(t0() + Duration::hours(360) - Duration::seconds(1)).unwrap();
    assert_eq!(outcome, TickOutcome::default());

    // Just past half-life: slot B is prepared, A still signs.
    let outcome = m.rotate_tick(t0() + Duration::hours(361)).unwrap();
    assert!(outcome.prepared);
    assert!(!outcome.rotated);
    let prepared = m.ring().unwrap();
    let second = prepared.get(Slot::B).unwrap().clone();
    assert_eq!(second.issued_at, t0() + Duration::hours(361));
    assert_eq!(second.expires_at, second.issued_at + Duration::hours(720));
    assert_eq!(m.get_private_key().unwrap().0, first_id);
    assert_eq!(m.get_public_keys().unwrap().len(), 2);

    // Later ticks before the rotate threshold do not regenerate B.
    let outcome = m.rotate_tick(t0() + Duration::hours(500)).unwrap();
    assert_eq!(outcome, TickOutcome::default());
    assert_eq!(m.ring().unwrap(), prepared);

    // Past five sixths: designators swap, no key bytes change.
    let outcome = m.rotate_tick(t0() + Duration::hours(600) + Duration::seconds(1)).unwrap();
    assert!(!outcome.prepared);
    assert!(outcome.rotated);
    let rotated = m.ring().unwrap();
    assert_eq!(rotated.current_slot(), Slot::B);
    assert_eq!(rotated.get(Slot::A), prepared.get(Slot::A));
    assert_eq!(rotated.get(Slot::B), prepared.get(Slot::B));
    assert_eq!(m.get_private_key().unwrap().0, second.id);
    let keys = m.get_public_keys().unwrap();
    assert!(keys.contains_key(&first_id));
    assert!(keys.contains_key(&second.id));

    // At the new key's half-life the retired key in A is overwritten.
    let outcome = m.rotate_tick(second.issued_at + Duration::hours(361)).unwrap();
    assert!(outcome.prepared);
    assert!(!outcome.rotated);
    let keys = m.get_public_keys().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(!keys.contains_key(&first_id));
    assert!(keys.contains_key(&second.id));
    assert_eq!(m.get_private_key().unwrap().0, second.id);
}

#[test]
fn each_change_is_persisted() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = manager(&tmp, &clock);
    m.load_or_bootstrap().unwrap();
    let store = KeyStore::new(tmp.path().join("keys.json"));

    let prepared_at = t0() + Duration::hours(361);
    m.rotate_tick(prepared_at).unwrap();
    let on_disk = store.load(prepared_at).unwrap().unwrap();
    assert_eq!(on_disk, m.ring().unwrap());
    assert_eq!(on_disk.current_slot(), Slot::A);

    let rotated_at = t0() + Duration::hours(601);
    m.rotate_tick(rotated_at).unwrap();
    let on_disk = store.load(rotated_at).unwrap().unwrap();
    assert_eq!(on_disk, m.ring().unwrap());
    assert_eq!(on_disk.current_slot(), Slot::B);
}

#[test]
fn restart_resumes_from_disk() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let first = manager(&tmp, &clock);
    first.load_or_bootstrap().unwrap();
    first.rotate_tick(t0() + Duration::hours(361)).unwrap();
    first.rotate_tick(t0() + Duration::hours(601)).unwrap();
    let expected = first.ring().unwrap();
    drop(first);

    clock.set(t0() + Duration::hours(602));
    let second = manager(&tmp, &clock);
    second.load_or_bootstrap().unwrap();
    assert_eq!(second.ring().unwrap(), expected);
    assert_eq!(second.current_slot().unwrap(), Slot::B);
}

#[test]
fn restart_between_prepare_and_rotate_keeps_signing_key() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let first = manager(&tmp, &clock);
    first.load_or_bootstrap().unwrap();
    first.rotate_tick(t0() + Duration::hours(361)).unwrap();
    let (signing_id, _) = first.get_private_key().unwrap();
    let expected = first.ring().unwrap();
    drop(first);

    clock.set(t0() + Duration::hours(400));
    let second = manager(&tmp, &clock);
    second.load_or_bootstrap().unwrap();
    assert_eq!(second.ring().unwrap(), expected);
    assert_eq!(second.current_slot().unwrap(), Slot::A);
    assert_eq!(second.get_private_key().unwrap().0, signing_id);

    // The successor still activates on schedule.
    let outcome = second.rotate_tick(t0() + Duration::hours(601)).unwrap();
    assert_eq!(
        outcome,
        TickOutcome {
            prepared: false,
            rotated: true
        }
    );
    assert_eq!(second.current_slot().unwrap(), Slot::B);
}

#[test]
fn readers_see_consistent_keys_while_rotating() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = manager(&tmp, &clock);
    m.load_or_bootstrap().unwrap();
    let store = KeyStore::new(tmp.path().join("keys.json"));
    let (first_id, _) = m.get_private_key().unwrap();

    let done = &AtomicBool::new(false);
    let started = &Barrier::new(5);
    let reader_manager = &m;
    let (signing_ids, published_ids) = std::thread::scope(|s| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(move || {
                    let m = reader_manager;
                    let mut signing = BTreeSet::new();
                    let mut published = BTreeSet::new();
                    started.wait();
                    loop {
                        let (id, key) = m.get_private_key().unwrap();
                        let keys = m.get_public_keys().unwrap();
                        assert!(!keys.is_empty());
                        assert!(keys.len() <= 2);
                        if let Some(public) = keys.get(&id) {
                            assert_eq!(public, &key.public_key());
                        }
                        signing.insert(id);
                        published.extend(keys.into_keys());
                        if done.load(Ordering::Acquire) {
                            break;
                        }
                    }
                    (signing, published)
                })
            })
            .collect();
        started.wait();

        let steps = [
            t0() + Duration::hours(361),
            t0() + Duration::hours(601),
            t0() + Duration::hours(361 + 361),
            t0() + Duration::hours(361 + 601),
        ];
        for now in steps {
            m.rotate_tick(now).unwrap();
            m.write_entry().unwrap();
            assert_eq!(store.load(now).unwrap().unwrap(), m.ring().unwrap());
            std::thread::sleep(StdDuration::from_millis(5));
        }
        done.store(true, Ordering::Release);

        readers.into_iter().fold(
            (BTreeSet::new(), BTreeSet::new()),
            |(mut signing, mut published), reader| {
                let (seen_signing, seen_published) = reader.join().unwrap();
                signing.extend(seen_signing);
                published.extend(seen_published);
                (signing, published)
            },
        )
    });

    // Every key a reader saw was issued by one of the rotation steps.
    let final_ring = m.ring().unwrap();
    let mut issued: BTreeSet<String> = final_ring.key_pairs().map(|k| k.id.clone()).collect();
    issued.insert(first_id.clone());
    assert_eq!(issued.len(), 3);
    assert!(!signing_ids.is_empty());
    assert!(signing_ids.is_subset(&issued));
    assert!(published_ids.is_subset(&issued));
}

#[test]
fn long_downtime_prepares_and_rotates_in_one_tick() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = manager(&tmp, &clock);
    m.load_or_bootstrap().unwrap();
    let (old_id, _) = m.get_private_key().unwrap();

    let late = t0() + Duration::hours(1000);
    let outcome = m.rotate_tick(late).unwrap();
    assert!(outcome.prepared);
    assert!(outcome.rotated);

    let ring = m.ring().unwrap();
    assert_eq!(ring.current().issued_at, late);
    assert_ne!(ring.current().id, old_id);

    // The fresh key is not touched again on the next tick.
    assert_eq!(m.rotate_tick(late + Duration::seconds(5)).unwrap(), TickOutcome::default());
}

#[test]
fn unspecified_key_type_is_rejected_without_side_effects() {
    let tmp = TempDir::new().unwrap();
    let result = DiskKeyManager::new(config(&tmp, KeyType::Unspecified, StdDuration::from_secs(5)));
    assert!(matches!(result, Err(KeyError::UnsupportedKeyType(_))));
    assert!(!tmp.path().join("keys.json").exists());
}

#[test]
fn key_type_mismatch_fails_on_load() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    manager(&tmp, &clock).load_or_bootstrap().unwrap();

    let other = DiskKeyManager::new(config(&tmp, KeyType::EcP256, StdDuration::from_secs(5)))
        .unwrap()
        .with_clock(clock.clone());
    assert!(matches!(other.load_or_bootstrap(), Err(KeyError::Decode(_))));
}

#[test]
fn rsa_ring_bootstraps_and_decodes() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = DiskKeyManager::new(config(&tmp, KeyType::Rsa2048, StdDuration::from_secs(5)))
        .unwrap()
        .with_clock(clock.clone());
    m.load_or_bootstrap().unwrap();

    let (id, key) = m.get_private_key().unwrap();
    let keys = m.get_public_keys().unwrap();
    assert_eq!(keys.get(&id), Some(&key.public_key()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_prepares_in_background_and_stops() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = Arc::new(
        DiskKeyManager::new(config(&tmp, KeyType::EcP256, StdDuration::from_millis(20)))
            .unwrap()
            .with_clock(clock.clone()),
    );
    m.initialize().unwrap();
    assert!(m.is_rotating());
    assert!(matches!(m.initialize(), Err(KeyError::AlreadyInitialized)));

    clock.advance(Duration::hours(361));
    let mut populated = false;
    for _ in 0..250 {
        if m.get_public_keys().unwrap().len() == 2 {
            populated = true;
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(20)).await;
    }
    assert!(populated, "scheduler never prepared slot B");
    assert_eq!(m.current_slot().unwrap(), Slot::A);

    m.stop().await;
    assert!(!m.is_rotating());

    // Stopped: crossing the rotate threshold no longer swaps anything.
    clock.advance(Duration::hours(300));
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(m.current_slot().unwrap(), Slot::A);
}

#[test]
fn initialize_requires_runtime() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let m = Arc::new(manager(&tmp, &clock));
    assert!(matches!(m.initialize(), Err(KeyError::Config(_))));
}

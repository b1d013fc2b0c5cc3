//! Integration tests for the response cache public interface.
//!
//! These exercise the SQLite store through a real database file, including
//! concurrent writers sharing one store and writers on separate connections.

use chrono::Utc;
use plantitas_cache::{
    CacheLookup, CachePolicy, CachePolicyConfig, CacheStore, QueryNormalizer, ResponseCache,
    SqliteCacheStore,
};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_env() -> (TempDir, Arc<SqliteCacheStore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteCacheStore::new(temp_dir.path().join("cache.sqlite"))
        .expect("Failed to open cache");
    (temp_dir, Arc::new(store))
}

#[test]
fn test_store_does_not_count_as_hit() {
    let (_temp, store) = create_test_env();

    store
        .store("Why are my leaves yellow?", Some("pothos"), "Answer A", None)
        .unwrap();

    let hash = QueryNormalizer::hash("Why are my leaves yellow?", Some("pothos"));
    let entry = store.lookup(&hash).unwrap().expect("entry should exist");
    assert_eq!(entry.hit_count, 0);
    assert_eq!(entry.answer, "Answer A");
    assert_eq!(entry.query_hash, hash);
}

#[test]
fn test_control_character_in_question_gets_its_own_row() {
    let (_temp, store) = create_test_env();

    let pothos = store
        .store("water", Some("pothos\u{1f}"), "pothos answer", None)
        .unwrap();
    let other = store
        .store("water\u{1f}pothos", None, "other answer", None)
        .unwrap();

    assert_ne!(pothos.query_hash, other.query_hash);
    assert_ne!(pothos.id, other.id);
    assert_eq!(other.answer, "other answer");
    assert_eq!(other.question, "water\u{1f}pothos");
    assert_eq!(store.stats().unwrap().total_entries, 2);
}

#[test]
fn test_record_hit_increments_by_exactly_one() {
    let (_temp, store) = create_test_env();
    let entry = store.store("Brown tips?", Some("calathea"), "Humidity.", None).unwrap();

    let before = store.lookup(&entry.query_hash).unwrap().unwrap();
    let after = store.record_hit(&entry.query_hash, 7).unwrap().unwrap();

    assert_eq!(after.hit_count, before.hit_count + 1);
    assert_eq!(after.tokens_saved, before.tokens_saved + 7);
    assert!(after.last_used_at >= before.last_used_at);
}

#[test]
fn test_expired_entry_is_invalid_and_purged() {
    let (_temp, store) = create_test_env();
    let entry = store
        .store("Drooping?", Some("peace lily"), "Water it.", Some(Duration::from_secs(1)))
        .unwrap();

    let later = Utc::now() + chrono::Duration::seconds(5);
    assert!(!CachePolicy::is_valid(&entry, later));

    assert_eq!(store.purge_expired_at(later).unwrap(), 1);
    assert!(store.lookup(&entry.query_hash).unwrap().is_none());
}

#[test]
fn test_permanent_entry_is_valid_far_in_the_future() {
    let (_temp, store) = create_test_env();
    let entry = store.store("Toxic to cats?", Some("lily"), "Yes.", None).unwrap();

    assert_eq!(entry.expires_at, None);
    let far_future = Utc::now() + chrono::Duration::days(365 * 1000);
    assert!(CachePolicy::is_valid(&entry, far_future));
}

#[test]
fn test_concurrent_identical_stores_yield_one_row() {
    let (_temp, store) = create_test_env();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.store(
                    "Why are my leaves yellow?",
                    Some("pothos"),
                    &format!("Answer from worker {}", i),
                    None,
                )
            })
        })
        .collect();

    let entries: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("store must not fail on duplicates"))
        .collect();

    let first_id = entries[0].id;
    assert!(entries.iter().all(|e| e.id == first_id));
    assert!(entries.iter().all(|e| e.answer == entries[0].answer));
    assert_eq!(store.stats().unwrap().total_entries, 1);
}

#[test]
fn test_concurrent_stores_across_connections_yield_one_row() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("shared.sqlite");
    // Create the schema up front so workers only race on the insert.
    SqliteCacheStore::new(&db_path).unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let db_path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = SqliteCacheStore::new(&db_path).unwrap();
                barrier.wait();
                store.store("Leggy stems?", Some("pothos"), &format!("answer {}", i), None)
            })
        })
        .collect();

    let ids: Vec<i64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap().id)
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    let store = SqliteCacheStore::new(&db_path).unwrap();
    assert_eq!(store.stats().unwrap().total_entries, 1);
}

#[test]
fn test_concurrent_hits_are_not_lost() {
    let (_temp, store) = create_test_env();
    let entry = store.store("Sunburn?", Some("aloe"), "Move to shade.", None).unwrap();

    let threads = 8;
    let hits_per_thread = 25;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let hash = entry.query_hash.clone();
            thread::spawn(move || {
                for _ in 0..hits_per_thread {
                    store.record_hit(&hash, 3).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let entry = store.lookup(&entry.query_hash).unwrap().unwrap();
    assert_eq!(entry.hit_count, (threads * hits_per_thread) as u64);
    assert_eq!(entry.tokens_saved, (threads * hits_per_thread * 3) as u64);
}

#[test]
fn test_concurrent_hits_across_connections_are_not_lost() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("shared.sqlite");
    let hash = SqliteCacheStore::new(&db_path)
        .unwrap()
        .store("Yellow spots?", Some("monstera"), "Check for thrips.", None)
        .unwrap()
        .query_hash;

    let threads = 4;
    let hits_per_thread = 20;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let db_path = db_path.clone();
            let hash = hash.clone();
            thread::spawn(move || {
                let store = SqliteCacheStore::new(&db_path).unwrap();
                for _ in 0..hits_per_thread {
                    store.record_hit(&hash, 1).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let store = SqliteCacheStore::new(&db_path).unwrap();
    let entry = store.lookup(&hash).unwrap().unwrap();
    assert_eq!(entry.hit_count, (threads * hits_per_thread) as u64);
}

#[test]
fn test_purge_concurrent_with_lookups() {
    let (_temp, store) = create_test_env();
    for i in 0..50 {
        store
            .store(&format!("question {}", i), None, "answer", Some(Duration::ZERO))
            .unwrap();
    }

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..50 {
                let hash = QueryNormalizer::hash(&format!("question {}", i), None);
                // Either still there or already purged; never an error.
                store.lookup(&hash).unwrap();
                store.record_hit(&hash, 1).unwrap();
            }
        })
    };
    let purged = store.purge_expired().unwrap();
    reader.join().unwrap();

    assert!(purged <= 50);
    store.purge_expired().unwrap();
    assert_eq!(store.stats().unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_read_through_flow() {
    let (_temp, store) = create_test_env();
    let policy = CachePolicy::new(
        CachePolicyConfig::default().with_category("species", None),
    );
    let cache = ResponseCache::new(store.clone(), policy);

    let (answer, hit) = cache
        .get_or_generate("What plant is this?", Some("leaf photo 42"), Some("species"), || async {
            Ok::<_, std::io::Error>("Epipremnum aureum".to_string())
        })
        .await
        .unwrap();
    assert_eq!(answer, "Epipremnum aureum");
    assert!(!hit);

    match cache.lookup("what plant is this?", Some("Leaf photo 42")) {
        CacheLookup::Hit { answer, entry } => {
            assert_eq!(answer, "Epipremnum aureum");
            assert_eq!(entry.hit_count, 1);
            assert_eq!(entry.expires_at, None);
            assert!(entry.tokens_saved > 0);
        }
        CacheLookup::Miss => panic!("expected a cache hit"),
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_hits, 1);
}

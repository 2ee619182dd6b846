//! Integration tests covering the atomic-write and file-lock primitives
//! together, the way a persistence manager would actually use them.

use repo_core::io::{acquire_lock, write_atomic};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[test]
fn write_atomic_never_leaves_a_partial_file_visible() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("state.json");

    write_atomic(&target, b"{\"revision\":1}").unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"{\"revision\":1}");

    write_atomic(&target, b"{\"revision\":2}").unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"{\"revision\":2}");

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "state.json")
        .collect();
    assert!(leftovers.is_empty(), "no temp file should remain after a successful write");
}

#[test]
fn only_one_thread_holds_the_lock_at_a_time() {
    let dir = TempDir::new().unwrap();
    let lock_path = dir.path().join("repository.lock");
    let barrier = Arc::new(Barrier::new(4));
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock_path = lock_path.clone();
            let barrier = Arc::clone(&barrier);
            let counter = Arc::clone(&counter);
            let max_seen = Arc::clone(&max_seen);
            thread::spawn(move || {
                barrier.wait();
                let _guard = acquire_lock(&lock_path, 20).unwrap();
                let now = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
                thread::sleep(std::time::Duration::from_millis(10));
                counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(max_seen.load(std::sync::atomic::Ordering::SeqCst), 1);
}

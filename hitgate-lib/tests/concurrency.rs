use hitgate_lib::admission::{
    AHashProvider, AdmissionConfig, AdmissionService, ConcurrentHashCounter, ConditionalQueue,
    Counter, ExpiryRecord, TwoLockQueue,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_counter_no_lost_updates() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let counter = Arc::new(ConcurrentHashCounter::new(AHashProvider::<str>::new()));
    let concurrency = 10_000;

    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let counter = Arc::clone(&counter);
        handles.push(tokio::spawn(async move { counter.report("google.com").0 }));
    }

    let mut previous = Vec::with_capacity(concurrency);
    for handle in handles {
        previous.push(handle.await?);
    }

    let (_, fingerprint) = counter.report("google.com");
    assert_eq!(counter.count(fingerprint), Some(concurrency as u64 + 1));

    // every report observed a distinct previous count
    previous.sort_unstable();
    let expected: Vec<u64> = (0..concurrency as u64).collect();
    assert_eq!(previous, expected);
    Ok(())
}

#[test]
fn test_counter_disjoint_keys_under_contention() {
    let counter = ConcurrentHashCounter::new(AHashProvider::<str>::new());
    let keys: Vec<String> = (0..64).map(|i| format!("key-{i}")).collect();

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..100 {
                    for key in &keys {
                        counter.report(key.as_str());
                    }
                }
            });
        }
    });

    assert_eq!(counter.len(), keys.len());
    for key in &keys {
        let (previous, _) = counter.report(key.as_str());
        assert_eq!(previous, 800, "key {key} lost updates");
    }
}

#[test]
fn test_queue_concurrent_producers_and_consumer() {
    let queue = TwoLockQueue::new();
    let producers = 8;
    let per_producer = 5_000;
    let consumed = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for p in 0..producers {
            let queue = &queue;
            let done = &done;
            s.spawn(move || {
                for i in 0..per_producer {
                    queue.enqueue((p, i));
                }
                done.fetch_add(1, Ordering::AcqRel);
            });
        }

        s.spawn(|| {
            let mut last_seen = vec![None; producers];
            loop {
                match queue.dequeue_if(&mut |_| true) {
                    Some((p, i)) => {
                        // per-producer order is preserved
                        if let Some(prev) = last_seen[p] {
                            assert!(i > prev, "producer {p} out of order: {i} after {prev}");
                        }
                        last_seen[p] = Some(i);
                        consumed.fetch_add(1, Ordering::AcqRel);
                    }
                    None if done.load(Ordering::Acquire) == producers && queue.is_empty() => break,
                    None => std::thread::yield_now(),
                }
            }
        });
    });

    assert_eq!(consumed.load(Ordering::Acquire), producers * per_producer);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_single_element_boundary() {
    let queue = TwoLockQueue::new();
    let rounds = 20_000;
    let popped = AtomicUsize::new(0);

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..rounds {
                queue.enqueue(i);
            }
        });
        s.spawn(|| {
            let mut expected = 0;
            while expected < rounds {
                if let Some(v) = queue.dequeue_if(&mut |_| true) {
                    assert_eq!(v, expected);
                    expected += 1;
                    popped.fetch_add(1, Ordering::AcqRel);
                }
            }
        });
    });

    assert_eq!(popped.load(Ordering::Acquire), rounds);
    assert_eq!(queue.len(), 0);
}

#[test]
fn test_queue_drain_with_enqueues_in_flight() {
    let queue = TwoLockQueue::new();
    for i in 0..1_000 {
        queue.enqueue(ExpiryRecord::new(i));
    }

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 1_000..2_000 {
                queue.enqueue(ExpiryRecord::new(i));
            }
        });
        s.spawn(|| queue.drain());
    });

    // whatever was enqueued after the drain observed an empty queue is still there
    queue.drain();
    assert!(queue.is_empty());
    assert_eq!(queue.dequeue_if(&mut |_| true), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_handle_from_many_tasks() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let threshold = 100;
    let service = Arc::new(AdmissionService::with_defaults(AdmissionConfig::new(
        threshold,
        Duration::from_secs(60),
    )));
    service.start()?;

    let mut handles = Vec::new();
    for _ in 0..1_000 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.handle("hot-key") }));
    }

    let mut allowed = 0u64;
    for handle in handles {
        if !handle.await? {
            allowed += 1;
        }
    }

    assert_eq!(allowed, threshold, "exactly `threshold` reports fit in the window");
    assert_eq!(service.pending_expiries(), 1);

    service.stop().await;
    Ok(())
}

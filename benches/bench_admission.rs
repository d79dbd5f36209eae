//! Micro benchmarks for the admission hot path.
//! Pure CPU - no network, no sweep workers.
//!
//! ```bash
//! cargo bench --bench bench_admission
//! ```

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use hitgate_lib::admission::{
    AHashProvider, AdmissionConfig, AdmissionService, ConditionalQueue, ExpiryRecord, HashProvider,
    TwoLockQueue,
};

const KEY_SPACE: usize = 10_000;

fn bench_hash(c: &mut Criterion) {
    let provider = AHashProvider::<str>::new();
    c.bench_function("hash_url", |b| {
        b.iter(|| provider.get(std::hint::black_box("https://example.com/some/path?q=1")));
    });
}

fn bench_handle(c: &mut Criterion) {
    let service: AdmissionService<str> =
        AdmissionService::with_defaults(AdmissionConfig::new(u64::MAX, Duration::from_secs(60)));
    c.bench_function("handle_hot_key", |b| {
        b.iter(|| service.handle(std::hint::black_box("google.com")));
    });

    let keys: Vec<String> = (0..KEY_SPACE).map(|i| format!("host-{i}.example.com")).collect();
    c.bench_function("handle_cold_keys", |b| {
        b.iter_batched(
            || AdmissionService::<str>::with_defaults(AdmissionConfig::new(1, Duration::from_secs(60))),
            |service| {
                for key in &keys {
                    std::hint::black_box(service.handle(key));
                }
                service
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_queue(c: &mut Criterion) {
    let queue = TwoLockQueue::new();
    c.bench_function("queue_enqueue_dequeue", |b| {
        b.iter(|| {
            queue.enqueue(ExpiryRecord::new(std::hint::black_box(42)));
            queue.dequeue_if(&mut |_| true)
        });
    });
}

criterion_group!(admission_benches, bench_hash, bench_handle, bench_queue);
criterion_main!(admission_benches);

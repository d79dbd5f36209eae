use hitgate_lib::admission::{
    AHashProvider, AdmissionConfig, AdmissionService, ConcurrentHashCounter, Fingerprint,
    HashProvider, TwoLockQueue, Utf8Bytes,
};
use std::time::Duration;

/// Maps every key to the same fingerprint.
struct ConstantHash(Fingerprint);

impl HashProvider<str> for ConstantHash {
    fn get(&self, _key: &str) -> Fingerprint {
        self.0
    }
}

fn service(threshold: u64, window: Duration) -> AdmissionService<str> {
    AdmissionService::with_defaults(
        AdmissionConfig::new(threshold, window)
            .with_workers(3)
            .with_sweep_interval(Duration::from_millis(10)),
    )
}

#[tokio::test]
async fn test_blocks_after_threshold_and_recovers_after_window(
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(3, Duration::from_millis(100));
    service.start()?;

    let decisions: Vec<bool> = (0..5).map(|_| service.handle("a")).collect();
    assert_eq!(decisions, vec![false, false, false, true, true]);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(!service.handle("a"), "key should be forgotten once its window elapsed");
    assert_eq!(service.tracked_keys(), 1);

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_threshold_one() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(1, Duration::from_secs(60));
    service.start()?;

    assert!(!service.handle("https://example.com"));
    assert!(service.handle("https://example.com"));
    assert!(!service.handle("https://example.org"), "other keys are independent");

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_first_threshold_reports_allowed() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let threshold = 10;
    let service = service(threshold, Duration::from_secs(60));
    service.start()?;

    for i in 0..threshold {
        assert!(!service.handle("key"), "report {} should be allowed", i);
    }
    for i in 0..5 {
        assert!(service.handle("key"), "report {} past the threshold should be blocked", i);
    }

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_one_expiry_record_per_first_occurrence(
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(100, Duration::from_secs(60));
    service.start()?;

    for _ in 0..20 {
        service.handle("a");
        service.handle("b");
    }
    assert_eq!(service.tracked_keys(), 2);
    assert_eq!(service.pending_expiries(), 2);

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_blocked_report_has_no_side_effects(
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(1, Duration::from_secs(60));
    service.start()?;

    service.handle("a");
    for _ in 0..10 {
        assert!(service.handle("a"));
    }
    assert_eq!(service.pending_expiries(), 1);

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_colliding_keys_share_a_count() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let service: AdmissionService<str> = AdmissionService::new(
        AdmissionConfig::new(2, Duration::from_secs(60)),
        ConcurrentHashCounter::new(ConstantHash(7)),
        TwoLockQueue::new(),
    );
    service.start()?;

    assert!(!service.handle("key-a"));
    assert!(!service.handle("key-b"));
    assert!(service.handle("key-a"), "key-a and key-b share one counter");
    assert_eq!(service.tracked_keys(), 1);
    assert_eq!(service.pending_expiries(), 1);

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_unencodable_keys_share_sentinel() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let service: AdmissionService<[u8]> = AdmissionService::new(
        AdmissionConfig::new(2, Duration::from_secs(60)),
        ConcurrentHashCounter::new(AHashProvider::<[u8], _>::with_encoder(Utf8Bytes)),
        TwoLockQueue::new(),
    );
    service.start()?;

    assert!(!service.handle(&[0xff][..]));
    assert!(!service.handle(&[0xc3, 0x28][..]));
    assert!(service.handle(&[0xfe, 0xfe][..]), "invalid keys degrade to one shared slot");
    assert!(!service.handle(b"valid".as_slice()));

    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_no_expiry_without_start() {
    let service = service(1, Duration::from_millis(20));

    assert!(!service.handle("a"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.handle("a"), "nothing sweeps before start");
    assert_eq!(service.pending_expiries(), 1);
}

#[tokio::test]
async fn test_stop_drains_state() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(5, Duration::from_secs(60));
    service.start()?;
    assert!(service.is_running());

    for i in 0..50 {
        service.handle(&format!("https://example.com/{i}"));
    }
    assert_eq!(service.tracked_keys(), 50);
    assert_eq!(service.pending_expiries(), 50);

    service.stop().await;
    assert!(!service.is_running());
    assert_eq!(service.tracked_keys(), 0);
    assert_eq!(service.pending_expiries(), 0);

    // stopping again is harmless
    service.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_start_twice_is_noop() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(1, Duration::from_secs(1));
    service.start()?;
    service.start()?;
    assert!(service.is_running());
    service.stop().await;

    service.start()?;
    assert!(!service.is_running(), "a stopped service does not restart");
    Ok(())
}

#[test]
fn test_start_outside_runtime_fails() {
    let service = service(1, Duration::from_secs(1));
    assert!(service.start().is_err());
    assert!(!service.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_keys_expire() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = service(1, Duration::from_millis(50));
    service.start()?;

    for i in 0..1000 {
        assert!(!service.handle(&format!("key-{i}")));
    }
    assert_eq!(service.tracked_keys(), 1000);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(service.tracked_keys(), 0, "every key should have been swept");
    assert_eq!(service.pending_expiries(), 0);

    service.stop().await;
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;
use tso::clock::allocation::AllocationEngine;
use tso::leader::election::StandaloneElection;
use tso::{Error, Grant, HybridClock, HybridTimestamp, TsoClock, TsoService};

fn service(logical_bits: u32, max_batch: Option<u32>) -> TsoService {
    let mut engine = AllocationEngine::new(HybridClock::new(logical_bits).unwrap(), 0).unwrap();
    if let Some(max) = max_batch {
        engine = engine.with_max_batch_size(max);
    }
    TsoService::new(engine, Arc::new(StandaloneElection::new()), Duration::from_millis(50)).unwrap()
}

fn granted(result: tso::Result<Grant<HybridTimestamp>>) -> HybridTimestamp {
    match result {
        Ok(Grant::Granted(ts)) => ts,
        other => panic!("expected a granted timestamp, got {:?}", other),
    }
}

#[tokio::test]
async fn test_small_layout_walkthrough() {
    // MAX_LOGICAL = 8
    let service = service(3, Some(3));
    service.on_leader_elected(1).unwrap();
    service.set_physical_time(100).unwrap();

    for logical in 0..4 {
        let ts = granted(service.get_timestamp());
        assert_eq!(service.clock().decode(ts), TsoClock { physical: 100, logical });
    }

    let max = granted(service.get_timestamps(3));
    assert_eq!(service.clock().decode(max), TsoClock { physical: 100, logical: 6 });

    // The batch covers (100,4)..=(100,6)
    let first = HybridTimestamp(max.as_u64() - 2);
    assert_eq!(service.clock().decode(first), TsoClock { physical: 100, logical: 4 });

    assert!(matches!(
        service.get_timestamp(),
        Err(Error::LogicalClockOverflow { physical: 100, logical: 8 })
    ));
}

#[tokio::test]
async fn test_allocations_strictly_increase() {
    let service = service(18, None);
    service.on_leader_elected(1_700_000_000_000).unwrap();

    let mut last = HybridTimestamp::ZERO;
    for i in 0..500u32 {
        let ts = if i % 3 == 0 {
            granted(service.get_timestamps(i % 17))
        } else {
            granted(service.get_timestamp())
        };
        assert!(ts > last, "{} not after {}", ts, last);
        last = ts;
    }
}

#[tokio::test]
async fn test_physical_update_restarts_logical() {
    let service = service(18, None);
    service.on_leader_elected(5_000).unwrap();
    granted(service.get_timestamps(40));

    service.set_physical_time(5_001).unwrap();
    let ts = granted(service.get_timestamp());
    assert_eq!(service.clock().decode(ts), TsoClock { physical: 5_001, logical: 0 });
}

#[tokio::test]
async fn test_zero_batch_matches_single() {
    let a = service(18, None);
    let b = service(18, None);
    a.on_leader_elected(42).unwrap();
    b.on_leader_elected(42).unwrap();

    assert_eq!(granted(a.get_timestamps(0)), granted(b.get_timestamps(1)));
    assert_eq!(a.status().timestamp, b.status().timestamp);
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_without_mutation() {
    let service = service(18, None);
    service.on_leader_elected(42).unwrap();
    let before = service.status().timestamp;

    let too_large = (service.clock().max_logical() / 8) as u32 + 1;
    assert!(matches!(
        service.get_timestamps(too_large),
        Err(Error::BatchTooLarge { .. })
    ));
    assert_eq!(service.status().timestamp, before);
}

#[tokio::test]
async fn test_follower_leaves_clock_alone() {
    let service = service(18, None);
    service.on_leader_elected(42).unwrap();
    granted(service.get_timestamp());
    service.on_leader_lost();

    let before = service.status().timestamp;
    assert_eq!(service.get_timestamp().unwrap(), Grant::NotLeader);
    assert_eq!(service.get_timestamps(5).unwrap(), Grant::NotLeader);
    assert_eq!(service.status().timestamp, before);
}

#[tokio::test]
async fn test_unprimed_leader_reports_not_found() {
    let service = service(18, None);
    service.on_leader_elected(0).unwrap();

    assert!(matches!(service.get_timestamp(), Err(Error::TimestampNotFound)));
    assert!(matches!(service.get_timestamps(4), Err(Error::TimestampNotFound)));
    assert_eq!(service.overflow_guard().recoveries_started(), 0);
}

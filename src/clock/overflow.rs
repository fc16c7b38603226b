use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use crate::clock::allocation::AllocationEngine;
use crate::error::{Error, Result};
use crate::leader::gate::LeaderGate;
use crate::observability::metrics;

/// Overflow Guard - reacts to an exhausted logical counter
///
/// ## Purpose
/// The logical counter only resets when the wall-clock driver pushes a new
/// physical time. If a millisecond runs out of logical values, either the
/// next tick is about to arrive (transient) or the driver has stalled and
/// this replica can no longer serve. The guard waits one update interval in
/// the background and steps down only in the second case.
///
/// At most one verification runs at a time; concurrent overflowing requests
/// share it.
pub struct OverflowGuard {
    engine: Arc<AllocationEngine>,
    gate: Arc<LeaderGate>,
    checking: Arc<AtomicBool>,
    recoveries_started: AtomicU64,
    update_interval: Duration,
    runtime: Handle,
}

/// Clears the single-flight flag when the verification ends, however it ends.
struct CheckingReset(Arc<AtomicBool>);

impl Drop for CheckingReset {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Logical clock recovery check panicked");
        }
        self.0.store(false, Ordering::Release);
    }
}

impl OverflowGuard {
    /// Binds the guard to the tokio runtime of the caller.
    pub fn new(
        engine: Arc<AllocationEngine>,
        gate: Arc<LeaderGate>,
        update_interval: Duration,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::with_runtime(engine, gate, update_interval, runtime))
    }

    pub fn with_runtime(
        engine: Arc<AllocationEngine>,
        gate: Arc<LeaderGate>,
        update_interval: Duration,
        runtime: Handle,
    ) -> Self {
        OverflowGuard {
            engine,
            gate,
            checking: Arc::new(AtomicBool::new(false)),
            recoveries_started: AtomicU64::new(0),
            update_interval,
            runtime,
        }
    }

    /// Passes when `logical_value` still fits the layout. Otherwise starts a
    /// recovery check (unless one is running) and fails the request.
    ///
    /// `span` is how many logical values the failing request asked for; the
    /// recovery check uses it to tell whether the same request would still
    /// overflow after one update interval.
    pub fn check_logical(&self, physical: u64, logical_value: u64, span: u64) -> Result<()> {
        if logical_value < self.engine.clock().max_logical() {
            return Ok(());
        }

        metrics::LOGICAL_CLOCK_OVERFLOWS.inc();

        if self
            .checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            self.recoveries_started.fetch_add(1, Ordering::Relaxed);
            metrics::RECOVERY_CHECKS_STARTED.inc();
            self.spawn_verification(span);
        }

        Err(Error::LogicalClockOverflow {
            physical,
            logical: logical_value,
        })
    }

    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    pub fn recoveries_started(&self) -> u64 {
        self.recoveries_started.load(Ordering::Relaxed)
    }

    fn spawn_verification(&self, span: u64) {
        let reset = CheckingReset(Arc::clone(&self.checking));
        let engine = Arc::clone(&self.engine);
        let gate = Arc::clone(&self.gate);
        let interval = self.update_interval;

        debug!("Launching logical clock recovery check");
        self.runtime.spawn(async move {
            let _reset = reset;
            verify_after_interval(&engine, &gate, interval, span).await;
        });
    }
}

/// Sleeps one update interval and resigns if the clock is still exhausted.
async fn verify_after_interval(
    engine: &AllocationEngine,
    gate: &LeaderGate,
    interval: Duration,
    span: u64,
) {
    tokio::time::sleep(interval).await;

    // Leadership may have been yielded while sleeping
    if !gate.is_leader_now() {
        debug!("Recovery check skipped: no longer leader");
        return;
    }

    let clock = engine.current_clock();
    if clock.physical == 0 {
        debug!("Recovery check skipped: clock torn down");
        return;
    }
    if clock.logical + span < engine.clock().max_logical() {
        info!("Logical clock recovered. {}", clock);
        return;
    }

    if !gate.step_down() {
        debug!("Recovery check skipped: leadership already ceded");
        return;
    }

    warn!("Resign leader. TSO logical clock overflow. {}", clock);
    metrics::LEADER_RESIGNATIONS.inc();

    if let Err(e) = gate.resign().await {
        error!("Failed to resign leadership after logical clock overflow: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::election::MockLeaderElection;
    use crate::types::timestamp::HybridClock;

    const INTERVAL: Duration = Duration::from_millis(50);

    fn guard_with(election: MockLeaderElection) -> (Arc<AllocationEngine>, Arc<LeaderGate>, OverflowGuard) {
        let engine = Arc::new(AllocationEngine::new(HybridClock::new(3).unwrap(), 100).unwrap());
        let gate = Arc::new(LeaderGate::new(Arc::new(election)));
        gate.set_leader(true);
        let guard = OverflowGuard::new(Arc::clone(&engine), Arc::clone(&gate), INTERVAL).unwrap();
        (engine, gate, guard)
    }

    fn exhaust(engine: &AllocationEngine) {
        while engine.allocate_one().is_ok() {}
    }

    #[tokio::test(start_paused = true)]
    async fn fast_path_starts_nothing() {
        let (_engine, _gate, guard) = guard_with(MockLeaderElection::new());

        assert!(guard.check_logical(100, 7, 1).is_ok());
        assert!(!guard.is_checking());
        assert_eq!(guard.recoveries_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_overflow_keeps_leadership() {
        let mut election = MockLeaderElection::new();
        election.expect_resign().never();
        let (engine, gate, guard) = guard_with(election);
        exhaust(&engine);

        let err = guard.check_logical(100, 8, 1).unwrap_err();
        assert!(matches!(err, Error::LogicalClockOverflow { physical: 100, logical: 8 }));
        assert!(guard.is_checking());

        // Driver ticks before the check wakes up
        engine.set_physical_time(101).unwrap();
        tokio::time::sleep(INTERVAL * 2).await;

        assert!(!guard.is_checking());
        assert!(gate.is_leader_now());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_driver_resigns_once() {
        let mut election = MockLeaderElection::new();
        election.expect_resign().times(1).returning(|| Ok(()));
        let (engine, gate, guard) = guard_with(election);
        exhaust(&engine);

        assert!(guard.check_logical(100, 8, 1).is_err());
        assert!(guard.check_logical(100, 8, 1).is_err());
        assert_eq!(guard.recoveries_started(), 1);

        tokio::time::sleep(INTERVAL * 2).await;

        assert!(!gate.is_leader_now());
        assert!(!guard.is_checking());
    }

    #[tokio::test(start_paused = true)]
    async fn resign_failure_still_clears_flag() {
        let mut election = MockLeaderElection::new();
        election
            .expect_resign()
            .times(1)
            .returning(|| Err(Error::ElectionError("session expired".to_string())));
        let (engine, gate, guard) = guard_with(election);
        exhaust(&engine);

        assert!(guard.check_logical(100, 8, 1).is_err());
        tokio::time::sleep(INTERVAL * 2).await;

        assert!(!guard.is_checking());
        assert!(!gate.is_leader_now());

        // A later overflow may start a fresh check
        assert!(guard.check_logical(100, 8, 1).is_err());
        assert_eq!(guard.recoveries_started(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn follower_does_not_resign() {
        let mut election = MockLeaderElection::new();
        election.expect_resign().never();
        let (engine, gate, guard) = guard_with(election);
        exhaust(&engine);

        assert!(guard.check_logical(100, 8, 1).is_err());
        gate.set_leader(false);
        tokio::time::sleep(INTERVAL * 2).await;

        assert!(!guard.is_checking());
    }
}

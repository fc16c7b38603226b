use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use crate::error::Result;
use crate::service::tso::TsoService;

/// Source of wall-clock milliseconds.
pub trait WallClock: Send + Sync {
    fn now_millis(&self) -> u64;
}

pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Pushes wall-clock time into the oracle on a fixed period.
///
/// A reading is applied only when it is ahead of the clock's physical part.
/// Re-applying the same millisecond would reset the logical counter and
/// reissue timestamps already handed out.
pub struct PhysicalClockDriver {
    service: Arc<TsoService>,
    wall_clock: Arc<dyn WallClock>,
    interval: Duration,
}

impl PhysicalClockDriver {
    pub fn new(service: Arc<TsoService>, wall_clock: Arc<dyn WallClock>, interval: Duration) -> Self {
        PhysicalClockDriver { service, wall_clock, interval }
    }

    /// Returns whether a new physical time was applied.
    pub fn tick(&self) -> Result<bool> {
        if !self.service.is_leader() {
            return Ok(false);
        }

        let now = self.wall_clock.now_millis();
        let current = self.service.current_clock().physical;
        if now <= current {
            tracing::debug!("Wall clock {} not ahead of physical {}, skipping update", now, current);
            return Ok(false);
        }

        self.service.set_physical_time(now)?;
        Ok(true)
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.tick() {
                tracing::error!("Physical time update failed: {}", e);
            }
        }
    }
}

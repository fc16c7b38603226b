use std::sync::Arc;
use tokio::time::{interval, Duration};
use crate::clock::driver::WallClock;
use crate::error::Result;
use crate::leader::election::LeaderElection;
use crate::service::tso::TsoService;

/// Applies election results to the oracle.
///
/// A new term is seeded strictly after anything this replica has issued or
/// been told was persisted, and no earlier than the wall clock.
pub struct LeadershipWatcher {
    service: Arc<TsoService>,
    election: Arc<dyn LeaderElection>,
    wall_clock: Arc<dyn WallClock>,
    poll_interval: Duration,
    was_leader: bool,
    high_water: u64,
}

impl LeadershipWatcher {
    pub fn new(
        service: Arc<TsoService>,
        election: Arc<dyn LeaderElection>,
        wall_clock: Arc<dyn WallClock>,
        poll_interval: Duration,
        persisted_physical: u64,
    ) -> Self {
        LeadershipWatcher {
            service,
            election,
            wall_clock,
            poll_interval,
            was_leader: false,
            high_water: persisted_physical,
        }
    }

    /// Reconciles the gate with the election. A gate that was stepped down
    /// while the election still names this replica (a failed resignation, or
    /// a re-election) starts a fresh term past the stalled clock.
    pub fn poll(&mut self) -> Result<()> {
        let leader = self.election.is_leader();
        let serving = self.service.is_leader();

        if leader && !serving {
            self.high_water = self.high_water.max(self.service.current_clock().physical);
            let seed = self.wall_clock.now_millis().max(self.high_water + 1);
            self.service.on_leader_elected(seed)?;
            tracing::info!("Became TSO leader, clock seeded at {}", seed);
        } else if !leader && (serving || self.was_leader) {
            self.high_water = self.high_water.max(self.service.current_clock().physical);
            self.service.on_leader_lost();
            tracing::warn!("Lost TSO leadership, last physical {}", self.high_water);
        }

        self.was_leader = leader;
        Ok(())
    }

    pub async fn run(mut self) {
        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;

            if let Err(e) = self.poll() {
                tracing::error!("Failed to apply leadership change: {}", e);
            }
        }
    }
}

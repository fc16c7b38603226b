use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use crate::error::Result;
use crate::leader::election::LeaderElection;

/// Admission gate for every allocation path.
///
/// The flag is pushed in by the election subsystem (or the recovery check
/// stepping down); allocation reads it before touching the clock.
pub struct LeaderGate {
    is_leader: AtomicBool,
    election: Arc<dyn LeaderElection>,
}

impl LeaderGate {
    pub fn new(election: Arc<dyn LeaderElection>) -> Self {
        LeaderGate {
            is_leader: AtomicBool::new(false),
            election,
        }
    }

    pub fn set_leader(&self, leader: bool) {
        let previous = self.is_leader.swap(leader, Ordering::AcqRel);
        if previous != leader {
            tracing::info!("Leadership flag changed: {} -> {}", previous, leader);
        }
    }

    pub fn is_leader_now(&self) -> bool {
        self.is_leader.load(Ordering::Acquire)
    }

    /// Clears the flag. Returns true only for the caller that actually
    /// flipped it, so concurrent step-downs resign once.
    pub fn step_down(&self) -> bool {
        self.is_leader
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub async fn resign(&self) -> Result<()> {
        self.election.resign().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::leader::election::MockLeaderElection;

    #[test]
    fn starts_as_follower() {
        let gate = LeaderGate::new(Arc::new(MockLeaderElection::new()));
        assert!(!gate.is_leader_now());

        gate.set_leader(true);
        assert!(gate.is_leader_now());
    }

    #[test]
    fn only_one_step_down_wins() {
        let gate = LeaderGate::new(Arc::new(MockLeaderElection::new()));
        gate.set_leader(true);

        assert!(gate.step_down());
        assert!(!gate.step_down());
        assert!(!gate.is_leader_now());
    }

    #[tokio::test]
    async fn resign_passes_through() {
        let mut election = MockLeaderElection::new();
        election
            .expect_resign()
            .times(1)
            .returning(|| Err(Error::ElectionError("lease lost".to_string())));

        let gate = LeaderGate::new(Arc::new(election));
        assert!(matches!(gate.resign().await, Err(Error::ElectionError(_))));
    }
}

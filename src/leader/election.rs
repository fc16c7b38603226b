use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::Result;

/// Narrow view of the leader election subsystem.
///
/// The oracle only needs to know whether this replica currently leads and
/// how to give leadership up. Concrete elections (Raft, lease-based,
/// ZooKeeper) implement this outside the core.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaderElection: Send + Sync {
    fn is_leader(&self) -> bool;
    async fn resign(&self) -> Result<()>;
}

/// Single-replica election: leads from startup. After a resignation it
/// takes leadership back once `rejoin_after` has passed, if configured.
pub struct StandaloneElection {
    leading: Arc<AtomicBool>,
    rejoin_after: Option<Duration>,
}

impl StandaloneElection {
    pub fn new() -> Self {
        StandaloneElection {
            leading: Arc::new(AtomicBool::new(true)),
            rejoin_after: None,
        }
    }

    /// With no other replica to hand over to, a resignation is a pause:
    /// leadership comes back after `hold_off`.
    pub fn with_rejoin_after(hold_off: Duration) -> Self {
        StandaloneElection {
            leading: Arc::new(AtomicBool::new(true)),
            rejoin_after: Some(hold_off),
        }
    }

    /// Takes leadership back after a resignation.
    pub fn campaign(&self) {
        if !self.leading.swap(true, Ordering::SeqCst) {
            tracing::info!("Standalone election: leadership reacquired");
        }
    }
}

impl Default for StandaloneElection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaderElection for StandaloneElection {
    fn is_leader(&self) -> bool {
        self.leading.load(Ordering::SeqCst)
    }

    async fn resign(&self) -> Result<()> {
        if !self.leading.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::warn!("Standalone election: leadership resigned");

        if let Some(hold_off) = self.rejoin_after {
            let leading = Arc::clone(&self.leading);
            tokio::spawn(async move {
                tokio::time::sleep(hold_off).await;
                if !leading.swap(true, Ordering::SeqCst) {
                    tracing::info!("Standalone election: leadership reacquired after {:?}", hold_off);
                }
            });
        }
        Ok(())
    }
}

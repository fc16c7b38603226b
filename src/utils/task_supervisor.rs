use tokio::task::JoinHandle;
use std::collections::HashMap;
use crate::error::{Error, Result};
use tracing::{info, error};

/// Task Supervisor - owns the oracle's long-running background tasks
///
/// The clock driver, leadership watcher and HTTP server are expected to run
/// for the life of the process; any of them finishing is a failure.
///
/// ## Usage
/// ```rust,ignore
/// let mut supervisor = TaskSupervisor::new();
/// supervisor.spawn("clock_driver", driver.run());
///
/// if let Err(e) = supervisor.check_health() {
///     error!("Task failure detected: {}", e);
/// }
/// ```
pub struct TaskSupervisor {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        TaskSupervisor {
            tasks: HashMap::new(),
        }
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F) -> &mut Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(future);

        info!("Spawned background task: {}", name);
        self.tasks.insert(name, handle);
        self
    }

    /// Fails if any registered task has stopped. Stopped tasks are dropped
    /// from tracking.
    pub fn check_health(&mut self) -> Result<()> {
        let mut finished: Vec<String> = self.tasks.iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        if finished.is_empty() {
            return Ok(());
        }

        finished.sort();
        for name in &finished {
            self.tasks.remove(name);
        }

        let message = format!("Tasks terminated unexpectedly: {:?}", finished);
        error!("{}", message);
        Err(Error::TaskFailed(message))
    }

    pub fn active_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn shutdown_all(&mut self) {
        info!("Shutting down {} background tasks", self.tasks.len());

        for (name, handle) in self.tasks.drain() {
            handle.abort();
            info!("Aborted task: {}", name);
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reports_finished_tasks() {
        let mut supervisor = TaskSupervisor::new();
        supervisor
            .spawn("forever", std::future::pending::<()>())
            .spawn("short_lived", async {});

        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = supervisor.check_health().unwrap_err();
        assert!(matches!(err, Error::TaskFailed(ref msg) if msg.contains("short_lived")));
        assert_eq!(supervisor.active_task_count(), 1);
        assert!(supervisor.check_health().is_ok());

        supervisor.shutdown_all();
        assert_eq!(supervisor.active_task_count(), 0);
    }
}

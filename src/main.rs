use std::sync::Arc;
use anyhow::Context;
use tokio::net::TcpListener;
use tokio::time::{interval, Duration};
use tracing::{error, info};
use tso::api::rest::create_router;
use tso::clock::driver::{PhysicalClockDriver, SystemWallClock, WallClock};
use tso::config::loader::AppConfig;
use tso::leader::election::{LeaderElection, StandaloneElection};
use tso::leader::watcher::LeadershipWatcher;
use tso::observability::metrics::register_metrics;
use tso::observability::tracing::init_tracing;
use tso::service::tso::TsoService;
use tso::utils::task_supervisor::TaskSupervisor;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("TSO_ENV").unwrap_or_else(|_| "development".to_string());
    let config = AppConfig::load(&env).context("loading configuration")?;

    init_tracing(&config.logging)?;
    register_metrics()?;

    if !config.election.standalone {
        anyhow::bail!(
            "no built-in replicated election; embed TsoService with a LeaderElection implementation"
        );
    }

    let election: Arc<dyn LeaderElection> = Arc::new(
        StandaloneElection::with_rejoin_after(config.election.poll_interval()),
    );
    let wall_clock: Arc<dyn WallClock> = Arc::new(SystemWallClock);
    let service = Arc::new(TsoService::from_config(&config.tso, Arc::clone(&election))?);

    info!(
        "TSO starting: logical_bits={}, update_interval={}ms, persisted_physical={}",
        config.tso.logical_bits,
        config.tso.update_interval_ms,
        config.tso.initial_physical_ms
    );

    let mut supervisor = TaskSupervisor::new();

    let watcher = LeadershipWatcher::new(
        Arc::clone(&service),
        Arc::clone(&election),
        Arc::clone(&wall_clock),
        config.election.poll_interval(),
        config.tso.initial_physical_ms,
    );
    supervisor.spawn("leadership_watcher", watcher.run());

    let driver = PhysicalClockDriver::new(
        Arc::clone(&service),
        Arc::clone(&wall_clock),
        config.tso.update_interval(),
    );
    supervisor.spawn("clock_driver", driver.run());

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    info!("TSO listening on {}", config.server.listen_addr);

    let router = create_router(Arc::clone(&service));
    supervisor.spawn("http_server", async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("HTTP server stopped: {}", e);
        }
    });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut health = interval(HEALTH_CHECK_INTERVAL);

    let outcome = loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("Shutdown requested");
                break signal.context("listening for shutdown signal");
            }
            _ = health.tick() => {
                if let Err(e) = supervisor.check_health() {
                    break Err(e.into());
                }
            }
        }
    };

    service.on_leader_lost();
    supervisor.shutdown_all();
    outcome
}

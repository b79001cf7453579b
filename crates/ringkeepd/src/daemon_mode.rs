//! Daemon mode — the long-running process on every storage host.
//!
//! In this mode, the daemon:
//! 1. Opens the local coordinator and seeds it from the topology file
//! 2. Resolves the local host
//! 3. Watches its DaemonState, resuming any interrupted update first
//! 4. Serves the status API until Ctrl-C or a fatal daemon error

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ringkeep_coord::LocalCoordinator;
use ringkeep_core::{DaemonConfig, Topology};
use ringkeep_storage::EngineRegistry;
use ringkeep_update::UpdateDaemon;
use tokio::sync::watch;
use tracing::{error, info};

/// How long blocking partition updates still running at shutdown may hold
/// the process open.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Drive `fut` on a fresh multi-threaded runtime, then give blocking work
/// still in flight at most `grace` before the runtime is torn down.
pub fn block_on_with_grace<F>(fut: F, grace: Duration) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = runtime.block_on(fut);
    runtime.shutdown_timeout(grace);
    result
}

/// Run the daemon to completion on its own runtime.
pub fn serve(config: DaemonConfig) -> anyhow::Result<()> {
    block_on_with_grace(run_daemon(config), SHUTDOWN_GRACE)
}

/// Open the coordinator database named by `config`, seeding it with the
/// configured topology file if there is one.
pub fn open_coordinator(config: &DaemonConfig) -> anyhow::Result<LocalCoordinator> {
    let db_path = config.coordinator_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let coordinator = LocalCoordinator::open(&db_path)
        .with_context(|| format!("opening coordinator {}", db_path.display()))?;
    info!(path = ?db_path, "coordinator opened");

    if let Some(path) = &config.coordinator.topology {
        let topology = Topology::from_file(path)?;
        let loaded = coordinator.load_topology(&topology)?;
        info!(path = ?path, ring_groups = loaded, "topology seeded");
    }
    Ok(coordinator)
}

/// Run the update daemon and its status API.
pub async fn run_daemon(config: DaemonConfig) -> anyhow::Result<()> {
    info!(ring_group = %config.ring_group, ring = config.ring_number, "ringkeep daemon starting");
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let coordinator = Arc::new(open_coordinator(&config)?);
    let api_port = config.api_port;
    let engines = EngineRegistry::with_builtin();
    info!(engines = ?engines.names(), "storage engines registered");

    let daemon = Arc::new(UpdateDaemon::from_config(config, coordinator, engines)?);

    // ── Shutdown signal ──────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_shutdown = shutdown_rx.clone();

    // ── Update daemon ────────────────────────────────────────────
    let mut daemon_handle = tokio::spawn({
        let daemon = Arc::clone(&daemon);
        async move { daemon.run(shutdown_rx).await }
    });

    // ── Status API ───────────────────────────────────────────────
    let router = crate::api::build_router(Arc::clone(&daemon));
    let addr = SocketAddr::from(([0, 0, 0, 0], api_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status api on {addr}"))?;
    info!(%addr, "status API listening");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    // ── Wait for Ctrl-C or a fatal daemon error ──────────────────
    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing Ctrl-C handler")?;
            info!("shutdown signal received");
            // Blocking partition updates still running get SHUTDOWN_GRACE
            // once the runtime drops; the persisted Updating state makes the
            // next start redo them.
            daemon_handle.abort();
            Ok(())
        }
        joined = &mut daemon_handle => match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "update daemon stopped");
                Err(anyhow::Error::new(e).context("update daemon failed"))
            }
            Err(e) => Err(anyhow::anyhow!("update daemon task failed: {e}")),
        },
    };

    let _ = shutdown_tx.send(true);
    if let Ok(Err(e)) = server_handle.await {
        error!(error = %e, "status API error");
    }

    info!("ringkeep daemon stopped");
    result
}

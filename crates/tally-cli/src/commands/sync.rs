use std::path::Path;
use std::sync::Arc;

use tally_core::collections::CollectionRegistry;
use tally_core::config::EngineConfig;
use tally_core::models::{Flow, SyncDirection};
use tally_core::sync::{BulkCopyStatus, QueueStats, SyncCoordinator};

use crate::commands::common::{open_local, open_remote, RemoteTarget};
use crate::error::CliError;

/// Outcome of the bulk copy phase of one CLI sync run
#[derive(Debug)]
pub struct SyncSummary {
    pub status: BulkCopyStatus,
    pub stats: Vec<(Flow, QueueStats)>,
}

pub async fn run_sync(
    partition: &str,
    direction: SyncDirection,
    remote: RemoteTarget,
    watch: bool,
    config: EngineConfig,
    db_path: &Path,
) -> Result<SyncSummary, CliError> {
    let coordinator = open_coordinator(db_path, remote, config).await?;
    coordinator.start_sync(partition, direction).await?;
    let summary = wait_and_report(&coordinator).await;

    if watch {
        println!(
            "Live sync running for partition '{}'. Press Ctrl-C to stop.",
            partition.trim()
        );
        watch_until_interrupted(&coordinator).await?;
        print_stats(&coordinator.queue_stats().await);
    }

    coordinator.stop_sync().await;
    finish(summary)
}

pub async fn run_resync(
    partition: &str,
    remote: RemoteTarget,
    config: EngineConfig,
    db_path: &Path,
) -> Result<SyncSummary, CliError> {
    let coordinator = open_coordinator(db_path, remote, config).await?;
    coordinator.force_resync(partition).await?;
    let summary = wait_and_report(&coordinator).await;
    coordinator.stop_sync().await;
    finish(summary)
}

async fn open_coordinator(
    db_path: &Path,
    remote: RemoteTarget,
    config: EngineConfig,
) -> Result<SyncCoordinator, CliError> {
    let local = Arc::new(open_local(db_path).await?);
    let remote = Arc::new(open_remote(remote).await?);
    let checkpoints = Arc::new(local.checkpoints());

    Ok(SyncCoordinator::new(
        local,
        remote,
        checkpoints,
        CollectionRegistry::ledger(),
        config,
    ))
}

async fn wait_and_report(coordinator: &SyncCoordinator) -> SyncSummary {
    let status = coordinator.wait_for_bulk_copy().await;
    let stats = coordinator.queue_stats().await;

    match &status {
        BulkCopyStatus::Complete => println!("Bulk copy complete"),
        BulkCopyStatus::Failed(reason) => println!("Bulk copy failed: {reason}"),
        BulkCopyStatus::Idle | BulkCopyStatus::InProgress => {}
    }
    print_stats(&stats);

    SyncSummary { status, stats }
}

fn print_stats(stats: &[(Flow, QueueStats)]) {
    for (flow, stats) in stats {
        println!(
            "{:<15}  applied={} skipped={} failed={}",
            flow.as_str(),
            stats.applied,
            stats.skipped,
            stats.failed
        );
    }
}

async fn watch_until_interrupted(coordinator: &SyncCoordinator) -> Result<(), CliError> {
    let mut status = coordinator.subscribe_status();
    loop {
        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => {
                interrupted?;
                return Ok(());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = status.borrow_and_update().clone();
                tracing::info!("Bulk copy status: {current:?}");
            }
        }
    }
}

fn finish(summary: SyncSummary) -> Result<SyncSummary, CliError> {
    match &summary.status {
        BulkCopyStatus::Failed(reason) => Err(CliError::SyncFailed(reason.clone())),
        _ => Ok(summary),
    }
}

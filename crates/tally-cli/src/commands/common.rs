use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tally_core::collections::CollectionRegistry;
use tally_core::config::EngineConfig;
use tally_core::db::{LibSqlStore, SyncConfig};
use tally_core::models::SyncCheckpoint;
use tally_core::services::LedgerService;
use tally_core::{Record, RecordId};

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub partition: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub is_deleted: bool,
    pub data: Map<String, Value>,
}

/// Where the remote side of a sync session lives
#[derive(Debug, Clone)]
pub enum RemoteTarget {
    /// Another local database file, useful for two-device setups on one machine
    File(PathBuf),
    /// Turso embedded replica stored at `replica_path`
    Turso {
        replica_path: PathBuf,
        config: SyncConfig,
    },
}

pub fn parse_record_id(id: &str) -> Result<RecordId, CliError> {
    let trimmed = id.trim();
    trimmed
        .parse::<RecordId>()
        .map_err(|_| CliError::InvalidRecordId(trimmed.to_string()))
}

pub fn parse_record_data(data: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(data)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(CliError::DataNotObject),
    }
}

pub fn record_to_list_item(record: &Record) -> RecordListItem {
    let now_ms = Utc::now().timestamp_millis();
    RecordListItem {
        id: record.id.to_string(),
        partition: record.partition.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        relative_time: format_relative_time(record.updated_at, now_ms),
        is_deleted: record.is_deleted,
        data: record.data.clone(),
    }
}

pub fn format_record_lines(records: &[Record]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    records
        .iter()
        .map(|record| {
            let id = record.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let preview = record_preview(record, 48);
            let relative_time = format_relative_time(record.updated_at, now_ms);

            if record.is_deleted {
                format!("{short_id:<13}  {preview:<48}  {relative_time:<10}  (deleted)")
            } else {
                format!("{short_id:<13}  {preview:<48}  {relative_time}")
            }
        })
        .collect()
}

/// Compact one-line rendering of the record's entity fields
pub fn record_preview(record: &Record, max_chars: usize) -> String {
    let collapsed = Value::Object(record.data.clone()).to_string();

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_checkpoint_lines(checkpoints: &[SyncCheckpoint]) -> Vec<String> {
    checkpoints
        .iter()
        .map(|checkpoint| {
            let cursor = checkpoint
                .cursor
                .map_or_else(|| "-".to_string(), |cursor| cursor.to_string());
            format!(
                "{:<14}  {:<15}  {:<12}  {}  cursor={cursor}",
                checkpoint.collection,
                checkpoint.flow.as_str(),
                checkpoint.partition,
                format_sync_timestamp(checkpoint.last_synced_at),
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("tally.db")
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> PathBuf {
    cli_config.unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tally")
            .join("engine.json")
    })
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig, CliError> {
    Ok(EngineConfig::load(path)?)
}

pub fn sync_config_from_env() -> Option<SyncConfig> {
    let url = env::var("TURSO_DATABASE_URL").ok()?;
    let auth_token = env::var("TURSO_AUTH_TOKEN").ok()?;

    if url.is_empty() || auth_token.is_empty() {
        return None;
    }

    Some(SyncConfig::new(url, auth_token))
}

/// An explicit `--remote-db` wins over Turso credentials from the environment.
pub fn resolve_remote_target(
    remote_db: Option<&Path>,
    env_sync: Option<SyncConfig>,
    db_path: &Path,
) -> Result<RemoteTarget, CliError> {
    if let Some(path) = remote_db {
        return Ok(RemoteTarget::File(path.to_path_buf()));
    }

    env_sync
        .map(|config| RemoteTarget::Turso {
            replica_path: db_path.with_file_name("remote-replica.db"),
            config,
        })
        .ok_or(CliError::RemoteNotConfigured)
}

pub async fn open_local(db_path: &Path) -> Result<LibSqlStore, CliError> {
    ensure_parent_dir(db_path)?;
    Ok(LibSqlStore::open(db_path, CollectionRegistry::ledger()).await?)
}

pub async fn open_ledger(db_path: &Path) -> Result<LedgerService, CliError> {
    Ok(LedgerService::new(Arc::new(open_local(db_path).await?)))
}

pub async fn open_remote(target: RemoteTarget) -> Result<LibSqlStore, CliError> {
    match target {
        RemoteTarget::File(path) => {
            ensure_parent_dir(&path)?;
            Ok(LibSqlStore::open(&path, CollectionRegistry::ledger())
                .await?
                .with_name("remote"))
        }
        RemoteTarget::Turso {
            replica_path,
            config,
        } => {
            ensure_parent_dir(&replica_path)?;
            tracing::info!("Remote ledger is a Turso embedded replica");
            // The replica bootstrap needs a deeper stack than the main runtime's workers.
            let store = std::thread::Builder::new()
                .stack_size(8 * 1024 * 1024)
                .spawn(move || {
                    let runtime = tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .build()
                        .map_err(|error| tally_core::Error::Database(error.to_string()))?;
                    runtime.block_on(LibSqlStore::open_with_sync(
                        &replica_path,
                        config,
                        CollectionRegistry::ledger(),
                    ))
                })
                .map_err(|error| CliError::DatabaseInit(error.to_string()))?
                .join()
                .map_err(|_| CliError::DatabaseInit("replica initialization thread panicked".into()))??;
            Ok(store)
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

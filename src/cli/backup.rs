//! `backup` subcommands

use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::domain::backup::BackupManifest;
use crate::infrastructure::backup::BackupRunOptions;
use crate::Subsystem;

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Snapshot database, cache, configuration, and metadata
    Full,
    /// Snapshot changes since the most recent backup
    Incremental,
    /// Snapshot the redacted configuration only
    Config,
    /// List persisted backups, newest first
    List,
    /// Restore a backup by id
    Restore { id: String },
    /// Delete a backup by id
    Delete { id: String },
}

/// A Ctrl-C cancels the run at the next component boundary.
fn cancel_on_ctrl_c() -> BackupRunOptions {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });
    BackupRunOptions::with_cancellation(token)
}

fn print_manifest(manifest: &BackupManifest) {
    println!(
        "{} {} {} ({} byte(s), checksum {})",
        manifest.id,
        manifest.backup_type,
        manifest.timestamp.to_rfc3339(),
        manifest.total_size,
        &manifest.checksum[..12],
    );
    for component in &manifest.components {
        println!(
            "  {}: {:?}, {} item(s){}",
            component.name,
            component.status,
            component.items,
            component
                .detail
                .as_deref()
                .map(|d| format!(" - {}", d))
                .unwrap_or_default()
        );
    }
}

pub async fn run(subsystem: &Subsystem, command: BackupCommand) -> anyhow::Result<()> {
    match command {
        BackupCommand::Full => {
            let manifest = subsystem.backup.create_full_backup(cancel_on_ctrl_c()).await?;
            print_manifest(&manifest);
        }
        BackupCommand::Incremental => {
            let manifest = subsystem
                .backup
                .create_incremental_backup(cancel_on_ctrl_c())
                .await?;
            print_manifest(&manifest);
            if let Some(base) = &manifest.base_backup_id {
                println!("  base: {}", base);
            }
        }
        BackupCommand::Config => {
            let manifest = subsystem
                .backup
                .create_config_backup(BackupRunOptions::default())
                .await?;
            print_manifest(&manifest);
        }
        BackupCommand::List => {
            let manifests = subsystem.backup.list_backups().await?;
            if manifests.is_empty() {
                println!("no backups");
            }
            for manifest in manifests {
                print_manifest(&manifest);
            }
        }
        BackupCommand::Restore { id } => {
            let report = subsystem
                .backup
                .restore_from_backup(&id, cancel_on_ctrl_c())
                .await?;
            for component in &report.components {
                println!(
                    "{}: {}{}",
                    component.component,
                    if component.success { "restored" } else { "FAILED" },
                    component
                        .detail
                        .as_deref()
                        .map(|d| format!(" - {}", d))
                        .unwrap_or_default()
                );
            }
            if !report.all_succeeded() {
                anyhow::bail!(
                    "restore finished with failed component(s): {}",
                    report.failed_components().join(", ")
                );
            }
        }
        BackupCommand::Delete { id } => {
            subsystem.backup.delete_backup(&id).await?;
            println!("deleted {}", id);
        }
    }
    Ok(())
}

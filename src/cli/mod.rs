//! CLI for operating the persistence subsystem
//!
//! Subcommands cover the operator surface: subsystem status, cache
//! maintenance, and backup/restore runs.

pub mod backup;
pub mod cache;
pub mod status;

use clap::{Parser, Subcommand};

/// Intelligent Discovery - cache, vector store, and backup operations
#[derive(Parser)]
#[command(name = "intelligent-discovery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show connection, collection, cache, and backup status
    Status,

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        command: cache::CacheCommand,
    },

    /// Create, list, restore, and delete backups
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommand,
    },
}

//! `cache` subcommands

use clap::Subcommand;

use crate::domain::cache::Cache;
use crate::Subsystem;

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print hit/miss counters and tier sizes
    Stats,
    /// Delete expired and corrupt disk-tier files now
    Sweep,
    /// Remove every entry from both tiers
    Clear,
    /// Remove entries whose logical key matches a `*` glob
    Invalidate { pattern: String },
}

pub async fn run(subsystem: &Subsystem, command: CacheCommand) -> anyhow::Result<()> {
    match command {
        CacheCommand::Stats => {
            let stats = subsystem.cache.stats_snapshot().await;
            println!("hits:           {}", stats.hits);
            println!("misses:         {}", stats.misses);
            println!("hit rate:       {:.1}%", stats.hit_rate() * 100.0);
            println!("memory entries: {}", stats.memory_entries);
            println!("disk entries:   {}", stats.disk_entries);
            println!("evictions:      {}", stats.evictions);
            println!("swept expired:  {}", stats.expired_swept);
            println!("swept corrupt:  {}", stats.corrupt_swept);
        }
        CacheCommand::Sweep => {
            let outcome = subsystem.cache.sweep().await?;
            println!(
                "swept {} expired and {} corrupt file(s)",
                outcome.expired, outcome.corrupt
            );
        }
        CacheCommand::Clear => {
            subsystem.cache.clear().await?;
            println!("cache cleared");
        }
        CacheCommand::Invalidate { pattern } => {
            let removed = subsystem.cache.invalidate_pattern(&pattern).await?;
            println!("invalidated {} entr(ies)", removed);
        }
    }
    Ok(())
}

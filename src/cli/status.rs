//! `status` subcommand

use crate::Subsystem;

pub async fn run(subsystem: &Subsystem) -> anyhow::Result<()> {
    let health = subsystem.vector_store.health_check().await;
    println!(
        "vector store: {} ({}, connected in {} attempt(s))",
        match &health {
            Ok(()) => "healthy",
            Err(_) => "unhealthy",
        },
        subsystem.config.vector_store.url,
        subsystem.vector_store.connect_attempts(),
    );
    if let Err(e) = health {
        println!("  {}", e);
    }

    for descriptor in subsystem.vector_store.required_collections() {
        match subsystem.vector_store.describe_collection(&descriptor.name).await {
            Ok(info) => println!(
                "collection {}: {} point(s), dim={}, status={}",
                info.descriptor.name,
                info.points_count,
                info.descriptor.vector_dimension,
                info.status
            ),
            Err(e) => println!("collection {}: {}", descriptor.name, e),
        }
    }

    let stats = subsystem.cache.stats_snapshot().await;
    println!(
        "cache: {} memory / {} disk entries, {:.0}% hit rate",
        stats.memory_entries,
        stats.disk_entries,
        stats.hit_rate() * 100.0
    );

    match subsystem.backup.get_last_backup().await? {
        Some(manifest) => println!(
            "last backup: {} ({}) at {}",
            manifest.id, manifest.backup_type, manifest.timestamp
        ),
        None => println!("last backup: none"),
    }

    Ok(())
}

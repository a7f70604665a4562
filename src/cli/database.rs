//! `database` subcommands

use anyhow::bail;
use clap::Subcommand;

use crate::config::DatabaseConfig;
use crate::storage::{
    create_pool, get_migration_version, list_applied_migrations, pending_migration_count,
    run_db_migrations, validate_migrations, MigrationInfo,
};

#[derive(Subcommand, Debug)]
pub enum DatabaseCommands {
    /// Run pending migrations
    Migrate {
        /// Show what would be migrated without applying anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status
    Status,

    /// List all applied migrations
    List,

    /// Validate database schema
    Validate,
}

pub async fn handle_database_command(
    command: DatabaseCommands,
    config: &DatabaseConfig,
) -> anyhow::Result<()> {
    let config = DatabaseConfig { auto_migrate: false, ..config.clone() };
    let pool = create_pool(&config).await?;

    match command {
        DatabaseCommands::Migrate { dry_run } => {
            let pending = pending_migration_count(&pool).await?;
            if dry_run {
                println!("{} pending migration(s) would be applied", pending);
            } else {
                println!("Running database migrations...");
                run_db_migrations(&pool).await?;
                println!("Applied {} migration(s)", pending);
            }
        }

        DatabaseCommands::Status => {
            let version = get_migration_version(&pool).await?;
            let pending = pending_migration_count(&pool).await?;
            println!("Current schema version: {}", version);
            if pending > 0 {
                bail!("Database schema has {} pending migration(s)", pending);
            }
            println!("Database schema is up to date");
        }

        DatabaseCommands::List => {
            let migrations = list_applied_migrations(&pool).await?;
            if migrations.is_empty() {
                println!("No migrations have been applied");
            } else {
                println!("Applied migrations:");
                print_migrations_table(&migrations);
            }
        }

        DatabaseCommands::Validate => {
            if !validate_migrations(&pool).await? {
                bail!("Database schema validation failed");
            }
            println!("Database schema validation passed");
        }
    }

    pool.close().await;
    Ok(())
}

fn print_migrations_table(migrations: &[MigrationInfo]) {
    println!();
    println!("{:<15} {:<50} {:<25} {:<10}", "Version", "Description", "Applied On", "Time (ms)");
    println!("{}", "-".repeat(100));

    for migration in migrations {
        println!(
            "{:<15} {:<50} {:<25} {:<10}",
            migration.version,
            truncate_string(&migration.description, 48),
            migration.installed_on.format("%Y-%m-%d %H:%M:%S"),
            migration.execution_time
        );
    }
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

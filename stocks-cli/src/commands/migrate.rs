//! Migration subcommands: init, generate, migrate, rollback, status

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use stocks_server::config::migrations_dir_from_env;
use stocks_server::db::{self, migrator, MigrationState, Migrator};
use stocks_server::DatabaseConfig;

/// Arguments shared by the database-backed migration commands
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Directory holding the migration files (default: MIGRATIONS_DIR or ./migrations)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

/// Arguments for the generate command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Migration name, e.g. add_index
    #[arg(long)]
    pub name: String,

    /// Directory holding the migration files (default: MIGRATIONS_DIR or ./migrations)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

fn resolve_dir(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(migrations_dir_from_env)
}

async fn open_migrator(args: MigrateArgs) -> Result<Migrator> {
    let config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    let pool = db::connect(&config)
        .await
        .context("Failed to connect to database")?;

    match db::ping(&pool).await {
        Ok(()) => tracing::info!(host = %config.host, database = %config.database, "database reachable"),
        Err(e) => tracing::warn!(error = %e, "database ping failed"),
    }

    Ok(Migrator::new(pool, resolve_dir(args.dir)))
}

pub async fn run_init(args: MigrateArgs) -> Result<()> {
    open_migrator(args)
        .await?
        .init()
        .await
        .context("Failed to initialise migrations")?;
    println!("Migration table ready");
    Ok(())
}

pub async fn run_generate(args: GenerateArgs) -> Result<()> {
    let dir = resolve_dir(args.dir);
    let unit = migrator::generate(&dir, &args.name)
        .await
        .with_context(|| format!("Failed to generate migration in {}", dir.display()))?;

    println!("Created {}", unit.up_path.display());
    println!("Created {}", unit.down_path.display());
    Ok(())
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let group = open_migrator(args)
        .await?
        .migrate()
        .await
        .context("Migration failed")?;

    if group.is_empty() {
        println!("No new migrations to run");
    } else {
        println!("Migrated to group {} ({} units)", group.id, group.units.len());
        for name in &group.units {
            println!("  + {}", name);
        }
    }
    Ok(())
}

pub async fn run_rollback(args: MigrateArgs) -> Result<()> {
    let group = open_migrator(args)
        .await?
        .rollback()
        .await
        .context("Rollback failed")?;

    if group.is_empty() {
        println!("Nothing to rollback");
    } else {
        println!("Rolled back group {} ({} units)", group.id, group.units.len());
        for name in &group.units {
            println!("  - {}", name);
        }
    }
    Ok(())
}

pub async fn run_status(args: MigrateArgs) -> Result<()> {
    let status = open_migrator(args)
        .await?
        .status()
        .await
        .context("Failed to read migration status")?;

    println!("State: {}", status.state);
    if status.state == MigrationState::Uninitialized {
        println!("Run `stocksctl init` to create the migration table");
    }

    if !status.applied.is_empty() {
        println!("Applied:");
        for unit in &status.applied {
            println!(
                "  [group {}] {} ({})",
                unit.group_id,
                unit.name,
                unit.migrated_at.to_rfc3339()
            );
        }
    }

    if status.pending.is_empty() {
        println!("Pending: none");
    } else {
        println!("Pending:");
        for name in &status.pending {
            println!("  {}", name);
        }
    }
    Ok(())
}

//! stocksctl - stock inventory service and schema migration tool
//!
//! - `serve`: run the REST and gRPC front ends over one shared repository
//! - `init` / `migrate` / `rollback` / `status`: manage the database schema
//! - `generate --name`: write a new up/down migration pair

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "stocksctl",
    author,
    version,
    about = "Stock inventory service and schema migration tool",
    long_about = "Serve the stock inventory over REST and gRPC, and manage its Postgres \
                  schema through grouped, reversible SQL migrations."
)]
struct Cli {
    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the telemetry feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the REST and gRPC servers until Ctrl+C / SIGTERM
    Serve(commands::serve::ServeArgs),
    /// Create the migration bookkeeping table
    Init(commands::migrate::MigrateArgs),
    /// Generate a new pair of SQL migration files
    Generate(commands::migrate::GenerateArgs),
    /// Apply all pending migrations as one group
    Migrate(commands::migrate::MigrateArgs),
    /// Revert the most recently applied group
    Rollback(commands::migrate::MigrateArgs),
    /// Show applied and pending migrations
    Status(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so `env = ...` arguments see .env values.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        otel: cli.otel,
    })?;

    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) => tracing::debug!(error = %e, "no .env loaded"),
    }

    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await,
        Commands::Init(args) => commands::run_init(args).await,
        Commands::Generate(args) => commands::run_generate(args).await,
        Commands::Migrate(args) => commands::run_migrate(args).await,
        Commands::Rollback(args) => commands::run_rollback(args).await,
        Commands::Status(args) => commands::run_status(args).await,
    };

    tracing_setup::shutdown();
    result
}

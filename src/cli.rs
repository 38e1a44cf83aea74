///
/// This module implements the CLI interface for blog-migrate: command parsing,
/// client construction from config and environment, and user-visible output.
///
/// All pipeline logic (parsing, rewriting, ledgers, orchestration) lives in the
/// [`blog-migrate-core`] crate. This module only wires real clients into it.
///
/// ## Commands
/// - `migrate --config <file> [--dry-run]`: run the migration. Dry runs use
///   disposable ledgers that are printed and deleted at the end.
/// - `publication-id --config <file> --name <name>`: print the id of one of the
///   authenticated user's publications, for filling in the config.
///
/// [`blog-migrate-core`]: ../../blog-migrate-core/
use crate::load_config::{load_config, CliConfig};
use crate::medium::MediumClient;
use crate::storage::SpacesClient;
use anyhow::Result;
use blog_migrate_core::config::RunMode;
use blog_migrate_core::contract::{DryRunPublisher, DryRunStore};
use blog_migrate_core::ledger::Ledger;
use blog_migrate_core::migrate::{migrate, resolve_publication_id, MigrationReport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for blog-migrate: move a Jekyll blog to Medium.
#[derive(Parser)]
#[clap(
    name = "blog-migrate",
    version,
    about = "Migrate Jekyll posts to Medium, re-hosting images in object storage"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish every post not yet in the ledger
    Migrate {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Transform everything but write nothing remote; ledgers are disposable
        #[clap(long)]
        dry_run: bool,
    },
    /// Print the id of a publication owned by the token's user
    PublicationId {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Exact publication name
        #[clap(long)]
        name: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Migrate { config, dry_run } => {
            let config = load_config(config)?;
            let mode = if dry_run { RunMode::DryRun } else { RunMode::Live };
            run_migrate(&config, mode).await
        }
        Commands::PublicationId { config, name } => {
            let config = load_config(config)?;
            let client = MediumClient::new_from_env(&config.platform.api_base)?;
            let id = resolve_publication_id(&client, &name).await.map_err(|e| {
                tracing::error!(command = "publication-id", error = %e, "Failed to resolve publication");
                e
            })?;
            println!("{id}");
            Ok(())
        }
    }
}

async fn run_migrate(config: &CliConfig, mode: RunMode) -> Result<()> {
    let migration = config.migration_config(mode)?;
    migration.trace_loaded();
    tracing::info!(command = "migrate", ?mode, "Starting migration");

    let report = match mode {
        RunMode::Live => {
            let store = SpacesClient::new_from_env(&migration.storage)?;
            let publisher = MediumClient::new_from_env(&config.platform.api_base)?;
            let mut ledger = Ledger::open(config.ledger.clone())?;
            migrate(&migration, &store, &publisher, &mut ledger).await
        }
        RunMode::DryRun => {
            let mut ledger = Ledger::open_dry_run(&config.ledger)?;
            let result = migrate(&migration, &DryRunStore, &DryRunPublisher, &mut ledger).await;
            match ledger.dump_and_discard() {
                Ok(dump) => println!("Dry-run ledgers:\n{dump}"),
                Err(e) if result.is_ok() => return Err(e.into()),
                Err(e) => tracing::error!(error = %e, "[LEDGER] Failed to clean up dry-run ledgers"),
            }
            result
        }
    };

    match report {
        Ok(report) => {
            tracing::info!(command = "migrate", ?report, "Migration complete");
            print_summary(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "migrate", error = %e, "Migration aborted");
            Err(anyhow::Error::new(e))
        }
    }
}

fn print_summary(report: &MigrationReport) {
    println!(
        "Migration complete: {} migrated, {} already migrated, {} unpublished, {} failed",
        report.migrated.len(),
        report.already_migrated,
        report.unpublished.len(),
        report.failed.len()
    );
    for post in &report.migrated {
        println!("  {} -> {}", post.from, post.to);
    }
    for failed in &report.failed {
        println!("  FAILED {}: {}", failed.source.display(), failed.error);
    }
}

use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::info;
use validator::Validate;

use crate::cli::args::{Cli, Commands, IngestArgs};
use crate::config::Settings;
use crate::models::{LedgerEntry, LedgerSummary};
use crate::processors::IngestCoordinator;
use crate::readers::{HttpCatalog, HttpFetcher};
use crate::store::{self, DedupLedger};
use crate::utils::logging::init_tracing;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    init_tracing(&settings.log_filter, cli.verbose, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    match cli.command.unwrap_or_else(|| Commands::Ingest(IngestArgs::default())) {
        Commands::Ingest(args) => {
            apply_overrides(&mut settings, &args);
            settings.validate().context("Invalid settings")?;
            ingest(settings, cli.quiet)
        }
        Commands::Status {
            incomplete,
            json,
            database,
        } => {
            if let Some(database) = database {
                settings.database_path = database.to_string_lossy().into_owned();
            }
            settings.validate().context("Invalid settings")?;
            status(&settings, incomplete, json)
        }
    }
}

/// Command-line values win over file and environment settings.
pub fn apply_overrides(settings: &mut Settings, args: &IngestArgs) {
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    if let Some(database) = &args.database {
        settings.database_path = database.to_string_lossy().into_owned();
    }
    if let Some(years_back) = args.years_back {
        settings.years_back = years_back;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(catalog_url) = &args.catalog_url {
        settings.catalog_url = catalog_url.clone();
    }
}

fn ingest(settings: Settings, quiet: bool) -> anyhow::Result<()> {
    info!(
        database = %settings.database_path,
        catalog = %settings.catalog_url,
        workers = settings.workers,
        batch_size = settings.batch_size,
        "Starting ingestion"
    );

    let catalog = HttpCatalog::new(&settings.catalog_url, settings.fetch_timeout())?;
    let fetcher = HttpFetcher::new(settings.fetch_timeout())?;
    let years = settings.year_window();

    let coordinator = IngestCoordinator::new(settings).with_silent(quiet);
    let report = coordinator
        .run(&catalog, fetcher, years)
        .context("Ingestion run failed")?;

    println!("\n{}", report.summary());

    if !report.is_success() {
        bail!(
            "{} of {} workers failed",
            report.worker_failures.len(),
            report.workers
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusOutput {
    summary: LedgerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    incomplete: Option<Vec<LedgerEntry>>,
}

fn status(settings: &Settings, incomplete: bool, json: bool) -> anyhow::Result<()> {
    let conn = store::open(Path::new(&settings.database_path), settings.busy_timeout())?;
    store::bootstrap(&conn)?;

    let output = StatusOutput {
        summary: DedupLedger::summary(&conn)?,
        incomplete: if incomplete {
            Some(DedupLedger::incomplete(&conn)?)
        } else {
            None
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", output.summary.summary());
    if let Some(entries) = &output.incomplete {
        println!("\nIncomplete files ({}):", entries.len());
        for entry in entries {
            println!(
                "  {:<11} {:>8} rows  {}  {}",
                entry.status.as_str(),
                entry.rows_loaded,
                entry.recorded_at,
                entry.url
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let mut settings = Settings::default();
        let args = IngestArgs {
            workers: Some(3),
            database: Some(PathBuf::from("/tmp/w.sqlite")),
            ..IngestArgs::default()
        };

        apply_overrides(&mut settings, &args);
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.database_path, "/tmp/w.sqlite");
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.years_back, 10);
    }
}

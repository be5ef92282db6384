use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weather-ingest")]
#[command(about = "Concurrent ingestion of hourly weather CSV files into SQLite")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, help = "Settings file [default: weather-ingest.toml if present]")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Hide the progress bar")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest every catalog file of the configured year window (default)
    Ingest(IngestArgs),

    /// Show ledger counts per status
    Status {
        #[arg(long, help = "List identifiers that were not loaded in full")]
        incomplete: bool,

        #[arg(long, help = "Print as JSON")]
        json: bool,

        #[arg(long, help = "SQLite database path")]
        database: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct IngestArgs {
    #[arg(short, long, help = "Worker pool size [default: number of CPUs]")]
    pub workers: Option<usize>,

    #[arg(short, long, help = "SQLite database path")]
    pub database: Option<PathBuf>,

    #[arg(long, help = "Years before the current one to include")]
    pub years_back: Option<i32>,

    #[arg(long, help = "Rows per insert statement")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Catalog base URL")]
    pub catalog_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_means_ingest_defaults() {
        let cli = Cli::try_parse_from(["weather-ingest"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_ingest_overrides() {
        let cli = Cli::try_parse_from([
            "weather-ingest",
            "--quiet",
            "ingest",
            "--workers",
            "4",
            "--years-back",
            "2",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Some(Commands::Ingest(args)) => {
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.years_back, Some(2));
                assert!(args.database.is_none());
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_status_flags() {
        let cli =
            Cli::try_parse_from(["weather-ingest", "status", "--incomplete", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                incomplete: true,
                json: true,
                ..
            })
        ));
    }
}

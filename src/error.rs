use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog listing for {year} failed with status {status}")]
    CatalogStatus { year: i32, status: u16 },

    #[error("Fetching {identifier} failed with status {status}")]
    FetchStatus { identifier: String, status: u16 },

    #[error("Payload of {identifier} is not valid UTF-8")]
    Encoding { identifier: String },

    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: u64, message: String },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid column name: '{0}'")]
    InvalidColumnName(String),

    #[error("Unknown ledger status: '{0}'")]
    UnknownStatus(String),

    #[error("Work queue closed unexpectedly")]
    QueueClosed,

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

impl IngestError {
    /// True for "column already exists" outcomes of an additive alteration.
    pub fn is_duplicate_column(&self) -> bool {
        match self {
            IngestError::Storage(rusqlite::Error::SqliteFailure(_, Some(message))) => {
                message.contains("duplicate column name")
            }
            _ => false,
        }
    }
}

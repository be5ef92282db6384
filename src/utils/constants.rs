/// Table names
pub const WEATHER_TABLE: &str = "weather";
pub const LEDGER_TABLE: &str = "ingested_csvs";

/// Normalized columns every destination table starts with, in insert order
pub const CORE_COLUMNS: [&str; 8] = [
    "station",
    "name",
    "call_sign",
    "timepoint",
    "temp_c",
    "temp_q",
    "dew_c",
    "dew_q",
];

/// Optional element codes pre-allocated on the destination table whether or
/// not the current file declares them
pub const OPTIONAL_ELEMENT_CODES: [&str; 39] = [
    "ab1", "ac1", "ad1", "ag1", "al1", "al2", "at1", "at2", "at3", "at4", "at5", "at6", "au1",
    "au2", "aw3", "ay1", "ay2", "az1", "ga4", "ga5", "ga6", "gg1", "gg2", "gg3", "gj1", "hl1",
    "ia1", "ia2", "me1", "mv1", "mw4", "od2", "od3", "sa1", "ua1", "ug1", "ug2", "ae1", "wa1",
];

/// Source header fields read by the row normalizer (lowercased)
pub const FIELD_STATION: &str = "station";
pub const FIELD_DATE: &str = "date";
pub const FIELD_NAME: &str = "name";
pub const FIELD_CALL_SIGN: &str = "call_sign";
pub const FIELD_TEMPERATURE: &str = "tmp";
pub const FIELD_DEW_POINT: &str = "dew";

/// Value portion of a "value,quality" measurement meaning "not observed"
pub const MISSING_MEASUREMENT: i32 = 9999;

/// Catalog defaults
pub const DEFAULT_CATALOG_URL: &str = "https://www.ncei.noaa.gov/data/global-hourly/access";
pub const DEFAULT_YEARS_BACK: i32 = 10;

/// Processing defaults
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DATABASE_PATH: &str = "weather.sqlite";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 5;

/// SQLite's compiled-in bind parameter limit (3.32+)
pub const MAX_BIND_PARAMETERS: usize = 32_766;

/// Configuration sources
pub const CONFIG_FILE: &str = "weather-ingest";
pub const ENV_PREFIX: &str = "WEATHER_INGEST";

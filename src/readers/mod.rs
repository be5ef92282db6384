pub mod catalog_reader;
pub mod observation_reader;
pub mod payload_reader;

pub use catalog_reader::{enumerate, parse_listing, HttpCatalog, SourceCatalog};
pub use observation_reader::{decode_payload, ObservationReader, ObservationRows};
pub use payload_reader::{HttpFetcher, PayloadFetcher};

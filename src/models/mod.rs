pub mod identifier;
pub mod ledger;
pub mod observation;

pub use identifier::SourceIdentifier;
pub use ledger::{LedgerEntry, LedgerStatus, LedgerSummary};
pub use observation::{Measurement, ObservationRow};

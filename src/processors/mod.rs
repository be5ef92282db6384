pub mod batch_loader;
pub mod coordinator;
pub mod row_normalizer;
pub mod schema_registry;
pub mod work_queue;
pub mod worker;

pub use batch_loader::{insert_statement, BatchLoader};
pub use coordinator::{IngestCoordinator, IngestReport, WorkerFailure};
pub use row_normalizer::{HeaderLayout, RowNormalizer};
pub use schema_registry::SchemaRegistry;
pub use work_queue::{WorkItem, WorkQueue};
pub use worker::{FileOutcome, WorkerContext, WorkerState, WorkerStats};

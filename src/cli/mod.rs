pub mod args;
pub mod commands;

pub use args::{Cli, Commands, IngestArgs};
pub use commands::run;

//! # ragent CLI
//!
//! Command-line interface for retrieval-augmented answering.
//!
//! This binary provides human-friendly access to `ragent-core` functionality.
//! Run `ragent --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}

//! # CLI UI Module
//!
//! Consistent styling and formatting for ragent CLI output.
//!
//! ## Design Principles
//!
//! 1. **Scannable**: success or failure is visible at a glance
//! 2. **Streaming-friendly**: answer text goes to stdout, progress to stderr
//! 3. **Accessible**: works without colors (respects `NO_COLOR`)
//! 4. **Scriptable**: machine-parseable with `--json`
//!
//! ## Module Structure
//!
//! - `color`: color mode detection and terminal capability checks
//! - `style`: message types, prefixes, and styling functions
//! - `format`: small text formatters (truncation, latency)
//! - `table`: provider and citation tables with comfy-table
//! - `progress`: spinner for long operations

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};

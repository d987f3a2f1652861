//! Template rendering: fill a spreadsheet template from a JSON payload.
//!
//! A render runs a global `{path}` substitution over the chosen sheet, then
//! expands the `{#items}` ... `{/items}` block to one row per item, removes
//! the marker rows and writes the `{TOTAL_SUM}` aggregate.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod expander;
pub mod locator;
pub mod payload;
pub mod placeholder;
pub mod render;

pub use config::RenderConfig;
pub use error::{ConfigError, PayloadError, RenderError};
pub use payload::Payload;
pub use render::{render_file, render_sheet, RenderOutcome, RenderPhase, RenderReport, RenderRequest};

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract, and scripts rely on them.
//!
//! | Code | Meaning                                                      |
//! |------|--------------------------------------------------------------|
//! | 0    | Rendered (or `--help` / `--version` printed)                 |
//! | 1    | Payload could not be loaded or parsed, or the render failed  |
//! | 2    | Usage error: bad arguments or an unusable `--config` file    |
//!
//! Every exit other than help/version prints exactly one JSON result object
//! on stdout.

use fillgrid_render::{ConfigError, PayloadError, RenderError};

/// Success - template rendered and output written.
pub const EXIT_SUCCESS: u8 = 0;

/// Data or render failure: bad payload, unreadable template, missing sheet,
/// unwritable output.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid config file.
pub const EXIT_USAGE: u8 = 2;

pub fn payload_exit_code(_err: &PayloadError) -> u8 {
    EXIT_ERROR
}

pub fn config_exit_code(_err: &ConfigError) -> u8 {
    EXIT_USAGE
}

/// Map a render failure to its exit code.
pub fn render_exit_code(err: &RenderError) -> u8 {
    match err {
        RenderError::Load { .. } | RenderError::Persist { .. } | RenderError::SheetNotFound { .. } => EXIT_ERROR,
    }
}

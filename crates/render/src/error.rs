use std::path::PathBuf;

/// Problems with the JSON payload. Raised before the grid is touched.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("payload is missing the 'header' object")]
    MissingHeader,
    #[error("'header' must be an object")]
    HeaderNotObject,
    #[error("'items' must be an array")]
    ItemsNotArray,
    #[error("items[{index}] must be an object")]
    ItemNotObject { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Semantic validation error (bad marker, empty token, ...).
    #[error("config validation error: {0}")]
    Validation(String),
    #[error("cannot read config '{}': {message}", path.display())]
    Io { path: PathBuf, message: String },
}

/// Terminal render failures. Anything recoverable is logged instead.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load template '{}': {message}", path.display())]
    Load { path: PathBuf, message: String },
    #[error("failed to write output '{}': {message}", path.display())]
    Persist { path: PathBuf, message: String },
    #[error("sheet '{name}' not found (available: {})", available.join(", "))]
    SheetNotFound { name: String, available: Vec<String> },
}

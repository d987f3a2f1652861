use std::path::Path;

use fillgrid_engine::cell::NumberFormat;
use serde::Deserialize;

use crate::error::ConfigError;

/// Render settings. Every field has a default, so an empty TOML document
/// (or no config file at all) gives the stock invoice behaviour.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub markers: MarkerConfig,
    pub aggregate: AggregateConfig,
    pub format: FormatConfig,
    pub sheet: SheetConfig,
    pub items: ItemsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MarkerConfig {
    /// Literal text that opens the repeat block
    pub start: String,
    /// Literal text that closes the repeat block
    pub end: String,
    /// Tokens `{<prefix>.<path>}` resolve against the current item
    pub item_prefix: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            start: "{#items}".to_string(),
            end: "{/items}".to_string(),
            item_prefix: "item".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateConfig {
    pub token: String,
    pub quantity_field: String,
    pub price_field: String,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            token: "{TOTAL_SUM}".to_string(),
            quantity_field: "qty".to_string(),
            price_field: "unit_price".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FormatConfig {
    /// Number format applied to numeric item cells and aggregate cells
    pub thousands: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            thousands: "#,##0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Worksheet names tried in order when no sheet is requested explicitly
    pub preferred: Vec<String>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            preferred: vec!["청구서".to_string(), "Invoice".to_string(), "Invoices".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ItemsConfig {
    /// Item fields rendered as `0` instead of empty text when absent
    pub numeric_fields: Vec<String>,
}

impl Default for ItemsConfig {
    fn default() -> Self {
        Self {
            numeric_fields: vec!["qty".to_string(), "unit_price".to_string()],
        }
    }
}

impl RenderConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, marker) in [("markers.start", &self.markers.start), ("markers.end", &self.markers.end)] {
            if !is_braced_token(marker) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a single {{...}} token, got {marker:?}"
                )));
            }
        }
        if self.markers.start == self.markers.end {
            return Err(ConfigError::Validation(
                "markers.start and markers.end must differ".into(),
            ));
        }

        let prefix = &self.markers.item_prefix;
        if prefix.is_empty() || prefix.contains(['.', '{', '}']) || prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "markers.item_prefix must be a plain name, got {prefix:?}"
            )));
        }

        if self.aggregate.token.trim().is_empty() {
            return Err(ConfigError::Validation("aggregate.token must not be empty".into()));
        }
        if self.aggregate.quantity_field.is_empty() || self.aggregate.price_field.is_empty() {
            return Err(ConfigError::Validation(
                "aggregate.quantity_field and aggregate.price_field must not be empty".into(),
            ));
        }

        if self.format.thousands.trim().is_empty() {
            return Err(ConfigError::Validation("format.thousands must not be empty".into()));
        }

        Ok(())
    }

    /// The configured thousands-separator format as a cell number format
    pub fn thousands_format(&self) -> NumberFormat {
        NumberFormat::from_code(&self.format.thousands)
    }

    /// `item.` for the default prefix
    pub fn item_path_prefix(&self) -> String {
        format!("{}.", self.markers.item_prefix)
    }

    pub fn is_numeric_field(&self, field: &str) -> bool {
        self.items.numeric_fields.iter().any(|f| f == field)
    }
}

/// `{name}` with a non-empty body and no nested braces
fn is_braced_token(s: &str) -> bool {
    s.strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .is_some_and(|body| !body.trim().is_empty() && !body.contains(['{', '}']))
}

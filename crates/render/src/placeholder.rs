//! `{path}` token substitution.
//!
//! Two passes share the token syntax. The global pass resolves paths against
//! the whole payload and leaves every reserved token alone (block markers,
//! `#`/`/` marker syntax, item-scoped tokens and the aggregate token). The
//! item pass only touches item-scoped tokens. Neither pass re-scans its own
//! output.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;
use tracing::debug;

use crate::config::RenderConfig;
use crate::payload::{resolve_in, value_to_text, Payload};

// Maximal `{...}` span with no nested braces
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid token regex"));

/// True if `text` contains at least one `{...}` token
pub fn has_tokens(text: &str) -> bool {
    TOKEN_RE.is_match(text)
}

/// Whether the global pass must leave this token for a later phase
pub fn is_reserved(token: &str, inner: &str, config: &RenderConfig) -> bool {
    let inner = inner.trim();
    token == config.markers.start
        || token == config.markers.end
        || inner.starts_with('#')
        || inner.starts_with('/')
        || inner.starts_with(&config.item_path_prefix())
        || token == config.aggregate.token
        || format!("{{{}}}", inner) == config.aggregate.token
}

/// Replace every non-reserved token with the payload value at its path.
/// Absent paths render as empty text.
pub fn substitute_global<'t>(text: &'t str, payload: &Payload, config: &RenderConfig) -> Cow<'t, str> {
    TOKEN_RE.replace_all(text, |caps: &Captures| {
        let token = &caps[0];
        let inner = &caps[1];
        if is_reserved(token, inner, config) {
            return token.to_string();
        }
        match payload.resolve_path(inner) {
            Some(value) => value_to_text(value).into_owned(),
            None => {
                debug!(token, "no payload value, rendering empty");
                String::new()
            }
        }
    })
}

/// Replace `{item.<path>}` tokens with values from `item`. Absent fields are
/// empty, except configured numeric fields which render as `0`. All other
/// tokens are left untouched.
pub fn substitute_item<'t>(text: &'t str, item: &Value, config: &RenderConfig) -> Cow<'t, str> {
    let prefix = config.item_path_prefix();
    TOKEN_RE.replace_all(text, |caps: &Captures| {
        let Some(path) = caps[1].trim().strip_prefix(prefix.as_str()) else {
            return caps[0].to_string();
        };
        match resolve_in(item, path) {
            Some(value) => value_to_text(value).into_owned(),
            None if config.is_numeric_field(path.trim()) => "0".to_string(),
            None => String::new(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Payload {
        Payload::from_value(json!({
            "header": {"client": "ACME", "issued_at": "2024-05-01", "items": "collide", "count": 3},
            "items": []
        }))
        .unwrap()
    }

    #[test]
    fn test_global_replaces_paths() {
        let config = RenderConfig::default();
        let out = substitute_global("To: {header.client} ({ header.issued_at })", &payload(), &config);
        assert_eq!(out, "To: ACME (2024-05-01)");
        assert_eq!(substitute_global("{header.count} units", &payload(), &config), "3 units");
    }

    #[test]
    fn test_global_absent_path_is_empty() {
        let config = RenderConfig::default();
        assert_eq!(substitute_global("[{header.nope}]", &payload(), &config), "[]");
    }

    #[test]
    fn test_global_leaves_reserved_tokens() {
        let config = RenderConfig::default();
        let p = payload();
        assert_eq!(substitute_global("{#items}", &p, &config), "{#items}");
        assert_eq!(substitute_global("{/items}", &p, &config), "{/items}");
        assert_eq!(substitute_global("{#header.client}", &p, &config), "{#header.client}");
        assert_eq!(substitute_global("{item.title} x", &p, &config), "{item.title} x");
        assert_eq!(substitute_global("{TOTAL_SUM}", &p, &config), "{TOTAL_SUM}");
        assert_eq!(substitute_global("{ TOTAL_SUM }", &p, &config), "{ TOTAL_SUM }");
        // A header field named like the marker body is still reachable by its path
        assert_eq!(substitute_global("{header.items}", &p, &config), "collide");
    }

    #[test]
    fn test_global_is_single_pass() {
        let p = Payload::from_value(json!({"header": {"a": "{header.b}", "b": "x"}})).unwrap();
        let config = RenderConfig::default();
        assert_eq!(substitute_global("{header.a}", &p, &config), "{header.b}");
    }

    #[test]
    fn test_text_without_tokens_is_borrowed() {
        let config = RenderConfig::default();
        let out = substitute_global("plain text {", &payload(), &config);
        assert!(matches!(out, Cow::Borrowed(_)));
        let out = substitute_item("nothing here", &json!({}), &config);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert!(!has_tokens("{}"));
        assert!(has_tokens("a {b} c"));
    }

    #[test]
    fn test_item_substitution() {
        let config = RenderConfig::default();
        let item = json!({"title": "Design", "desc": "line1\nline2", "qty": 2, "meta": {"code": "D-1"}});
        assert_eq!(substitute_item("{item.title}", &item, &config), "Design");
        assert_eq!(substitute_item("{item.desc}", &item, &config), "line1\nline2");
        assert_eq!(substitute_item("{item.meta.code}", &item, &config), "D-1");
        assert_eq!(substitute_item("{item.qty} x {item.unit_price}", &item, &config), "2 x 0");
        assert_eq!(substitute_item("[{item.note}]", &item, &config), "[]");
        assert_eq!(substitute_item("{header.client}", &item, &config), "{header.client}");
    }

    #[test]
    fn test_custom_item_prefix() {
        let mut config = RenderConfig::default();
        config.markers.item_prefix = "row".to_string();
        let item = json!({"title": "X"});
        assert_eq!(substitute_item("{row.title}/{item.title}", &item, &config), "X/{item.title}");
        let p = payload();
        assert_eq!(substitute_global("{row.title}", &p, &config), "{row.title}");
    }
}

//! Internationalization (i18n) module.
//!
//! Message catalog embedded at compile time. Keys use dot notation
//! (`"download.processing"`), values may contain `{placeholder}`s that the
//! caller replaces.

use std::sync::OnceLock;

use serde_json::Value;
use tracing::warn;

static CATALOG: OnceLock<Value> = OnceLock::new();

fn catalog() -> &'static Value {
    CATALOG.get_or_init(|| {
        serde_json::from_str(include_str!("en.json")).unwrap_or_else(|e| {
            warn!("Message catalog is malformed: {}", e);
            Value::Null
        })
    })
}

/// Load the catalog eagerly so a broken file shows up at startup.
pub fn init() {
    let _ = catalog();
}

/// Get text for a key. Unknown keys resolve to the key itself.
pub fn get_text(key: &str) -> String {
    resolve_key(catalog(), key).unwrap_or_else(|| key.to_string())
}

fn resolve_key(val: &Value, key: &str) -> Option<String> {
    let mut current = val;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    current.as_str().map(|s| s.to_string())
}

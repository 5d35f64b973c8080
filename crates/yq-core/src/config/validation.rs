//! Settings validation - warns about unknown fields

use serde_json::{Map, Value};
use tracing::warn;

use super::Settings;

/// Warn about fields in a settings file that `Settings` does not read.
///
/// Default settings serialize every field, optional ones as `null`, so
/// their JSON shape lists all known sections and keys.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    let Ok(Value::Object(found)) = serde_json::from_str::<Value>(content) else {
        return;
    };
    let Ok(Value::Object(known)) = serde_json::to_value(Settings::default()) else {
        return;
    };

    for path in unknown_paths(&found, &known) {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

/// Paths like `scroll.speed` for keys missing from `known`. Settings are
/// sections of flat fields, so only two levels are compared.
fn unknown_paths(found: &Map<String, Value>, known: &Map<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    for (section, value) in found {
        match (known.get(section), value) {
            (None, _) => paths.push(section.clone()),
            (Some(Value::Object(fields)), Value::Object(given)) => paths.extend(
                given
                    .keys()
                    .filter(|key| !fields.contains_key(*key))
                    .map(|key| format!("{section}.{key}")),
            ),
            _ => {}
        }
    }
    paths
}

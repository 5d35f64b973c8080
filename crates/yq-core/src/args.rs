//! Flat argument maps collected from container attributes, callbacks and forms.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix of every configuration attribute on a container.
pub const ATTR_PREFIX: &str = "data-yq-";

/// Data returned by a host callback.
pub type CallbackData = Map<String, Value>;

/// Flat string configuration for one handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(BTreeMap<String, String>);

impl Args {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `data-yq-*` attributes, translating `data-yq-suggest-count` to `suggest_count`.
    pub fn from_attributes<'a, I>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        attributes
            .into_iter()
            .filter_map(|(name, value)| attr_key(name).map(|key| (key, value.to_string())))
            .collect()
    }

    /// Convert callback data into string arguments. Values that have no
    /// string form (null, objects) are skipped.
    #[must_use]
    pub fn from_callback(data: &CallbackData) -> Self {
        data.iter()
            .filter_map(|(key, value)| value_to_arg(value).map(|v| (key.clone(), v)))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Value of `key` when present and non-empty.
    #[must_use]
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// Whether `key` is present and not `false`, `0` or empty.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy_flag)
    }

    /// Overlay `other` onto `self`; keys in `other` win.
    pub fn merge(&mut self, other: &Args) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Args {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Translate an attribute name into an argument key.
#[must_use]
pub fn attr_key(name: &str) -> Option<String> {
    name.strip_prefix(ATTR_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(|rest| rest.replace('-', "_"))
}

/// Split a multi-value argument on `|` when any pipe is present, otherwise on `,`.
#[must_use]
pub fn split(subject: &str) -> Vec<String> {
    let separator = if subject.contains('|') { '|' } else { ',' };
    subject.split(separator).map(str::to_string).collect()
}

/// Parse the leading integer of a string, ignoring trailing garbage
/// (`"300px"` is 300). Returns `None` when no digits lead the string.
#[must_use]
pub fn parse_leading_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Attribute flags count as off when `false`, `0` or empty.
#[must_use]
pub fn is_truthy_flag(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

/// Truthiness of a callback value: null, `false`, zero and `""` are falsy.
#[must_use]
pub fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a scalar callback value. Arrays are joined with `|`.
#[must_use]
pub fn value_to_arg(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(value_to_arg)
                .collect::<Vec<_>>()
                .join("|"),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// List form of a callback value. Strings go through [`split`].
#[must_use]
pub fn value_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(value_to_arg).collect()),
        Value::String(s) => Some(split(s)),
        Value::Number(_) | Value::Bool(_) => value_to_arg(value).map(|v| vec![v]),
        Value::Null | Value::Object(_) => None,
    }
}

/// Form field names that all carry the search text.
pub const SEARCH_FIELD_ALIASES: &[&str] = &["search", "s", "q", "query"];

#[must_use]
pub fn normalize_form_key(name: &str) -> &str {
    if SEARCH_FIELD_ALIASES.contains(&name) {
        "search"
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_prefers_pipes() {
        assert_eq!(split("a|b|c"), vec!["a", "b", "c"]);
        assert_eq!(split("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split("a,b|c"), vec!["a,b", "c"]);
        assert_eq!(split("solo"), vec!["solo"]);
    }

    #[test]
    fn test_attr_key_translation() {
        assert_eq!(attr_key("data-yq-suggest-count").as_deref(), Some("suggest_count"));
        assert_eq!(attr_key("data-yq-count").as_deref(), Some("count"));
        assert_eq!(attr_key("data-yq-"), None);
        assert_eq!(attr_key("data-other"), None);
        assert_eq!(attr_key("class"), None);
    }

    #[test]
    fn test_from_attributes_skips_foreign_attributes() {
        let args = Args::from_attributes([
            ("id", "youneeq"),
            ("data-yq-observe", "true"),
            ("data-yq-content-id", "42"),
        ]);
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("content_id"), Some("42"));
        assert!(args.flag("observe"));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base: Args = [("count", "3"), ("domain", "a.com")].into_iter().collect();
        let attrs: Args = [("count", "5")].into_iter().collect();
        base.merge(&attrs);
        assert_eq!(base.get("count"), Some("5"));
        assert_eq!(base.get("domain"), Some("a.com"));
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("300"), Some(300));
        assert_eq!(parse_leading_int(" 42px"), Some(42));
        assert_eq!(parse_leading_int("-7"), Some(-7));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn test_truthy_flags() {
        assert!(is_truthy_flag("true"));
        assert!(is_truthy_flag("yes"));
        assert!(!is_truthy_flag("false"));
        assert!(!is_truthy_flag("FALSE"));
        assert!(!is_truthy_flag("0"));
        assert!(!is_truthy_flag(""));
    }

    #[test]
    fn test_value_truthy() {
        assert!(!value_truthy(&json!(null)));
        assert!(!value_truthy(&json!(0)));
        assert!(!value_truthy(&json!("")));
        assert!(!value_truthy(&json!(false)));
        assert!(value_truthy(&json!("0")));
        assert!(value_truthy(&json!(5)));
        assert!(value_truthy(&json!([])));
    }

    #[test]
    fn test_callback_values() {
        let data = json!({
            "count": 4,
            "categories": ["news", "sports"],
            "personalized": true,
            "nested": {"a": 1},
            "nothing": null
        });
        let args = Args::from_callback(data.as_object().unwrap());
        assert_eq!(args.get("count"), Some("4"));
        assert_eq!(args.get("categories"), Some("news|sports"));
        assert_eq!(args.get("personalized"), Some("true"));
        assert!(!args.contains("nested"));
        assert!(!args.contains("nothing"));

        assert_eq!(value_list(&json!("a|b")), Some(vec!["a".into(), "b".into()]));
        assert_eq!(value_list(&json!(["x", 2])), Some(vec!["x".into(), "2".into()]));
        assert_eq!(value_list(&json!(null)), None);
    }

    #[test]
    fn test_normalize_form_key() {
        for alias in SEARCH_FIELD_ALIASES {
            assert_eq!(normalize_form_key(alias), "search");
        }
        assert_eq!(normalize_form_key("orderBy"), "orderBy");
    }
}

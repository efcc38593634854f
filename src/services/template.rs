//! `{{ path }}` placeholder substitution over an event's field bag.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

use crate::domain::models::TriggerEvent;

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").ok())
        .as_ref()
}

/// Replace recognized placeholders with event values.
///
/// Strings are inserted verbatim, other JSON values serialized. `{{source}}`
/// falls back to the event source. Unknown placeholders are left untouched.
pub fn substitute_template(template: &str, event: &TriggerEvent) -> String {
    let Some(pattern) = placeholder_pattern() else {
        return template.to_string();
    };
    pattern
        .replace_all(template, |caps: &Captures<'_>| {
            let path = &caps[1];
            match event.lookup(path) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None if path == "source" => event.source.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_known_fields() {
        let event = TriggerEvent::new("gmail")
            .with_field("subject", "Invoice #42")
            .with_field("from", json!({"address": "billing@acme.test"}))
            .with_field("amount", json!(12.5));

        let out = substitute_template("{{subject}} from {{ from.address }} for {{amount}} via {{source}}", &event);
        assert_eq!(out, "Invoice #42 from billing@acme.test for 12.5 via gmail");
    }

    #[test]
    fn test_unknown_placeholders_stay_verbatim() {
        let event = TriggerEvent::new("gmail");
        assert_eq!(substitute_template("Hi {{ name }} {{", &event), "Hi {{ name }} {{");
    }
}

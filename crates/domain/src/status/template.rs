use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("Invalid regex"));

/// Interpolate `{{key}}` placeholders from `context`.
///
/// Strings are inserted without quotes, other values as JSON.
/// Placeholders with no matching key are left verbatim.
pub fn render_template(template: &str, context: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match context.get(&caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_render_strings_and_numbers() {
        let context = ctx(json!({"host": "10.0.0.1", "port": 53000}));
        assert_eq!(
            render_template("reach {{host}}:{{port}}", &context),
            "reach 10.0.0.1:53000"
        );
    }

    #[test]
    fn test_unresolved_placeholder_left_verbatim() {
        let context = ctx(json!({"uri": "ws://x"}));
        assert_eq!(
            render_template("{{uri}} ({{reason}})", &context),
            "ws://x ({{reason}})"
        );
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let context = ctx(json!({"name": "cam"}));
        assert_eq!(render_template("{{ name }}!", &context), "cam!");
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(render_template("plain text", &Map::new()), "plain text");
    }
}

//! Walks heterogeneous value trees and escapes leaf strings without quoting
//! or HTML-escaping them (§4.4).
//!
//! Recognized node kinds: boolean (pass-through), string (escaped), mapping
//! of string→string (each value escaped), mapping of string→any (recursed).
//! Other kinds (numbers, arrays, null) are returned unchanged with a debug
//! note — Dynatrace settings payloads keep those leaves byte-identical.

use serde_json::Value as JsonValue;
use tracing::debug;

/// Recursively applies `escape` to every string leaf of `value`, per the
/// node-kind rules above.
#[must_use]
pub fn escape_leaves(value: &JsonValue, escape: &dyn Fn(&str) -> String) -> JsonValue {
    match value {
        JsonValue::Bool(b) => JsonValue::Bool(*b),
        JsonValue::String(s) => JsonValue::String(escape(s)),
        JsonValue::Object(map) => {
            if !map.is_empty() && map.values().all(JsonValue::is_string) {
                let escaped = map
                    .iter()
                    .map(|(k, v)| (k.clone(), JsonValue::String(escape(v.as_str().unwrap_or_default()))))
                    .collect();
                JsonValue::Object(escaped)
            } else {
                let recursed = map.iter().map(|(k, v)| (k.clone(), escape_leaves(v, escape))).collect();
                JsonValue::Object(recursed)
            }
        }
        other => {
            debug!(kind = ?other, "value escaper left non-recognized node kind unchanged");
            other.clone()
        }
    }
}

/// "JSON-safe without HTML-escape": serializes `s` as a JSON string and
/// strips the surrounding quotes. Interior quotes/backslashes/newlines are
/// JSON-escaped; `<`, `>`, `&` are left untouched, since `serde_json` never
/// HTML-escapes (unlike e.g. a browser-targeted JSON encoder).
#[must_use]
pub fn json_safe_escape(s: &str) -> String {
    let quoted = serde_json::to_string(s).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

/// Wraps literal `{{` / `}}` pairs in rendered template output so a
/// downstream (Go-style) templating engine re-interpreting the string emits
/// the original literal braces instead of treating them as an action.
#[must_use]
pub fn sanitize_template_braces(s: &str) -> String {
    s.replace("{{", "{{`{{`}}").replace("}}", "{{`}}`}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn html_characters_are_preserved() {
        let input = "Real world example: [8/5] Disk space available < 15% (/media/datastore)";
        assert_eq!(json_safe_escape(input), input);
    }

    #[test]
    fn quotes_are_json_escaped() {
        let input = r#"string """ with "double quotes""#;
        assert_eq!(json_safe_escape(input), r#"string \"\"\" with \"double quotes\""#);
    }

    #[test]
    fn decoded_escape_round_trips_to_original() {
        for s in ["a\nb", "tab\there", "back\\slash", "quote\"here", "<html>&amp;"] {
            let escaped = json_safe_escape(s);
            let wrapped = format!("\"{escaped}\"");
            let decoded: String = serde_json::from_str(&wrapped).unwrap();
            assert_eq!(decoded, s);
        }
    }

    #[test]
    fn bool_passes_through() {
        let v = json!(true);
        assert_eq!(escape_leaves(&v, &json_safe_escape), v);
    }

    #[test]
    fn string_to_string_map_escapes_each_value() {
        let v = json!({"a": "x<y", "b": "\"q\""});
        let escaped = escape_leaves(&v, &json_safe_escape);
        assert_eq!(escaped["a"], "x<y");
        assert_eq!(escaped["b"], "\\\"q\\\"");
    }

    #[test]
    fn nested_map_recurses() {
        let v = json!({"outer": {"inner": "a\"b", "flag": true}});
        let escaped = escape_leaves(&v, &json_safe_escape);
        assert_eq!(escaped["outer"]["inner"], "a\\\"b");
        assert_eq!(escaped["outer"]["flag"], true);
    }

    #[test]
    fn numbers_and_arrays_pass_through_unchanged() {
        let v = json!({"n": 42, "list": [1, 2, 3]});
        let escaped = escape_leaves(&v, &json_safe_escape);
        assert_eq!(escaped, v);
    }

    #[test]
    fn brace_sanitizer_round_trips_balanced_braces() {
        let input = "hello {{name}}, you have {{count}} items";
        let sanitized = sanitize_template_braces(input);
        assert!(sanitized.contains("{{`{{`}}"));
        assert!(sanitized.contains("{{`}}`}}"));
    }
}

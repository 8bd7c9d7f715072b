//! Placeholder interpolation for workflow step parameters.
//!
//! Grammar: `${path}` where `path = segment ('.' segment)*` and a segment is
//! `[A-Za-z0-9_-]+`. The first segment is looked up with
//! [`WorkflowResults::lookup`]; later segments index into objects (by key)
//! or arrays (by position).
//!
//! - A string that is exactly one placeholder becomes the referenced value,
//!   type preserved.
//! - Placeholders embedded in longer text are spliced in as text: strings
//!   unquoted, anything else JSON-encoded.
//! - Objects and arrays are resolved recursively.
//!
//! Resolution is pure: the same value and results always give the same output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::errors::InterpolationError;
use super::workflow::WorkflowResults;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\}").expect("placeholder pattern")
});

/// Returns true if the value (or anything nested in it) holds a placeholder.
pub fn contains_placeholder(value: &Value) -> bool {
    match value {
        Value::String(s) => PLACEHOLDER.is_match(s),
        Value::Array(items) => items.iter().any(contains_placeholder),
        Value::Object(map) => map.values().any(contains_placeholder),
        _ => false,
    }
}

/// Placeholder paths referenced by a string, in order of appearance.
pub fn placeholder_paths(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Resolves every placeholder in a parameter map.
pub fn resolve_parameters(
    parameters: &Map<String, Value>,
    results: &WorkflowResults,
) -> Result<Map<String, Value>, InterpolationError> {
    parameters
        .iter()
        .map(|(k, v)| Ok((k.clone(), resolve_value(v, results)?)))
        .collect()
}

/// Resolves every placeholder in a JSON value.
pub fn resolve_value(value: &Value, results: &WorkflowResults) -> Result<Value, InterpolationError> {
    match value {
        Value::String(s) => resolve_string(s, results),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, results))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => resolve_parameters(map, results).map(Value::Object),
        other => Ok(other.clone()),
    }
}

fn resolve_string(text: &str, results: &WorkflowResults) -> Result<Value, InterpolationError> {
    if let Some(caps) = PLACEHOLDER.captures(text) {
        let whole = caps.get(0).map(|m| m.as_str().len()) == Some(text.len());
        if whole {
            let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            return resolve_path(path, results).cloned();
        }
    } else {
        return Ok(Value::String(text.to_string()));
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(text) {
        let (Some(full), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&text[last..full.start()]);
        match resolve_path(path.as_str(), results)? {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        last = full.end();
    }
    out.push_str(&text[last..]);
    Ok(Value::String(out))
}

/// Looks up a dotted path against workflow results.
pub fn resolve_path<'a>(
    path: &str,
    results: &'a WorkflowResults,
) -> Result<&'a Value, InterpolationError> {
    let unresolved = || InterpolationError::Unresolved(path.to_string());
    let mut segments = path.split('.');
    let head = segments.next().ok_or_else(unresolved)?;
    let mut current = results.lookup(head).ok_or_else(unresolved)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(unresolved)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn results() -> WorkflowResults {
        let mut r = WorkflowResults::new();
        r.insert("step1", json!({"X": 42, "name": "kaspa", "tags": ["a", "b"]}));
        r.insert("step2", json!("plain"));
        r
    }

    #[test]
    fn whole_placeholder_preserves_type() {
        let resolved = resolve_value(&json!("${X}"), &results()).unwrap();
        assert_eq!(resolved, json!(42));
    }

    #[test]
    fn step_id_and_field_path_resolve() {
        let r = results();
        assert_eq!(resolve_value(&json!("${step1.X}"), &r).unwrap(), json!(42));
        assert_eq!(resolve_value(&json!("${step2}"), &r).unwrap(), json!("plain"));
        assert_eq!(
            resolve_value(&json!("${step1.tags.1}"), &r).unwrap(),
            json!("b")
        );
    }

    #[test]
    fn embedded_placeholders_are_spliced_as_text() {
        let resolved =
            resolve_value(&json!("Token ${name} has score ${X}"), &results()).unwrap();
        assert_eq!(resolved, json!("Token kaspa has score 42"));
    }

    #[test]
    fn nested_structures_are_resolved() {
        let params = json!({"amount": "${X}", "meta": {"list": ["${name}", 1]}});
        let resolved = resolve_value(&params, &results()).unwrap();
        assert_eq!(resolved, json!({"amount": 42, "meta": {"list": ["kaspa", 1]}}));
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let err = resolve_value(&json!("${missing.field}"), &results()).unwrap_err();
        assert_eq!(err, InterpolationError::Unresolved("missing.field".to_string()));
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        let resolved = resolve_value(&json!("$ {not} one"), &results()).unwrap();
        assert_eq!(resolved, json!("$ {not} one"));
    }

    #[test]
    fn contains_placeholder_walks_nested_values() {
        assert!(contains_placeholder(&json!({"a": ["x", "${b}"]})));
        assert!(!contains_placeholder(&json!({"a": ["x", 1]})));
    }

    #[test]
    fn placeholder_paths_lists_references() {
        assert_eq!(placeholder_paths("${a} and ${b.c}"), vec!["a", "b.c"]);
    }

    proptest! {
        #[test]
        fn strings_without_placeholders_resolve_to_themselves(s in "[^$]*") {
            let resolved = resolve_value(&Value::String(s.clone()), &results()).unwrap();
            prop_assert_eq!(resolved, Value::String(s));
        }

        #[test]
        fn resolution_is_deterministic(n in any::<i64>(), prefix in "[a-z ]{1,10}") {
            let mut r = WorkflowResults::new();
            r.insert("s", json!({"n": n}));
            let input = json!(format!("{}${{n}}", prefix));

            let first = resolve_value(&input, &r).unwrap();
            let second = resolve_value(&input, &r).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first, json!(format!("{}{}", prefix, n)));
        }
    }
}

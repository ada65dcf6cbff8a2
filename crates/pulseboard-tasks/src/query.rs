//! Dot-path queries over JSON documents.
//!
//! Supported syntax: `a.b.c` for object keys, numeric components for array
//! indices, `#` for an array's length and `#.rest` to map `rest` over every
//! element. A literal dot inside a key is written `\.`.

use serde_json::Value;

/// Select the value at `path`, `None` when nothing matches
pub fn select(root: &Value, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    walk(root, &split_path(path))
}

/// Query a raw JSON body and render the match as display text.
///
/// Invalid JSON and missing paths both yield an empty string.
pub fn query_text(body: &str, path: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|root| select(&root, path))
        .map(|value| to_text(&value))
        .unwrap_or_default()
}

/// Strings render bare, null renders empty, anything else as compact JSON
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn split_path(path: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    parts
}

fn walk(value: &Value, parts: &[String]) -> Option<Value> {
    let Some((head, tail)) = parts.split_first() else {
        return Some(value.clone());
    };

    match value {
        Value::Array(items) if head == "#" => {
            if tail.is_empty() {
                Some(Value::from(items.len()))
            } else {
                Some(Value::Array(items.iter().filter_map(|item| walk(item, tail)).collect()))
            }
        }
        Value::Array(items) => walk(items.get(head.parse::<usize>().ok()?)?, tail),
        Value::Object(fields) => walk(fields.get(head.as_str())?, tail),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_nested_keys_and_indices() {
        let doc = json!({"data": {"items": [{"name": "a"}, {"name": "b"}]}, "ok": true, "n": 12});

        assert_eq!(select(&doc, "data.items.1.name"), Some(json!("b")));
        assert_eq!(select(&doc, "data.items.#"), Some(json!(2)));
        assert_eq!(select(&doc, "data.items.#.name"), Some(json!(["a", "b"])));
        assert_eq!(select(&doc, "data.missing"), None);
        assert_eq!(select(&doc, ""), None);
    }

    #[test]
    fn test_escaped_dot() {
        let doc = json!({"version.full": "1.2.3"});
        assert_eq!(select(&doc, r"version\.full"), Some(json!("1.2.3")));
    }

    #[test]
    fn test_query_text_rendering() {
        let body = r#"{"status": "green", "count": 4, "flag": false, "none": null, "obj": {"a": 1}}"#;

        assert_eq!(query_text(body, "status"), "green");
        assert_eq!(query_text(body, "count"), "4");
        assert_eq!(query_text(body, "flag"), "false");
        assert_eq!(query_text(body, "none"), "");
        assert_eq!(query_text(body, "obj"), r#"{"a":1}"#);
        assert_eq!(query_text("not json", "status"), "");
    }
}

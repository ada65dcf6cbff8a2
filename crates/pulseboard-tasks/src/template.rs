//! Small `{{ .Field }}` substitution templates.
//!
//! Rendering never fails: any syntax or lookup error yields the template
//! unchanged, since malformed user templates are ordinary input.

use serde::Serialize;
use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Render `template` against the fields of `data`, or echo it back on error
pub fn render<T: Serialize>(template: &str, data: &T) -> String {
    try_render(template, data).unwrap_or_else(|| template.to_string())
}

fn try_render<T: Serialize>(template: &str, data: &T) -> Option<String> {
    let fields = match serde_json::to_value(data).ok()? {
        Value::Object(fields) => fields,
        _ => return None,
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after.find(CLOSE)?;
        let name = field_name(&after[..end])?;
        match fields.get(name)? {
            Value::String(s) => out.push_str(s),
            Value::Number(n) => out.push_str(&n.to_string()),
            Value::Bool(b) => out.push_str(&b.to_string()),
            _ => return None,
        }
        rest = &after[end + CLOSE.len()..];
    }
    out.push_str(rest);
    Some(out)
}

/// `" .Name "` -> `"Name"`
fn field_name(action: &str) -> Option<&str> {
    let name = action.trim().strip_prefix('.')?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct CacheBust {
        cache_key: u64,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Item {
        #[serde(rename = "ID")]
        id: u32,
        date: String,
    }

    #[test]
    fn test_renders_fields() {
        let rendered = render("https://cam.example.org/still.jpg?{{ .CacheKey }}", &CacheBust { cache_key: 42 });
        assert_eq!(rendered, "https://cam.example.org/still.jpg?42");

        let item = Item { id: 3, date: "Mon, 02 Jan 2006".into() };
        assert_eq!(render("#{{.ID}} at {{ .Date }}", &item), "#3 at Mon, 02 Jan 2006");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("no actions here }}", &CacheBust { cache_key: 1 }), "no actions here }}");
    }

    #[test]
    fn test_errors_echo_template() {
        let data = CacheBust { cache_key: 1 };
        for template in ["unclosed {{ .CacheKey", "{{ CacheKey }}", "{{ .Missing }}", "{{ . }}", "{{ .Cache-Key }}"] {
            assert_eq!(render(template, &data), template);
        }
    }
}

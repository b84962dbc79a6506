//! `{{dotted.path}}` interpolation for command declarations.

use serde_json::Value;

/// Parameters interpolated into command definitions, descriptions and
/// value bindings.
#[derive(Debug, Clone, Default)]
pub struct Template {
    params: Value,
}

impl Template {
    pub fn new(params: Value) -> Self {
        Self { params }
    }

    /// Replaces every `{{path}}` in `text`. Unknown paths render as empty.
    pub fn render(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("{{") {
            let Some(len) = rest[start + 2..].find("}}") else {
                break;
            };
            out.push_str(&rest[..start]);
            let path = rest[start + 2..start + 2 + len].trim();
            out.push_str(&self.lookup(path));
            rest = &rest[start + 2 + len + 2..];
        }
        out.push_str(rest);
        out
    }

    /// Renders every string inside `value`.
    pub fn render_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.render(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.render_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.render_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    fn lookup(&self, path: &str) -> String {
        let found = path
            .split('.')
            .try_fold(&self.params, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            });
        match found {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Template {
        Template::new(json!({
            "abstract": { "name": "mii", "content": "miiii" },
            "count": 3,
            "list": ["a", "b"],
        }))
    }

    #[test]
    fn test_render_paths() {
        let t = template();
        assert_eq!(t.render("{{abstract.name}}"), "mii");
        assert_eq!(t.render("say {{ abstract.content }} x{{count}}"), "say miiii x3");
        assert_eq!(t.render("{{list.1}}"), "b");
    }

    #[test]
    fn test_unknown_and_unterminated() {
        let t = template();
        assert_eq!(t.render("[{{missing.path}}]"), "[]");
        assert_eq!(t.render("open {{abstract.name"), "open {{abstract.name");
    }

    #[test]
    fn test_render_value_recurses() {
        let t = template();
        assert_eq!(
            t.render_value(json!({ "a": ["{{abstract.name}}", 1] })),
            json!({ "a": ["mii", 1] })
        );
    }
}

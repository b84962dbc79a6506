//! Declaration syntax for command arguments and options.
//!
//! Commands are declared the way chat users type them:
//!
//! ```text
//! echo <content:text> [times:integer]
//! -c, --content <content:string>  message to send
//! ```
//!
//! `<..>` marks a required value, `[..]` an optional one; the part after the
//! colon selects the [`ArgType`] used to convert the raw token.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Value type of an argument or option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    /// Consumes the rest of the input as one string.
    Text,
    Number,
    Integer,
    Posint,
    Boolean,
}

impl ArgType {
    fn parse(name: &str) -> Self {
        match name {
            "text" => Self::Text,
            "number" => Self::Number,
            "integer" | "int" => Self::Integer,
            "posint" => Self::Posint,
            "boolean" | "bool" => Self::Boolean,
            _ => Self::String,
        }
    }

    /// Converts a raw token, returning `None` when it does not fit the type.
    pub fn convert(self, raw: &str) -> Option<Value> {
        match self {
            Self::String | Self::Text => Some(Value::String(raw.to_owned())),
            Self::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::Integer => raw.parse::<i64>().ok().map(Value::from),
            Self::Posint => raw.parse::<u64>().ok().filter(|n| *n > 0).map(Value::from),
            Self::Boolean => match raw {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

/// A declared value slot: `<name:type>` or `[name:type]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDecl {
    pub name: String,
    pub ty: ArgType,
    pub required: bool,
}

impl ValueDecl {
    /// Parses a single `<name:type>` / `[name:type]` token.
    pub fn parse(token: &str) -> Option<Self> {
        let (inner, required) = if let Some(rest) = token.strip_prefix('<') {
            (rest.strip_suffix('>')?, true)
        } else if let Some(rest) = token.strip_prefix('[') {
            (rest.strip_suffix(']')?, false)
        } else {
            return None;
        };
        let inner = inner.trim_start_matches("...");
        let (name, ty) = match inner.split_once(':') {
            Some((name, ty)) => (name, ArgType::parse(ty)),
            None => (inner, ArgType::String),
        };
        Some(Self {
            name: name.to_owned(),
            ty,
            required,
        })
    }

    fn render(&self) -> String {
        let body = match self.ty {
            ArgType::String => self.name.clone(),
            ty => format!(
                "{}:{}",
                self.name,
                serde_json::to_value(ty)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default()
            ),
        };
        if self.required {
            format!("<{body}>")
        } else {
            format!("[{body}]")
        }
    }
}

/// Splits a command definition into its name and positional declarations.
pub fn parse_definition(def: &str) -> (String, Vec<ValueDecl>) {
    let mut parts = def.split_whitespace();
    let name = parts.next().unwrap_or_default().to_owned();
    let args = parts.filter_map(ValueDecl::parse).collect();
    (name, args)
}

/// Extra settings attached to an option declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionConfig {
    /// Value used when the option is not given.
    pub fallback: Option<Value>,
    /// Hide the option from help output.
    pub hidden: bool,
}

/// A declared command option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDecl {
    pub name: String,
    pub short: Vec<char>,
    pub long: Vec<String>,
    /// `None` for boolean flags.
    pub value: Option<ValueDecl>,
    pub description: String,
    pub config: OptionConfig,
}

impl OptionDecl {
    /// Parses `desc` (e.g. `"-c <content:string> message to send"`).
    ///
    /// `--<name>` is always accepted in addition to the declared aliases.
    pub fn parse(name: &str, desc: &str, config: OptionConfig) -> Self {
        let mut short = Vec::new();
        let mut long = vec![name.to_owned()];
        let mut value = None;
        let mut description = Vec::new();

        for token in desc.split_whitespace() {
            let token = token.trim_end_matches(',');
            if !description.is_empty() {
                description.push(token);
            } else if let Some(l) = token.strip_prefix("--") {
                if !long.iter().any(|x| x == l) {
                    long.push(l.to_owned());
                }
            } else if let Some(s) = token.strip_prefix('-').filter(|s| !s.is_empty()) {
                short.extend(s.chars());
            } else if let Some(decl) = ValueDecl::parse(token).filter(|_| value.is_none()) {
                value = Some(decl);
            } else {
                description.push(token);
            }
        }

        Self {
            name: name.to_owned(),
            short,
            long,
            value,
            description: description.join(" "),
            config,
        }
    }

    pub(crate) fn matches_long(&self, flag: &str) -> bool {
        self.long.iter().any(|l| l == flag)
    }

    pub(crate) fn matches_short(&self, flag: char) -> bool {
        self.short.contains(&flag)
    }

    /// Renders the option for help output.
    pub fn render(&self) -> String {
        let mut flags: Vec<String> = self.short.iter().map(|c| format!("-{c}")).collect();
        flags.extend(self.long.iter().map(|l| format!("--{l}")));
        let mut line = flags.join(", ");
        if let Some(value) = &self.value {
            line.push(' ');
            line.push_str(&value.render());
        }
        if !self.description.is_empty() {
            line.push_str("  ");
            line.push_str(&self.description);
        }
        line
    }
}

pub(crate) fn render_args(args: &[ValueDecl]) -> String {
    args.iter().map(ValueDecl::render).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definition() {
        let (name, args) = parse_definition("echo <content:text> [times:integer]");
        assert_eq!(name, "echo");
        assert_eq!(args.len(), 2);
        assert_eq!(args[0].ty, ArgType::Text);
        assert!(args[0].required);
        assert_eq!(args[1].ty, ArgType::Integer);
        assert!(!args[1].required);
    }

    #[test]
    fn test_parse_option() {
        let opt = OptionDecl::parse("content", "-c <content:string> text to echo", OptionConfig::default());
        assert_eq!(opt.short, vec!['c']);
        assert_eq!(opt.long, vec!["content"]);
        assert_eq!(opt.value.as_ref().map(|v| v.ty), Some(ArgType::String));
        assert_eq!(opt.description, "text to echo");
        assert_eq!(opt.render(), "-c, --content <content>  text to echo");
    }

    #[test]
    fn test_parse_flag_option() {
        let opt = OptionDecl::parse("loud", "-l, --shout", OptionConfig::default());
        assert!(opt.value.is_none());
        assert!(opt.matches_long("shout"));
        assert!(opt.matches_long("loud"));
        assert!(opt.matches_short('l'));
    }

    #[test]
    fn test_convert() {
        assert_eq!(ArgType::Integer.convert("42"), Some(Value::from(42)));
        assert_eq!(ArgType::Posint.convert("0"), None);
        assert_eq!(ArgType::Boolean.convert("no"), Some(Value::Bool(false)));
        assert_eq!(ArgType::Number.convert("x"), None);
    }
}

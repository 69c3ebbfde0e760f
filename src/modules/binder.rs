//! Schema-driven binding of untyped argument bags into typed parameters
//!
//! Every module declares a table of [`ArgumentSpec`] entries: the key it
//! accepts, the value type, whether it is required, and a setter that stores
//! the coerced value. Keys are matched case-insensitively, unknown keys are
//! rejected, and the bag itself is never modified.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use crate::modules::error::ConversionError;

/// Accepted value shape for a schema key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// A plain string
    Text,
    /// A string, or a list of strings joined with single spaces
    Command,
    /// A boolean, or a string parseable as one
    Flag,
    /// A list; non-string elements are stringified
    List,
    /// Octal file mode given as text (or as a bare integer of octal digits)
    FileMode,
}

impl ArgType {
    pub fn expected(&self) -> &'static str {
        match self {
            ArgType::Text => "string",
            ArgType::Command => "string or list",
            ArgType::Flag => "bool or string",
            ArgType::List => "list",
            ArgType::FileMode => "string",
        }
    }
}

/// A coerced argument value, shaped by its [`ArgType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundValue {
    Text(String),
    Flag(bool),
    List(Vec<String>),
    Mode(u32),
}

impl BoundValue {
    pub fn into_text(self) -> String {
        match self {
            BoundValue::Text(text) => text,
            BoundValue::List(items) => items.join(" "),
            BoundValue::Flag(flag) => flag.to_string(),
            BoundValue::Mode(mode) => format_file_mode(mode),
        }
    }

    pub fn into_flag(self) -> bool {
        matches!(self, BoundValue::Flag(true))
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            BoundValue::List(items) => items,
            BoundValue::Text(text) => vec![text],
            _ => Vec::new(),
        }
    }

    pub fn into_mode(self) -> u32 {
        match self {
            BoundValue::Mode(mode) => mode,
            _ => 0,
        }
    }
}

/// One row of a module's argument schema
pub struct ArgumentSpec<P> {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    pub description: &'static str,
    pub apply: fn(&mut P, BoundValue),
}

/// Printable view of a schema row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDoc {
    pub name: String,
    pub argument_type: String,
    pub required: bool,
    pub description: String,
}

impl<P> From<&ArgumentSpec<P>> for ArgumentDoc {
    fn from(spec: &ArgumentSpec<P>) -> Self {
        Self {
            name: spec.name.to_string(),
            argument_type: spec.ty.expected().to_string(),
            required: spec.required,
            description: spec.description.to_string(),
        }
    }
}

/// Bind `bag` onto `target` according to `schema`
pub fn bind<P>(
    kind: &str,
    schema: &[ArgumentSpec<P>],
    bag: &Value,
    mut target: P,
) -> Result<P, ConversionError> {
    let map = bag
        .as_object()
        .ok_or_else(|| ConversionError::InvalidArgumentBag {
            kind: kind.to_string(),
            got: type_name(bag).to_string(),
        })?;

    let mut seen: HashSet<&'static str> = HashSet::new();
    for (key, value) in map {
        debug!(
            "{}.{} -> type: {}",
            kind,
            key.to_lowercase(),
            type_name(value)
        );

        let spec = schema
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| ConversionError::UnknownArgument {
                kind: kind.to_string(),
                key: key.clone(),
            })?;

        if !seen.insert(spec.name) {
            return Err(ConversionError::DuplicateArgument {
                kind: kind.to_string(),
                key: spec.name.to_string(),
            });
        }

        let bound = coerce(kind, spec.name, spec.ty, value)?;
        if spec.required && bound == BoundValue::Text(String::new()) {
            // An empty required string counts as absent
            seen.remove(spec.name);
            continue;
        }
        (spec.apply)(&mut target, bound);
    }

    if let Some(missing) = schema
        .iter()
        .find(|spec| spec.required && !seen.contains(spec.name))
    {
        return Err(ConversionError::MissingRequiredArgument {
            kind: kind.to_string(),
            key: missing.name.to_string(),
        });
    }

    Ok(target)
}

fn coerce(
    kind: &str,
    key: &str,
    ty: ArgType,
    value: &Value,
) -> Result<BoundValue, ConversionError> {
    let mismatch = || ConversionError::ArgumentTypeMismatch {
        kind: kind.to_string(),
        key: key.to_string(),
        got: type_name(value).to_string(),
        want: ty.expected().to_string(),
    };
    let invalid = |text: &str, reason: &str| ConversionError::InvalidArgumentValue {
        kind: kind.to_string(),
        key: key.to_string(),
        value: text.to_string(),
        reason: reason.to_string(),
    };

    match (ty, value) {
        (ArgType::Text, Value::String(s)) => Ok(BoundValue::Text(s.clone())),
        (ArgType::Command, Value::String(s)) => Ok(BoundValue::Text(s.clone())),
        (ArgType::Command, Value::Array(items)) => {
            Ok(BoundValue::Text(stringify_all(items).join(" ")))
        }
        (ArgType::Flag, Value::Bool(b)) => Ok(BoundValue::Flag(*b)),
        (ArgType::Flag, Value::String(s)) => parse_bool(s)
            .map(BoundValue::Flag)
            .ok_or_else(|| invalid(s, "not a boolean")),
        (ArgType::List, Value::Array(items)) => Ok(BoundValue::List(stringify_all(items))),
        (ArgType::FileMode, Value::String(s)) => parse_file_mode(s)
            .map(BoundValue::Mode)
            .ok_or_else(|| invalid(s, "not an octal file mode")),
        (ArgType::FileMode, Value::Number(n)) => {
            let text = n.to_string();
            parse_file_mode(&text)
                .map(BoundValue::Mode)
                .ok_or_else(|| invalid(&text, "not an octal file mode"))
        }
        _ => Err(mismatch()),
    }
}

fn stringify_all(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

/// Name of a JSON value's type as reported in binding errors
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Boolean text accepted by flag arguments
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parse an octal file mode such as `0644`, `644` or `0o755`
pub fn parse_file_mode(text: &str) -> Option<u32> {
    let digits = text.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() || !digits.chars().all(|c| ('0'..='7').contains(&c)) {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}

pub fn format_file_mode(mode: u32) -> String {
    format!("{mode:04o}")
}

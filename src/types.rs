//! Item types: the coercion applied when a value is assigned to an item.

use std::fmt;

use serde_json::{Map, Number, Value};

/// Tokens that parse as `true` for [`ItemType::Bool`]. Anything else is `false`.
pub const TRUTHY: &[&str] = &["yes", "y", "yeah", "t", "true", "1", "yup", "on"];

/// A coercion function for custom item types.
pub type CoerceFn = fn(&Value) -> Result<Value, String>;

/// The type of an item: a value-coercion function.
///
/// `Null` passes through every coercion unchanged.
#[derive(Clone, Copy, Default)]
pub enum ItemType {
    /// Text. Non-string scalars are stringified.
    #[default]
    Str,
    Int,
    Float,
    /// Strings are matched against [`TRUTHY`], trimmed and case-insensitive.
    Bool,
    /// Arrays pass; strings are parsed as JSON arrays.
    List,
    /// Objects pass; strings are parsed as JSON objects.
    Dict,
    /// Passthrough, no coercion.
    Any,
    Custom { name: &'static str, coerce: CoerceFn },
}

impl ItemType {
    /// Look up a built-in type by the name used in `@type` metadata.
    pub fn from_name(name: &str) -> Option<ItemType> {
        match name {
            "str" | "string" => Some(ItemType::Str),
            "int" | "integer" => Some(ItemType::Int),
            "float" => Some(ItemType::Float),
            "bool" | "boolean" => Some(ItemType::Bool),
            "list" => Some(ItemType::List),
            "dict" => Some(ItemType::Dict),
            "any" => Some(ItemType::Any),
            _ => None,
        }
    }

    /// Infer the type of a declared scalar from its runtime shape.
    pub fn infer(value: &Value) -> ItemType {
        match value {
            Value::Bool(_) => ItemType::Bool,
            Value::Number(n) if n.is_f64() => ItemType::Float,
            Value::Number(_) => ItemType::Int,
            Value::Array(_) => ItemType::List,
            Value::Object(_) => ItemType::Dict,
            Value::String(_) | Value::Null => ItemType::Str,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ItemType::Str => "str",
            ItemType::Int => "int",
            ItemType::Float => "float",
            ItemType::Bool => "bool",
            ItemType::List => "list",
            ItemType::Dict => "dict",
            ItemType::Any => "any",
            ItemType::Custom { name, .. } => *name,
        }
    }

    /// Whether values of this type are text, in which case the raw textual
    /// form of an assignment does not need to be kept separately.
    pub fn is_textual(&self) -> bool {
        matches!(self, ItemType::Str)
    }

    /// Coerce `value` into this type.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            ItemType::Str => Ok(Value::String(display_value(value))),
            ItemType::Int => coerce_int(value),
            ItemType::Float => coerce_float(value),
            ItemType::Bool => Ok(Value::Bool(parse_bool_str(&display_value(value)))),
            ItemType::List => match value {
                Value::Array(_) => Ok(value.clone()),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Array(_)) => Ok(parsed),
                    _ => Err(format!("'{s}' is not a list")),
                },
                other => Err(format!("{other} is not a list")),
            },
            ItemType::Dict => match value {
                Value::Object(_) => Ok(value.clone()),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Object(_)) => Ok(parsed),
                    _ => Err(format!("'{s}' is not a dict")),
                },
                other => Err(format!("{other} is not a dict")),
            },
            ItemType::Any => Ok(value.clone()),
            ItemType::Custom { coerce, .. } => coerce(value),
        }
    }
}

impl PartialEq for ItemType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ItemType {}

impl fmt::Debug for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemType({})", self.name())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a boolean from text using the [`TRUTHY`] token set.
pub fn parse_bool_str(s: &str) -> bool {
    let token = s.trim().to_lowercase();
    TRUTHY.contains(&token.as_str())
}

/// Render a value as plain text: strings without quotes, `null` as empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                let f = n.as_f64().unwrap_or_default();
                Ok(Value::from(f.trunc() as i64))
            }
        }
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("'{s}' is not an integer: {e}")),
        other => Err(format!("{other} is not an integer")),
    }
}

fn coerce_float(value: &Value) -> Result<Value, String> {
    let f = match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("'{s}' is not a float: {e}"))?,
        other => return Err(format!("{other} is not a float")),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} cannot be represented"))
}

/// Build an object value from ordered pairs.
pub(crate) fn object<I: IntoIterator<Item = (String, Value)>>(pairs: I) -> Value {
    Value::Object(pairs.into_iter().collect::<Map<String, Value>>())
}

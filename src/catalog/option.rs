//! Filter option schemas.
//!
//! The engine describes option types with short strings (`"uint"`, `"dbl"`,
//! `"strl"`, ...). They are resolved once, at catalog load, into the closed
//! [`OptionKind`] set. Unknown type strings fail the load.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Engine type names rendered as numeric inputs
const NUMBER_TYPES: &[&str] = &[
    "uint", "sint", "luint", "lsint", "flt", "dbl", "uintl", "sintl",
];

/// Engine type names rendered as free text
const TEXT_TYPES: &[&str] = &[
    "str", "strl", "cstr", "4cc", "4ccl", "frac", "lfrac", "mem", "v2di", "v2d", "v3di", "v4di",
    "prop",
];

const BOOL_TYPES: &[&str] = &["bool"];

const FLOAT_TYPES: &[&str] = &["flt", "dbl"];

/// Separates options in a filter token; the engine has no escape for it
const OPTION_SEPARATOR: char = ':';

/// Resolved option kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionKind {
    Number,
    Text,
    Boolean,
    /// Allowed values, in catalog order
    Enum(Vec<String>),
}

impl OptionKind {
    /// Resolve a raw engine type. An enum map always wins over the raw type.
    pub fn resolve(type_name: &str, variants: Option<&BTreeMap<String, String>>) -> Option<Self> {
        if let Some(variants) = variants {
            return Some(OptionKind::Enum(variants.keys().cloned().collect()));
        }
        if type_name == "enum" {
            return Some(OptionKind::Enum(Vec::new()));
        }
        if NUMBER_TYPES.contains(&type_name) {
            Some(OptionKind::Number)
        } else if TEXT_TYPES.contains(&type_name) {
            Some(OptionKind::Text)
        } else if BOOL_TYPES.contains(&type_name) {
            Some(OptionKind::Boolean)
        } else {
            None
        }
    }
}

/// A concrete option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(OptionValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(OptionValue::Int)
                .or_else(|| n.as_f64().map(OptionValue::Float)),
            Value::String(s) => Some(OptionValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Int(i) => Value::from(*i),
            OptionValue::Float(f) => Value::from(*f),
            OptionValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::Text(s) => f.write_str(s),
        }
    }
}

/// Catalog representation of an option, as stored in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOptionSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, String>>,
}

/// Resolved option schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSchema {
    /// Raw engine type name, kept for display and re-serialization
    pub type_name: String,
    pub kind: OptionKind,
    pub description: String,
    pub default: Option<OptionValue>,
    /// Enum variant descriptions keyed by variant name
    pub variants: BTreeMap<String, String>,
}

impl OptionSchema {
    /// Returns `None` when the type cannot be resolved.
    pub fn resolve(raw: RawOptionSchema) -> Option<Self> {
        let kind = OptionKind::resolve(&raw.type_name, raw.variants.as_ref())?;
        Some(Self {
            type_name: raw.type_name,
            kind,
            description: raw.description,
            default: raw.default.as_ref().and_then(OptionValue::from_json),
            variants: raw.variants.unwrap_or_default(),
        })
    }

    pub fn to_raw(&self) -> RawOptionSchema {
        RawOptionSchema {
            type_name: self.type_name.clone(),
            description: self.description.clone(),
            default: self.default.as_ref().map(OptionValue::to_json),
            variants: if self.variants.is_empty() {
                None
            } else {
                Some(self.variants.clone())
            },
        }
    }

    /// Options the editor exposes: no default, or a default of `"none"`
    pub fn is_user_editable(&self) -> bool {
        match &self.default {
            None => true,
            Some(OptionValue::Text(s)) => s == "none",
            Some(_) => false,
        }
    }

    /// Whether `value` renders the same as the schema default
    pub fn is_default(&self, value: &OptionValue) -> bool {
        self.default
            .as_ref()
            .is_some_and(|d| d.to_string() == value.to_string())
    }

    /// Parse user input into a value of this option's kind.
    pub fn parse_value(&self, input: &str) -> Result<OptionValue, String> {
        let input = input.trim();
        if input.contains(OPTION_SEPARATOR) {
            return Err(format!(
                "'{}' contains the option separator '{}'",
                input, OPTION_SEPARATOR
            ));
        }
        match &self.kind {
            OptionKind::Boolean => match input.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(OptionValue::Bool(true)),
                "false" | "no" | "0" => Ok(OptionValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", input)),
            },
            OptionKind::Number => {
                if let Ok(i) = input.parse::<i64>() {
                    if FLOAT_TYPES.contains(&self.type_name.as_str()) {
                        return Ok(OptionValue::Float(i as f64));
                    }
                    return Ok(OptionValue::Int(i));
                }
                if let Ok(f) = input.parse::<f64>() {
                    return Ok(OptionValue::Float(f));
                }
                let is_list = input.contains(',')
                    && input.split(',').all(|p| p.trim().parse::<f64>().is_ok());
                if is_list {
                    Ok(OptionValue::Text(input.to_string()))
                } else {
                    Err(format!("'{}' is not a number", input))
                }
            }
            OptionKind::Enum(variants) => {
                if variants.is_empty() || variants.iter().any(|v| v == input) {
                    Ok(OptionValue::Text(input.to_string()))
                } else {
                    Err(format!("'{}' is not one of {:?}", input, variants))
                }
            }
            OptionKind::Text => Ok(OptionValue::Text(input.to_string())),
        }
    }
}

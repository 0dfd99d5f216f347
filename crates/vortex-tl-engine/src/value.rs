// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Variant tag of a template value, used as the dispatch key for formatters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` or `false`
    Bool,
    /// Any JSON number.
    Number,
    /// Text.
    String,
    /// Ordered list.
    Array,
    /// String-keyed map.
    Object,
}

impl ValueKind {
    /// Kind of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Lowercase name, as used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stringifies a value for output.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.to_string()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Absence is false, booleans are themselves, everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Coerces an operand of an arithmetic operator to an integer.
///
/// Numbers are truncated, strings are parsed as base-10 integers.
pub fn coerce_integer(value: &Value) -> Result<i64, Error> {
    let not_a_number = || Error::render(format!("argument is not a number: {value}"));
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(u) = n.as_u64() {
                Ok(u as i64)
            } else {
                n.as_f64().map(|f| f as i64).ok_or_else(not_a_number)
            }
        }
        Value::String(s) => s.parse::<i64>().map_err(|_| not_a_number()),
        _ => Err(not_a_number()),
    }
}

/// Signature of a value formatter: the value to render plus the optional
/// format argument given to `val`.
pub type Formatter = dyn Fn(&Value, Option<&str>) -> Result<String, Error> + Send + Sync;

/// Formatters keyed by [`ValueKind`].
#[derive(Clone, Default)]
pub struct FormatRegistry {
    map: Arc<HashMap<ValueKind, Arc<Formatter>>>,
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

impl FormatRegistry {
    /// Creates an empty registry; every value falls back to [`value_to_string`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts an empty [`FormatRegistryBuilder`].
    pub fn builder() -> FormatRegistryBuilder {
        FormatRegistryBuilder::new()
    }

    /// Formatter registered for `kind`.
    pub fn get(&self, kind: ValueKind) -> Option<Arc<Formatter>> {
        self.map.get(&kind).cloned()
    }

    /// Whether no formatter is registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Formats `value` with the formatter registered for its kind.
    pub fn format(&self, value: &Value, format: Option<&str>) -> Result<String, Error> {
        match self.map.get(&ValueKind::of(value)) {
            Some(formatter) => formatter(value, format),
            None => Ok(value_to_string(value)),
        }
    }
}

/// Collects formatters for a [`FormatRegistry`].
#[derive(Default)]
pub struct FormatRegistryBuilder {
    map: HashMap<ValueKind, Arc<Formatter>>,
}

impl FormatRegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the formatter for a value kind, replacing any previous one.
    pub fn register<F>(&mut self, kind: ValueKind, formatter: F) -> &mut Self
    where
        F: Fn(&Value, Option<&str>) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.map.insert(kind, Arc::new(formatter));
        self
    }

    /// Copies every formatter of `other`, replacing ones already registered.
    pub fn extend(&mut self, other: &FormatRegistry) -> &mut Self {
        for (kind, formatter) in other.map.iter() {
            self.map.insert(*kind, formatter.clone());
        }
        self
    }

    /// Freezes the builder into a shareable registry.
    pub fn build(self) -> FormatRegistry {
        FormatRegistry {
            map: Arc::new(self.map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_numbers_and_numeric_strings() {
        assert_eq!(coerce_integer(&json!(7)).unwrap(), 7);
        assert_eq!(coerce_integer(&json!(7.9)).unwrap(), 7);
        assert_eq!(coerce_integer(&json!("-12")).unwrap(), -12);
        let err = coerce_integer(&json!("twelve")).unwrap_err();
        assert!(err.to_string().contains("argument is not a number"));
        assert!(coerce_integer(&json!(true)).is_err());
        assert!(coerce_integer(&Value::Null).is_err());
    }

    #[test]
    fn truthiness_only_rejects_null_and_false() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(0)));
        assert!(is_truthy(&json!("")));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn registry_dispatches_on_kind() {
        let mut builder = FormatRegistry::builder();
        builder.register(ValueKind::String, |value, format| {
            let text = value_to_string(value);
            Ok(match format {
                Some("upper") => text.to_uppercase(),
                _ => text,
            })
        });
        let registry = builder.build();
        assert_eq!(registry.format(&json!("abc"), Some("upper")).unwrap(), "ABC");
        assert_eq!(registry.format(&json!(5), Some("upper")).unwrap(), "5");
    }
}

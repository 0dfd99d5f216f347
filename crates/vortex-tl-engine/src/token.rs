// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use serde_json::Value;

/// Constant token: a quoted string, an integer or a boolean keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    value: Value,
    source: String,
}

impl Literal {
    /// Tries string syntax, then integer, then boolean. Returns `None` when the
    /// text is none of these, in which case the caller treats it as a symbol.
    pub fn parse(source: &str) -> Option<Self> {
        let value = parse_string(source)
            .map(Value::String)
            .or_else(|| source.parse::<i64>().ok().map(Value::from))
            .or_else(|| match source {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            })?;
        Some(Self {
            value,
            source: source.to_string(),
        })
    }

    /// Parsed value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Text the literal was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn parse_string(source: &str) -> Option<String> {
    let mut chars = source.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if (first == '"' || first == '\'') && first == last {
        Some(source[1..source.len() - 1].to_string())
    } else {
        None
    }
}

/// Bare identifier resolved against the context at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Symbol called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Symbol name as written.
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// One directive argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A string, integer or boolean constant.
    Literal(Literal),
    /// A variable or operator name.
    Symbol(Symbol),
}

impl Argument {
    /// Builds a literal when possible, otherwise a symbol. Never fails.
    pub fn parse(source: &str) -> Self {
        match Literal::parse(source) {
            Some(literal) => Argument::Literal(literal),
            None => Argument::Symbol(Symbol::new(source)),
        }
    }

    /// Literal argument holding `value`.
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        let source = match &value {
            Value::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        };
        Argument::Literal(Literal { value, source })
    }

    /// Symbol argument called `name`.
    pub fn symbol(name: impl Into<String>) -> Self {
        Argument::Symbol(Symbol::new(name))
    }

    /// The symbol, if this argument is one.
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Argument::Symbol(symbol) => Some(symbol),
            Argument::Literal(_) => None,
        }
    }

    /// Returns true when this is the symbol `name`.
    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol().is_some_and(|symbol| symbol.name() == name)
    }

    /// Text as written in the template.
    pub fn source(&self) -> &str {
        match self {
            Argument::Literal(literal) => literal.source(),
            Argument::Symbol(symbol) => symbol.name(),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

/// Converts raw directive tokens into typed arguments.
pub fn parse_arguments<S: AsRef<str>>(tokens: &[S]) -> Vec<Argument> {
    tokens
        .iter()
        .map(|token| Argument::parse(token.as_ref()))
        .collect()
}

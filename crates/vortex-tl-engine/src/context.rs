// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::Error;
use crate::html;

static SYMBOL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_]([a-zA-Z0-9\-_]*[a-zA-Z0-9_])?$").expect("symbol name pattern is valid")
});

/// Name bound to the absence value in the root scope.
pub const NULL_NAME: &str = "null";

/// Reports whether `name` may be bound with [`Context::define`].
pub fn is_valid_name(name: &str) -> bool {
    name != NULL_NAME && SYMBOL_NAME.is_match(name)
}

/// Signature of the escaper used by [`Context::html_escape`].
pub type Escaper = fn(&str) -> String;

/// Stack of lexical scopes used while rendering one template.
///
/// The root frame is never popped and pre-binds `null` to the absence value.
/// A context is cheap to create; use a fresh one per render.
pub struct Context {
    frames: Vec<HashMap<String, Value>>,
    escaper: Escaper,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Context with only the root frame, holding `null`.
    pub fn new() -> Self {
        let mut root = HashMap::new();
        root.insert(NULL_NAME.to_string(), Value::Null);
        Self {
            frames: vec![root],
            escaper: html::escape,
        }
    }

    /// Builds a context whose root frame holds every entry of a JSON object.
    ///
    /// `null` yields an empty context; any other non-object is rejected.
    pub fn from_json(data: &Value) -> Result<Self, Error> {
        let mut ctx = Self::new();
        match data {
            Value::Null => {}
            Value::Object(map) => {
                for (name, value) in map {
                    ctx.define(name, value.clone(), false)?;
                }
            }
            other => {
                return Err(Error::render(format!(
                    "template data must be an object, got {}",
                    crate::value::ValueKind::of(other)
                )))
            }
        }
        Ok(ctx)
    }

    /// Replaces the HTML escaper used by `val` output.
    #[must_use]
    pub fn with_escaper(mut self, escaper: Escaper) -> Self {
        self.escaper = escaper;
        self
    }

    /// Escapes `input` with the configured escaper.
    pub fn html_escape(&self, input: &str) -> String {
        (self.escaper)(input)
    }

    /// Whether any frame binds `name`.
    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Looks `name` up from the innermost frame outwards.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Binds `name`.
    ///
    /// A local define binds in the innermost frame. A global define updates
    /// every frame that already binds `name`, so shadowed bindings all change
    /// together; when no frame binds it the binding is created in the root.
    pub fn define(&mut self, name: &str, value: Value, global: bool) -> Result<(), Error> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName {
                name: name.to_string(),
            });
        }

        if !global {
            if let Some(frame) = self.frames.last_mut() {
                frame.insert(name.to_string(), value);
            }
            return Ok(());
        }

        let mut found = false;
        for frame in &mut self.frames {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value.clone();
                found = true;
            }
        }
        if !found {
            self.frames[0].insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Opens a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Drops the innermost frame. Popping the root frame is an error.
    pub fn pop(&mut self) -> Result<(), Error> {
        if self.frames.len() <= 1 {
            return Err(Error::render("cannot pop the root scope"));
        }
        self.frames.pop();
        Ok(())
    }

    /// Number of frames, including the root.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

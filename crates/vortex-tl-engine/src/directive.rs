// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::parser::ParserState;
use crate::token::{Argument, Symbol};

/// One directive occurrence, e.g. `[list items item]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    name: String,
    args: Vec<Argument>,
    line: usize,
}

impl Directive {
    /// Directive `name` with parsed `args`, found on `line`.
    pub fn new(name: impl Into<String>, args: Vec<Argument>, line: usize) -> Self {
        Self {
            name: name.into(),
            args,
            line,
        }
    }

    /// Directive name, e.g. `list`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments following the name.
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// 1-based line of the opening bracket.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Parse error located at this directive.
    pub fn error(&self, message: impl fmt::Display) -> Error {
        Error::parse(format!("[{}]: {message}", self.name), self.line)
    }

    /// Fails unless the directive has no arguments.
    pub fn expect_no_args(&self) -> Result<(), Error> {
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(self.error("takes no arguments"))
        }
    }

    /// Fails unless the directive has at least `min` arguments.
    pub fn expect_min_args(&self, min: usize) -> Result<(), Error> {
        if self.args.len() < min {
            return Err(self.error(format!(
                "expected at least {min} argument{}, got {}",
                if min == 1 { "" } else { "s" },
                self.args.len()
            )));
        }
        Ok(())
    }

    /// Argument `index` as a symbol.
    pub fn symbol_arg(&self, index: usize) -> Result<&Symbol, Error> {
        let arg = self
            .args
            .get(index)
            .ok_or_else(|| self.error(format!("missing argument {}", index + 1)))?;
        arg.as_symbol().ok_or_else(|| {
            self.error(format!(
                "argument {} must be a symbol, got literal {}",
                index + 1,
                arg
            ))
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        f.write_str("]")
    }
}

/// Builds nodes for the directive names it owns.
pub trait DirectiveHandler: Send + Sync {
    /// Directive names dispatched to this handler.
    fn names(&self) -> &[&'static str];

    /// Applies `directive` to the parse state: opens or closes a block, or adds a node.
    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error>;
}

/// Hook run before every directive is dispatched.
pub type DirectiveValidator = dyn Fn(&Directive) -> Result<(), Error> + Send + Sync;

/// Maps directive names to handlers.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: Arc<HashMap<String, Arc<dyn DirectiveHandler>>>,
    unknown: Option<Arc<dyn DirectiveHandler>>,
    validator: Option<Arc<DirectiveValidator>>,
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("names", &self.names())
            .field("unknown", &self.unknown.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl DirectiveRegistry {
    /// Registry with no handlers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts an empty [`DirectiveRegistryBuilder`].
    pub fn builder() -> DirectiveRegistryBuilder {
        DirectiveRegistryBuilder::new()
    }

    /// Handler registered for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DirectiveHandler>> {
        self.handlers.get(name).cloned()
    }

    pub(crate) fn unknown_handler(&self) -> Option<Arc<dyn DirectiveHandler>> {
        self.unknown.clone()
    }

    pub(crate) fn validate(&self, directive: &Directive) -> Result<(), Error> {
        match &self.validator {
            Some(validator) => validator(directive),
            None => Ok(()),
        }
    }

    /// Sorted list of the registered directive names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Collects handlers for a [`DirectiveRegistry`].
#[derive(Default)]
pub struct DirectiveRegistryBuilder {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
    unknown: Option<Arc<dyn DirectiveHandler>>,
    validator: Option<Arc<DirectiveValidator>>,
}

impl DirectiveRegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under every name it declares.
    ///
    /// Fails without registering anything when one of the names is taken.
    pub fn register<H>(&mut self, handler: H) -> Result<&mut Self, Error>
    where
        H: DirectiveHandler + 'static,
    {
        let handler: Arc<dyn DirectiveHandler> = Arc::new(handler);
        if let Some(taken) = handler
            .names()
            .iter()
            .find(|name| self.handlers.contains_key(**name))
        {
            return Err(Error::parse(
                format!("directive {taken:?} is already registered"),
                0,
            ));
        }
        Ok(self.insert(handler))
    }

    /// Registers `handler` under every name it declares, replacing any
    /// handler already bound to one of them.
    pub fn replace<H>(&mut self, handler: H) -> &mut Self
    where
        H: DirectiveHandler + 'static,
    {
        self.insert(Arc::new(handler))
    }

    fn insert(&mut self, handler: Arc<dyn DirectiveHandler>) -> &mut Self {
        for name in handler.names() {
            self.handlers.insert((*name).to_string(), handler.clone());
        }
        self
    }

    /// Handler for directives whose name has no registered handler.
    pub fn unknown<H>(&mut self, handler: H) -> &mut Self
    where
        H: DirectiveHandler + 'static,
    {
        self.unknown = Some(Arc::new(handler));
        self
    }

    /// Hook run on every directive before its handler; an error aborts dispatch.
    pub fn validator<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&Directive) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Freezes the builder into a shareable registry.
    pub fn build(self) -> DirectiveRegistry {
        DirectiveRegistry {
            handlers: Arc::new(self.handlers),
            unknown: self.unknown,
            validator: self.validator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_arguments;

    struct Named(&'static [&'static str]);

    impl DirectiveHandler for Named {
        fn names(&self) -> &[&'static str] {
            self.0
        }

        fn handle(&self, _directive: &Directive, _state: &mut ParserState) -> Result<(), Error> {
            Ok(())
        }
    }

    #[test]
    fn rejects_duplicate_names_across_handlers() {
        let mut builder = DirectiveRegistry::builder();
        builder.register(Named(&["a", "b"])).unwrap();
        let err = builder.register(Named(&["c", "b"])).err().unwrap();
        assert!(err.to_string().contains("\"b\" is already registered"));

        let registry = builder.build();
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.get("c").is_none());
    }

    #[test]
    fn replace_overrides_taken_names() {
        let mut builder = DirectiveRegistry::builder();
        builder.register(Named(&["a", "b"])).unwrap();
        builder.replace(Named(&["b", "c"]));
        let registry = builder.build();
        assert_eq!(
            registry.names(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        let b = registry.get("b").unwrap();
        assert_eq!(b.names(), &["b", "c"]);
    }

    #[test]
    fn directive_argument_helpers() {
        let directive = Directive::new("capture", parse_arguments(&["'x'"]), 4);
        let err = directive.symbol_arg(0).unwrap_err();
        assert_eq!(err.line(), Some(4));
        assert!(err.to_string().contains("must be a symbol"));
        assert!(directive.expect_min_args(2).is_err());
        assert!(directive.expect_no_args().is_err());
        assert_eq!(directive.to_string(), "[capture 'x']");
    }
}

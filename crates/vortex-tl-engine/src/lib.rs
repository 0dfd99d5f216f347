#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Parser and renderer for Vortex templates.
//!
//! Templates mix literal text with bracketed directives:
//!
//! ```text
//! [!-- comments are dropped --]
//! [if user]Hello [val user][else]Hello stranger[endif]
//! [list items item][val _index]: [val item][endlist]
//! [#-- raw blocks pass through [untouched] --]
//! ```
//!
//! Parsing turns the source into an immutable tree of [`Node`]s that can be
//! shared between threads; each render gets its own [`Context`].

mod context;
mod directive;
pub mod directives;
mod error;
mod expression;
pub mod html;
pub mod lexer;
mod node;
mod parser;
pub mod telemetry;
mod token;
mod value;

pub use context::{is_valid_name, Context, Escaper, NULL_NAME};
pub use directive::{
    Directive, DirectiveHandler, DirectiveRegistry, DirectiveRegistryBuilder, DirectiveValidator,
};
pub use error::Error;
pub use expression::{Arity, Expression, Operator, OperatorFn, OperatorTable, Precedence};
pub use lexer::{Diagnostic, Flow, ParseNode};
pub use node::{Node, NodeList, TextNode};
pub use parser::{DirectiveState, ParseListener, ParseOptions, ParserState, TemplateParser};
pub use token::{parse_arguments, Argument, Literal, Symbol};
pub use value::{
    coerce_integer, is_truthy, value_to_string, FormatRegistry, FormatRegistryBuilder, Formatter,
    ValueKind,
};

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

/// A parsed template: its name, original source and node tree.
///
/// Cloning is cheap; the node tree is shared.
#[derive(Clone)]
pub struct Template {
    name: String,
    source: String,
    root: Arc<NodeList>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("nodes", &self.root.len())
            .finish()
    }
}

impl Template {
    /// Parses template source with the standard directives and operators.
    pub fn parse_str(name: &str, source: &str) -> Result<Self, Error> {
        TemplateParser::new().parse(name, source)
    }

    pub(crate) fn from_parts(name: &str, source: &str, root: NodeList) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            root: Arc::new(root),
        }
    }

    /// Name the template was parsed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level nodes.
    pub fn root(&self) -> &NodeList {
        &self.root
    }

    /// Renders into a string.
    pub fn render(&self, ctx: &mut Context) -> Result<String, Error> {
        let mut output = String::new();
        self.render_to(ctx, &mut output)?;
        Ok(output)
    }

    /// Renders into any [`fmt::Write`] sink.
    pub fn render_to(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        let started = Instant::now();
        let result = self.root.render(ctx, out);
        telemetry::record_render(&self.name, self.source.len(), started.elapsed(), result.is_ok());
        debug!(
            template = %self.name,
            nodes = self.root.len(),
            elapsed = ?started.elapsed(),
            ok = result.is_ok(),
            "rendered template"
        );
        result
    }

    /// Renders into an [`io::Write`] sink.
    pub fn render_to_writer<W: io::Write>(&self, ctx: &mut Context, writer: &mut W) -> Result<(), Error> {
        let mut adapter = IoAdapter {
            inner: writer,
            error: None,
        };
        match self.render_to(ctx, &mut adapter) {
            Err(err) => match adapter.error.take() {
                Some(io_err) => Err(Error::Render {
                    message: format!("failed to write template output: {io_err}"),
                    source: Some(Box::new(io_err)),
                    line: None,
                }),
                None => Err(err),
            },
            Ok(()) => Ok(()),
        }
    }

    /// Renders against the entries of a JSON object.
    pub fn render_json(&self, data: &Value) -> Result<String, Error> {
        let mut ctx = Context::from_json(data)?;
        self.render(&mut ctx)
    }
}

struct IoAdapter<'a, W: io::Write> {
    inner: &'a mut W,
    error: Option<io::Error>,
}

impl<W: io::Write> fmt::Write for IoAdapter<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|err| {
            self.error = Some(err);
            fmt::Error
        })
    }
}

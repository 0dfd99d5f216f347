// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::directive::{Directive, DirectiveRegistry};
use crate::directives;
use crate::error::Error;
use crate::expression::{Expression, OperatorTable};
use crate::lexer::{self, Diagnostic, Flow, ParseHandler};
use crate::node::{Node, NodeList, TextNode};
use crate::telemetry;
use crate::token::{parse_arguments, Argument};
use crate::Template;

/// Parser settings. Deserializable so hosts can keep them in their own config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Abort at the first diagnostic instead of collecting all of them.
    pub stop_on_first_error: bool,
    /// Maximum number of simultaneously open block directives.
    pub max_depth: Option<usize>,
    /// Treat `.` as a reserved tokenizing character inside directives.
    pub strict_tokens: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            stop_on_first_error: true,
            max_depth: None,
            strict_tokens: true,
        }
    }
}

impl ParseOptions {
    fn reserved(&self) -> &'static [char] {
        if self.strict_tokens {
            lexer::STRICT_RESERVED
        } else {
            lexer::RESERVED
        }
    }
}

/// An open block directive and the body collected for it so far.
#[derive(Debug)]
pub struct DirectiveState {
    directive: Directive,
    expression: Option<Expression>,
    body: NodeList,
    continues: bool,
}

impl DirectiveState {
    /// The directive that opened this frame.
    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// Expression compiled when the block was opened, if any.
    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// Nodes collected for the block so far.
    pub fn body(&self) -> &NodeList {
        &self.body
    }

    /// Whether this frame continues the block below it (`elseif`, `else`)
    /// rather than opening a new nesting level.
    pub fn continues(&self) -> bool {
        self.continues
    }

    /// Splits the frame into its directive, expression and body.
    pub fn into_parts(self) -> (Directive, Option<Expression>, NodeList) {
        (self.directive, self.expression, self.body)
    }
}

/// Mutable parse state handed to directive handlers.
///
/// Nodes added while a block is open go into that block's body; otherwise
/// they go into the template's top-level list.
#[derive(Debug)]
pub struct ParserState {
    root: NodeList,
    stack: Vec<DirectiveState>,
    operators: Arc<OperatorTable>,
    max_depth: Option<usize>,
}

impl ParserState {
    /// Empty state compiling expressions with `operators`; `max_depth` caps
    /// block nesting.
    pub fn new(operators: Arc<OperatorTable>, max_depth: Option<usize>) -> Self {
        Self {
            root: NodeList::new(),
            stack: Vec::new(),
            operators,
            max_depth,
        }
    }

    /// Appends `node` to the innermost open block, or to the top level.
    pub fn add(&mut self, node: Box<dyn Node>) {
        match self.stack.last_mut() {
            Some(top) => top.body.push(node),
            None => self.root.push(node),
        }
    }

    /// Opens a block for `directive`, one nesting level below the current one.
    pub fn push(&mut self, directive: Directive, expression: Option<Expression>) -> Result<(), Error> {
        if let Some(max) = self.max_depth {
            if self.depth() >= max {
                return Err(directive.error(format!("maximum nesting depth of {max} exceeded")));
            }
        }
        self.push_frame(directive, expression, false);
        Ok(())
    }

    /// Opens a continuation arm of the innermost block (`elseif`, `else`).
    /// The arm sits at the same nesting level, so the depth cap does not apply.
    pub fn push_continuation(&mut self, directive: Directive, expression: Option<Expression>) {
        self.push_frame(directive, expression, true);
    }

    fn push_frame(&mut self, directive: Directive, expression: Option<Expression>, continues: bool) {
        self.stack.push(DirectiveState {
            directive,
            expression,
            body: NodeList::new(),
            continues,
        });
    }

    /// Closes the innermost frame.
    pub fn pop(&mut self) -> Option<DirectiveState> {
        self.stack.pop()
    }

    /// Innermost open frame.
    pub fn top(&self) -> Option<&DirectiveState> {
        self.stack.last()
    }

    /// Name of the innermost open block directive.
    pub fn top_name(&self) -> Option<&str> {
        self.top().map(|state| state.directive.name())
    }

    /// Number of nested open blocks. Continuation arms do not count.
    pub fn depth(&self) -> usize {
        self.stack.iter().filter(|frame| !frame.continues).count()
    }

    /// Operator table used by [`ParserState::compile`].
    pub fn operators(&self) -> Arc<OperatorTable> {
        self.operators.clone()
    }

    /// Compiles `args` with the parser's operator table, locating failures at `directive`.
    pub fn compile(&self, directive: &Directive, args: &[Argument]) -> Result<Expression, Error> {
        Expression::with_operators(args.to_vec(), self.operators.clone())
            .map_err(|err| directive.error(err.message()))
    }
}

/// Receives the outcome of a parse.
pub trait ParseListener {
    /// Called with the top-level nodes when the whole source parsed cleanly.
    fn success(&mut self, nodes: NodeList);
    /// Called once per diagnostic; `Flow::Stop` aborts the parse.
    fn error(&mut self, message: &str, line: usize) -> Flow;
}

struct Collector {
    nodes: Option<NodeList>,
    diagnostics: Vec<Diagnostic>,
    stop_on_first_error: bool,
}

impl ParseListener for Collector {
    fn success(&mut self, nodes: NodeList) {
        self.nodes = Some(nodes);
    }

    fn error(&mut self, message: &str, line: usize) -> Flow {
        self.diagnostics.push(Diagnostic::new(message, line));
        if self.stop_on_first_error {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

/// Glue between the lexer events and the directive handlers.
struct TreeBuilder<'a> {
    registry: &'a DirectiveRegistry,
    state: ParserState,
    listener: &'a mut dyn ParseListener,
    failed: bool,
}

impl TreeBuilder<'_> {
    fn report(&mut self, message: &str, line: usize) -> Flow {
        self.failed = true;
        self.listener.error(message, line)
    }

    fn dispatch(&mut self, directive: &Directive) -> Result<(), Error> {
        self.registry.validate(directive)?;
        if let Some(handler) = self.registry.get(directive.name()) {
            return handler.handle(directive, &mut self.state);
        }
        match self.registry.unknown_handler() {
            Some(handler) => {
                warn!(directive = directive.name(), line = directive.line(), "dispatching unknown directive to fallback handler");
                handler.handle(directive, &mut self.state)
            }
            None => Err(directive.error("unknown directive")),
        }
    }
}

impl ParseHandler for TreeBuilder<'_> {
    fn text(&mut self, text: &str, _line: usize) -> Flow {
        self.state.add(Box::new(TextNode::new(text)));
        Flow::Continue
    }

    fn raw(&mut self, text: &str, _line: usize) -> Flow {
        self.state.add(Box::new(TextNode::new(text)));
        Flow::Continue
    }

    fn directive(&mut self, name: &str, args: &[String], line: usize) -> Flow {
        let directive = Directive::new(closing_alias(name), parse_arguments(args), line);
        trace!(directive = %directive, line, depth = self.state.depth(), "dispatching directive");
        let outcome = self.dispatch(&directive);
        telemetry::record_directive(directive.name(), outcome.is_ok());
        match outcome {
            Ok(()) => Flow::Continue,
            Err(err) => {
                let at = err.line().filter(|l| *l > 0).unwrap_or(line);
                self.report(&err.message(), at)
            }
        }
    }

    fn error(&mut self, message: &str, line: usize) -> Flow {
        self.report(message, line)
    }

    fn end(&mut self) {
        let open = self
            .state
            .top()
            .map(|state| (state.directive().to_string(), state.directive().line()));
        if let Some((directive, line)) = open {
            self.report(&format!("Unterminated directive: {directive}"), line);
            return;
        }
        if !self.failed {
            let nodes = std::mem::take(&mut self.state.root);
            self.listener.success(nodes);
        }
    }
}

/// `[/if]` is shorthand for `[endif]`.
fn closing_alias(name: &str) -> String {
    match name.strip_prefix('/') {
        Some(block) if !block.is_empty() => format!("end{block}"),
        _ => name.to_string(),
    }
}

/// Configured parser: directive handlers, operator table and options.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    registry: DirectiveRegistry,
    operators: Arc<OperatorTable>,
    options: ParseOptions,
}

impl Default for TemplateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateParser {
    /// Parser with the standard directives and operators.
    pub fn new() -> Self {
        Self::with_registry(directives::standard_registry())
    }

    /// Parser dispatching to `registry`, with the standard operators.
    pub fn with_registry(registry: DirectiveRegistry) -> Self {
        Self {
            registry,
            operators: OperatorTable::standard(),
            options: ParseOptions::default(),
        }
    }

    /// Replaces the operator table used by directive expressions.
    #[must_use]
    pub fn with_operators(mut self, operators: Arc<OperatorTable>) -> Self {
        self.operators = operators;
        self
    }

    /// Replaces the parse options.
    #[must_use]
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Directive handlers in use.
    pub fn registry(&self) -> &DirectiveRegistry {
        &self.registry
    }

    /// Options in use.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses `source`, reporting the node list or each diagnostic to `listener`.
    pub fn parse_with_listener(&self, source: &str, listener: &mut dyn ParseListener) {
        let mut builder = TreeBuilder {
            registry: &self.registry,
            state: ParserState::new(self.operators.clone(), self.options.max_depth),
            listener,
            failed: false,
        };
        lexer::scan(source, self.options.reserved(), &mut builder);
    }

    /// Parses `source` into a node list, or every diagnostic that was collected.
    pub fn parse_nodes(&self, source: &str) -> Result<NodeList, Vec<Diagnostic>> {
        let mut collector = Collector {
            nodes: None,
            diagnostics: Vec::new(),
            stop_on_first_error: self.options.stop_on_first_error,
        };
        self.parse_with_listener(source, &mut collector);
        match collector.nodes {
            Some(nodes) if collector.diagnostics.is_empty() => Ok(nodes),
            _ => Err(collector.diagnostics),
        }
    }

    /// Parses a named template; the first diagnostic becomes the error.
    pub fn parse(&self, name: &str, source: &str) -> Result<Template, Error> {
        let started = Instant::now();
        let result = self.parse_nodes(source);
        telemetry::record_parse(name, source.len(), started.elapsed(), result.is_ok());
        match result {
            Ok(nodes) => {
                debug!(template = name, nodes = nodes.len(), elapsed = ?started.elapsed(), "parsed template");
                Ok(Template::from_parts(name, source, nodes))
            }
            Err(diagnostics) => {
                let first = diagnostics
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| Diagnostic::new("parse aborted", 0));
                debug!(template = name, line = first.line, message = %first.message, "template failed to parse");
                Err(Error::parse(first.message, first.line))
            }
        }
    }
}

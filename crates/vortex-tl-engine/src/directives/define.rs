// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use super::binding_arg;
use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::expression::Expression;
use crate::node::Node;
use crate::parser::ParserState;

/// `[def name expr...]`: evaluates `expr` and defines `name` globally.
#[derive(Debug)]
pub struct DefineNode {
    variable: String,
    expression: Expression,
    line: usize,
}

impl Node for DefineNode {
    fn render(&self, ctx: &mut Context, _out: &mut dyn fmt::Write) -> Result<(), Error> {
        let value = self
            .expression
            .evaluate(ctx)
            .map_err(|err| err.at_line(self.line))?;
        ctx.define(&self.variable, value, true)
            .map_err(|err| Error::render_at(err.message(), self.line))
    }
}

/// `[def name expr...]`.
pub struct DefineHandler;

impl DirectiveHandler for DefineHandler {
    fn names(&self) -> &[&'static str] {
        &["def"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        directive.expect_min_args(2)?;
        let variable = binding_arg(directive, 0)?.name().to_string();
        let expression = state.compile(directive, &directive.args()[1..])?;
        state.add(Box::new(DefineNode {
            variable,
            expression,
            line: directive.line(),
        }));
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use serde_json::Value;

use super::{binding_arg, close_block};
use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::expression::Expression;
use crate::node::{Node, NodeList};
use crate::parser::ParserState;
use crate::value::ValueKind;

/// `[list expr var]...[endlist]`.
///
/// Each iteration renders the body in a fresh scope binding `var` plus
/// `_size`, `_index`, `_first` and `_last`. Objects iterate as
/// `[key, value]` pairs in key order.
#[derive(Debug)]
pub struct ListNode {
    expression: Expression,
    variable: String,
    body: NodeList,
    line: usize,
}

impl ListNode {
    fn items(&self, value: Value) -> Result<Vec<Value>, Error> {
        match value {
            Value::Array(items) => Ok(items),
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(key, value)| Value::Array(vec![Value::String(key), value]))
                .collect()),
            other => Err(Error::render_at(
                format!(
                    "cannot iterate over `{}`: value of type {} is not a collection",
                    self.expression,
                    ValueKind::of(&other)
                ),
                self.line,
            )),
        }
    }

    fn bind(&self, ctx: &mut Context, item: Value, index: usize, size: usize) -> Result<(), Error> {
        ctx.define(&self.variable, item, false)?;
        ctx.define("_size", Value::from(size), false)?;
        ctx.define("_index", Value::from(index), false)?;
        ctx.define("_first", Value::Bool(index == 0), false)?;
        ctx.define("_last", Value::Bool(index + 1 == size), false)
    }
}

impl Node for ListNode {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        let value = self
            .expression
            .evaluate(ctx)
            .map_err(|err| err.at_line(self.line))?;
        let items = self.items(value)?;
        let size = items.len();
        for (index, item) in items.into_iter().enumerate() {
            ctx.push();
            let result = self
                .bind(ctx, item, index, size)
                .and_then(|()| self.body.render(ctx, out));
            ctx.pop()?;
            result?;
        }
        Ok(())
    }
}

/// `[list expr... item]...[endlist]`.
pub struct ListHandler;

impl DirectiveHandler for ListHandler {
    fn names(&self) -> &[&'static str] {
        &["list", "endlist"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        if directive.name() == "list" {
            directive.expect_min_args(2)?;
            let last = directive.args().len() - 1;
            binding_arg(directive, last)?;
            let expression = state.compile(directive, &directive.args()[..last])?;
            return state.push(directive.clone(), Some(expression));
        }

        let frame = close_block(directive, state, "list")?;
        let (opened, expression, body) = frame.into_parts();
        let expression = expression.ok_or_else(|| opened.error("missing collection expression"))?;
        let variable = binding_arg(&opened, opened.args().len() - 1)?
            .name()
            .to_string();
        state.add(Box::new(ListNode {
            expression,
            variable,
            body,
            line: opened.line(),
        }));
        Ok(())
    }
}

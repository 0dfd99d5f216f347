// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::expression::Expression;
use crate::node::{Node, NodeList};
use crate::parser::ParserState;
use crate::token::Argument;
use crate::value::is_truthy;

/// One arm of an if-chain. `else` arms carry a literal `true` condition.
#[derive(Debug)]
pub struct Branch {
    /// Guard; the first truthy arm renders.
    pub condition: Expression,
    /// Nodes rendered when the arm is taken.
    pub body: NodeList,
}

/// `[if]...[elseif]...[else]...[endif]`: renders the first arm whose
/// condition is truthy, inside its own scope.
#[derive(Debug)]
pub struct IfNode {
    branches: Vec<Branch>,
    line: usize,
}

impl IfNode {
    /// Arms in source order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }
}

impl Node for IfNode {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        for branch in &self.branches {
            let value = branch
                .condition
                .evaluate(ctx)
                .map_err(|err| err.at_line(self.line))?;
            if is_truthy(&value) {
                return branch.body.render_scoped(ctx, out);
            }
        }
        Ok(())
    }
}

/// `[if]`, `[elseif]`, `[else]` and `[endif]`.
pub struct IfHandler;

const CHAIN: &[&str] = &["if", "elseif"];

impl IfHandler {
    fn follows_chain(directive: &Directive, state: &ParserState) -> Result<(), Error> {
        match state.top_name() {
            Some(name) if CHAIN.contains(&name) => Ok(()),
            _ => Err(directive.error("must follow [if] or [elseif]")),
        }
    }

    fn condition(directive: &Directive, state: &ParserState) -> Result<Expression, Error> {
        if directive.args().is_empty() {
            return Err(directive.error("missing condition"));
        }
        state.compile(directive, directive.args())
    }
}

impl DirectiveHandler for IfHandler {
    fn names(&self) -> &[&'static str] {
        &["if", "elseif", "else", "endif"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        match directive.name() {
            "if" => {
                let condition = Self::condition(directive, state)?;
                state.push(directive.clone(), Some(condition))
            }
            "elseif" => {
                Self::follows_chain(directive, state)?;
                let condition = Self::condition(directive, state)?;
                state.push_continuation(directive.clone(), Some(condition));
                Ok(())
            }
            "else" => {
                directive.expect_no_args()?;
                Self::follows_chain(directive, state)?;
                let always = state.compile(directive, &[Argument::literal(true)])?;
                state.push_continuation(directive.clone(), Some(always));
                Ok(())
            }
            _ => {
                directive.expect_no_args()?;
                match state.top_name() {
                    Some("if" | "elseif" | "else") => {}
                    _ => return Err(directive.error("no open [if] to close")),
                }
                let mut branches = Vec::new();
                let mut line = directive.line();
                while let Some(frame) = state.pop() {
                    let (opened, condition, body) = frame.into_parts();
                    let condition = condition
                        .ok_or_else(|| opened.error("block has no condition"))?;
                    branches.push(Branch { condition, body });
                    if opened.name() == "if" {
                        line = opened.line();
                        break;
                    }
                }
                branches.reverse();
                state.add(Box::new(IfNode { branches, line }));
                Ok(())
            }
        }
    }
}

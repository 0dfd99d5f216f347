// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use crate::context::Context;
use crate::error::Error;

/// A renderable piece of a parsed template.
///
/// Nodes are immutable once built; rendering only mutates the [`Context`].
/// Directive handlers may produce their own node types.
pub trait Node: fmt::Debug + Send + Sync {
    /// Writes this node's output for `ctx` to `out`.
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error>;
}

/// Ordered sequence of nodes (a template body or a block body).
#[derive(Debug, Default)]
pub struct NodeList {
    nodes: Vec<Box<dyn Node>>,
}

impl NodeList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `node`.
    pub fn push(&mut self, node: Box<dyn Node>) {
        self.nodes.push(node);
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in source order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Node> {
        self.nodes.iter().map(|node| node.as_ref())
    }

    /// Renders every child in order against the same context and sink.
    pub fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        for node in &self.nodes {
            node.render(ctx, out)?;
        }
        Ok(())
    }

    /// Renders into a fresh string.
    pub fn render_to_string(&self, ctx: &mut Context) -> Result<String, Error> {
        let mut buffer = String::new();
        self.render(ctx, &mut buffer)?;
        Ok(buffer)
    }

    /// Renders inside a child scope, popping it even when rendering fails.
    pub fn render_scoped(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        ctx.push();
        let result = self.render(ctx, out);
        ctx.pop()?;
        result
    }
}

impl Node for NodeList {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        NodeList::render(self, ctx, out)
    }
}

/// Literal template text.
#[derive(Debug, Clone)]
pub struct TextNode {
    /// Text written as is.
    pub text: String,
}

impl TextNode {
    /// Node writing `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Node for TextNode {
    fn render(&self, _ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        out.write_str(&self.text)?;
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use serde_json::Value;

use super::{binding_arg, close_block};
use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::node::{Node, NodeList};
use crate::parser::ParserState;

/// `[capture name]...[endcapture]`: renders the body into a buffer and
/// defines `name` globally to the result. The body shares the enclosing scope.
#[derive(Debug)]
pub struct CaptureNode {
    variable: String,
    body: NodeList,
    line: usize,
}

impl Node for CaptureNode {
    fn render(&self, ctx: &mut Context, _out: &mut dyn fmt::Write) -> Result<(), Error> {
        let mut buffer = String::new();
        self.body.render(ctx, &mut buffer)?;
        ctx.define(&self.variable, Value::String(buffer), true)
            .map_err(|err| Error::render_at(err.message(), self.line))
    }
}

/// `[capture name]...[endcapture]`.
pub struct CaptureHandler;

impl DirectiveHandler for CaptureHandler {
    fn names(&self) -> &[&'static str] {
        &["capture", "endcapture"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        if directive.name() == "capture" {
            if directive.args().len() != 1 {
                return Err(directive.error(format!(
                    "expected exactly 1 argument, got {}",
                    directive.args().len()
                )));
            }
            binding_arg(directive, 0)?;
            return state.push(directive.clone(), None);
        }

        let (opened, _, body) = close_block(directive, state, "capture")?.into_parts();
        let variable = binding_arg(&opened, 0)?.name().to_string();
        state.add(Box::new(CaptureNode {
            variable,
            body,
            line: opened.line(),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::parser::TemplateParser;
    use serde_json::json;

    fn render_with(source: &str, ctx: &mut Context) -> String {
        TemplateParser::new()
            .parse_nodes(source)
            .expect("template should parse")
            .render_to_string(ctx)
            .unwrap()
    }

    #[test]
    fn captures_body_instead_of_writing_it() {
        let mut ctx = Context::new();
        let out = render_with("a[capture greeting]Hi [val 1 + 1][endcapture]b", &mut ctx);
        assert_eq!(out, "ab");
        assert_eq!(ctx.get("greeting"), Some(&json!("Hi 2")));
    }

    #[test]
    fn updates_outer_binding_from_inside_a_block() {
        let mut ctx = Context::from_json(&json!({"xs": [1, 2]})).unwrap();
        ctx.define("buf", json!("initial"), false).unwrap();
        let out = render_with(
            "[list xs x][capture buf][val x][endcapture][endlist][val buf]",
            &mut ctx,
        );
        assert_eq!(out, "2");
        assert_eq!(ctx.get("buf"), Some(&json!("2")));
    }

    #[test]
    fn creates_root_binding_when_unbound() {
        let mut ctx = Context::new();
        let out = render_with("[if true][capture fresh]v[endcapture][endif][val fresh]", &mut ctx);
        assert_eq!(out, "v");
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.get("fresh"), Some(&json!("v")));
    }

    #[test]
    fn argument_errors() {
        let parser = TemplateParser::new();
        let message = |source: &str| parser.parse_nodes(source).unwrap_err()[0].message.clone();
        assert!(message("[capture][endcapture]").contains("exactly 1 argument"));
        assert!(message("[capture a b][endcapture]").contains("exactly 1 argument"));
        assert!(message("[capture 'a'][endcapture]").contains("must be a symbol"));
        assert!(message("[endcapture]").contains("no open [capture]"));
    }
}

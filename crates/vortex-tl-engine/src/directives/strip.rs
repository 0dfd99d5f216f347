// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use super::close_block;
use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::node::{Node, NodeList};
use crate::parser::ParserState;

/// `[strip]...[endstrip]`: writes the rendered body with surrounding
/// whitespace removed.
#[derive(Debug)]
pub struct StripNode {
    body: NodeList,
}

impl Node for StripNode {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        let mut buffer = String::new();
        self.body.render(ctx, &mut buffer)?;
        out.write_str(buffer.trim())?;
        Ok(())
    }
}

/// `[strip]...[endstrip]`.
pub struct StripHandler;

impl DirectiveHandler for StripHandler {
    fn names(&self) -> &[&'static str] {
        &["strip", "endstrip"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        if directive.name() == "strip" {
            directive.expect_no_args()?;
            return state.push(directive.clone(), None);
        }
        let (_, _, body) = close_block(directive, state, "strip")?.into_parts();
        state.add(Box::new(StripNode { body }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use crate::parser::TemplateParser;
    use serde_json::json;

    fn render(source: &str) -> String {
        let mut ctx = Context::from_json(&json!({"word": "hello"})).unwrap();
        TemplateParser::new()
            .parse_nodes(source)
            .expect("template should parse")
            .render_to_string(&mut ctx)
            .unwrap()
    }

    #[test]
    fn trims_surrounding_whitespace_only() {
        assert_eq!(render("<[strip]  hello  \n[endstrip]>"), "<hello>");
        assert_eq!(render("<[strip]\n  a  b \n[endstrip]>"), "<a  b>");
    }

    #[test]
    fn already_trimmed_body_is_unchanged() {
        assert_eq!(render("[strip][val word][endstrip]"), "hello");
        assert_eq!(render("[strip]\n\t[val word]\n[endstrip]"), "hello");
    }

    #[test]
    fn rejects_arguments() {
        let errors = TemplateParser::new()
            .parse_nodes("[strip x][endstrip]")
            .unwrap_err();
        assert!(errors[0].message.contains("takes no arguments"));
    }
}

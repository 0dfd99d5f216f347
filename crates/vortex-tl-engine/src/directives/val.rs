// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use serde_json::Value;

use crate::context::Context;
use crate::directive::{Directive, DirectiveHandler};
use crate::error::Error;
use crate::expression::Expression;
use crate::node::Node;
use crate::parser::ParserState;
use crate::value::{value_to_string, FormatRegistry};

const UNESCAPED: &str = "unescaped";

/// `[val expr [unescaped] [format]]`.
#[derive(Debug)]
pub struct ValNode {
    expression: Expression,
    format: Option<Expression>,
    unescaped: bool,
    formats: FormatRegistry,
    line: usize,
}

impl ValNode {
    fn format(&self, ctx: &Context) -> Result<Option<String>, Error> {
        let Some(format) = &self.format else {
            return Ok(None);
        };
        match format.evaluate(ctx)? {
            Value::Null => Ok(None),
            value => Ok(Some(value_to_string(&value))),
        }
    }

    fn render_value(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        let value = self.expression.evaluate(ctx)?;
        if value.is_null() {
            return Ok(());
        }
        let format = self.format(ctx)?;
        let text = self.formats.format(&value, format.as_deref())?;
        if self.unescaped {
            out.write_str(&text)?;
        } else {
            out.write_str(&ctx.html_escape(&text))?;
        }
        Ok(())
    }
}

impl Node for ValNode {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        self.render_value(ctx, out)
            .map_err(|err| err.at_line(self.line))
    }
}

/// Builds [`ValNode`]s; output goes through `formats` before escaping.
pub struct ValHandler {
    formats: FormatRegistry,
}

impl ValHandler {
    /// Handler formatting values with `formats`.
    pub fn new(formats: FormatRegistry) -> Self {
        Self { formats }
    }
}

impl DirectiveHandler for ValHandler {
    fn names(&self) -> &[&'static str] {
        &["val"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        directive.expect_min_args(1)?;
        let args = directive.args();
        let (unescaped, format) = match args {
            [_] => (false, None),
            [_, flag] if flag.is_symbol(UNESCAPED) => (true, None),
            [_, format] => (false, Some(format)),
            [_, flag, format] if flag.is_symbol(UNESCAPED) => (true, Some(format)),
            [_, other, _] => {
                return Err(directive.error(format!(
                    "expected `{UNESCAPED}` as second argument, got {other}"
                )))
            }
            _ => {
                return Err(directive.error(format!(
                    "expected at most 3 arguments, got {}",
                    args.len()
                )))
            }
        };

        let expression = state.compile(directive, &args[..1])?;
        let format = format
            .map(|format| state.compile(directive, std::slice::from_ref(format)))
            .transpose()?;
        state.add(Box::new(ValNode {
            expression,
            format,
            unescaped,
            formats: self.formats.clone(),
            line: directive.line(),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveRegistry;
    use crate::directives::install_with_formats;
    use crate::parser::TemplateParser;
    use crate::value::ValueKind;
    use serde_json::json;

    fn render_with(parser: &TemplateParser, source: &str, data: Value) -> Result<String, Error> {
        let nodes = parser.parse_nodes(source).expect("template should parse");
        nodes.render_to_string(&mut Context::from_json(&data)?)
    }

    fn render(source: &str, data: Value) -> String {
        render_with(&TemplateParser::new(), source, data).unwrap()
    }

    fn shouting_parser() -> TemplateParser {
        let mut formats = FormatRegistry::builder();
        formats.register(ValueKind::String, |value, format| {
            let text = value.as_str().unwrap_or_default();
            Ok(match format {
                Some("upper") => text.to_uppercase(),
                Some(other) => return Err(Error::render(format!("unknown format {other:?}"))),
                None => text.to_string(),
            })
        });
        let mut builder = DirectiveRegistry::builder();
        install_with_formats(&mut builder, formats.build()).unwrap();
        TemplateParser::with_registry(builder.build())
    }

    #[test]
    fn escapes_by_default() {
        assert_eq!(render("[val x]", json!({"x": "<b>"})), "&lt;b&gt;");
        assert_eq!(render("[val x unescaped]", json!({"x": "<b>"})), "<b>");
    }

    #[test]
    fn null_renders_nothing() {
        assert_eq!(render("a[val missing]b", json!({})), "ab");
        assert_eq!(render("a[val null]b", json!({})), "ab");
        assert_eq!(render("[val 0][val false]", json!({})), "0false");
    }

    #[test]
    fn literal_arguments() {
        assert_eq!(render("[val \"a & b\" unescaped]", json!({})), "a & b");
    }

    #[test]
    fn format_is_passed_to_registered_formatter() {
        let parser = shouting_parser();
        let data = json!({"name": "<ada>", "style": "upper"});
        assert_eq!(render_with(&parser, "[val name 'upper']", data.clone()).unwrap(), "&lt;ADA&gt;");
        assert_eq!(render_with(&parser, "[val name unescaped style]", data.clone()).unwrap(), "<ADA>");
        assert_eq!(render_with(&parser, "[val name]", data.clone()).unwrap(), "&lt;ada&gt;");
        assert_eq!(render_with(&parser, "[val name nothing]", data).unwrap(), "&lt;ada&gt;");
    }

    #[test]
    fn kinds_without_formatter_ignore_the_format() {
        let parser = shouting_parser();
        assert_eq!(render_with(&parser, "[val 42 'upper']", json!({})).unwrap(), "42");
    }

    #[test]
    fn formatter_errors_carry_the_line() {
        let err = render_with(&shouting_parser(), "\n[val 'x' 'bogus']", json!({})).unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("unknown format"));
    }

    #[test]
    fn argument_errors() {
        let parser = TemplateParser::new();
        let message = |source: &str| parser.parse_nodes(source).unwrap_err()[0].message.clone();
        assert!(message("[val]").contains("at least 1 argument"));
        assert!(message("[val a b c]").contains("expected `unescaped`"));
        assert!(message("[val a unescaped b c]").contains("at most 3 arguments"));
    }
}

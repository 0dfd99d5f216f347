// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

use serde_json::json;
use vortex_tl_core::{
    directives, Context, Directive, DirectiveHandler, DirectiveRegistry, Error, Expression, Node,
    ParserState, TemplateParser,
};

/// `[repeat count]` writes a star per unit of `count`.
#[derive(Debug)]
struct RepeatNode {
    count: Expression,
}

impl Node for RepeatNode {
    fn render(&self, ctx: &mut Context, out: &mut dyn fmt::Write) -> Result<(), Error> {
        let count = vortex_tl_core::coerce_integer(&self.count.evaluate(ctx)?)?;
        out.write_str(&"*".repeat(usize::try_from(count).unwrap_or(0)))?;
        Ok(())
    }
}

struct RepeatHandler;

impl DirectiveHandler for RepeatHandler {
    fn names(&self) -> &[&'static str] {
        &["repeat"]
    }

    fn handle(&self, directive: &Directive, state: &mut ParserState) -> Result<(), Error> {
        directive.expect_min_args(1)?;
        let count = state.compile(directive, directive.args())?;
        state.add(Box::new(RepeatNode { count }));
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Start from the stock directives and formatters.
    let mut builder = DirectiveRegistry::builder();
    directives::install_with_formats(&mut builder, vortex_tl_core::standard_formatters())?;
    builder.register(RepeatHandler)?;

    let parser = TemplateParser::with_registry(builder.build());
    let template = parser.parse("rating", "[val name 'upper']: [repeat stars + 1]")?;
    let output = template.render_json(&json!({"name": "vortex", "stars": 2}))?;

    println!("{output}");
    assert_eq!(output, "VORTEX: ***");
    Ok(())
}

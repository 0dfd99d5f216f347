// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The standard directive set: `if`, `list`, `capture`, `strip`, `def` and `val`.

mod capture;
mod conditional;
mod define;
mod list;
mod strip;
mod val;

pub use capture::{CaptureHandler, CaptureNode};
pub use conditional::{Branch, IfHandler, IfNode};
pub use define::{DefineHandler, DefineNode};
pub use list::{ListHandler, ListNode};
pub use strip::{StripHandler, StripNode};
pub use val::{ValHandler, ValNode};

use crate::context::is_valid_name;
use crate::directive::{Directive, DirectiveRegistry, DirectiveRegistryBuilder};
use crate::error::Error;
use crate::parser::{DirectiveState, ParserState};
use crate::token::Symbol;
use crate::value::FormatRegistry;

/// Registry holding every standard directive; `val` formats with `formats`.
pub fn registry_with_formats(formats: FormatRegistry) -> DirectiveRegistry {
    let mut builder = DirectiveRegistry::builder();
    builder
        .replace(IfHandler)
        .replace(ListHandler)
        .replace(CaptureHandler)
        .replace(StripHandler)
        .replace(DefineHandler)
        .replace(ValHandler::new(formats));
    builder.build()
}

/// Registry holding every standard directive, with plain `val` output.
pub fn standard_registry() -> DirectiveRegistry {
    registry_with_formats(FormatRegistry::empty())
}

/// Adds the standard handlers to `builder`.
pub fn install_standard_directives(builder: &mut DirectiveRegistryBuilder) -> Result<(), Error> {
    install_with_formats(builder, FormatRegistry::empty())
}

/// Adds the standard handlers to `builder`, with `val` using `formats`.
pub fn install_with_formats(
    builder: &mut DirectiveRegistryBuilder,
    formats: FormatRegistry,
) -> Result<(), Error> {
    builder
        .register(IfHandler)?
        .register(ListHandler)?
        .register(CaptureHandler)?
        .register(StripHandler)?
        .register(DefineHandler)?
        .register(ValHandler::new(formats))?;
    Ok(())
}

/// Symbol argument that will later be bound in the context.
fn binding_arg<'d>(directive: &'d Directive, index: usize) -> Result<&'d Symbol, Error> {
    let symbol = directive.symbol_arg(index)?;
    if !is_valid_name(symbol.name()) {
        return Err(directive.error(format!("invalid symbol name {:?}", symbol.name())));
    }
    Ok(symbol)
}

/// Pops the open block, which must have been opened by `opener`.
fn close_block(
    directive: &Directive,
    state: &mut ParserState,
    opener: &str,
) -> Result<DirectiveState, Error> {
    directive.expect_no_args()?;
    if state.top_name() != Some(opener) {
        return Err(directive.error(format!("no open [{opener}] to close")));
    }
    state
        .pop()
        .ok_or_else(|| directive.error(format!("no open [{opener}] to close")))
}

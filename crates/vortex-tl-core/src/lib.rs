#![forbid(unsafe_code)]
// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Standard value formatters for `val`, and a parser wired up with them.
//!
//! - numbers: printf-style `%d %x %X %o %b` with the `0` flag, a width and
//!   `,` for thousands grouping, e.g. `[val total '%,d']`
//! - strings: `upper`, `lower`, `capitalize`, `trim`, `html-unescape`
//! - bools: a `true-label|false-label` pair, e.g. `[val ok 'yes|no']`
//! - arrays: the separator used to join the items (default `", "`)
pub use vortex_tl_engine::{
    coerce_integer, directives, html, is_truthy, is_valid_name, lexer, parse_arguments,
    telemetry, value_to_string, Argument, Arity, Context, Diagnostic, Directive, DirectiveHandler,
    DirectiveRegistry, DirectiveRegistryBuilder, DirectiveState, Error, Escaper, Expression, Flow,
    FormatRegistry, FormatRegistryBuilder, Formatter, Literal, Node, NodeList, Operator,
    OperatorTable, ParseListener, ParseOptions, ParserState, Precedence, Symbol, Template,
    TemplateParser, TextNode, ValueKind,
};
use serde_json::Value;

const DEFAULT_SEPARATOR: &str = ", ";
const MAX_WIDTH: usize = 4096;

/// Builds a registry holding the standard number, string, bool and array formatters.
pub fn standard_formatters() -> FormatRegistry {
    let mut builder = FormatRegistryBuilder::new();
    install_standard_formatters(&mut builder);
    builder.build()
}

/// Installs the standard formatters into an existing registry builder.
pub fn install_standard_formatters(builder: &mut FormatRegistryBuilder) {
    builder
        .register(ValueKind::Number, format_number)
        .register(ValueKind::String, format_string)
        .register(ValueKind::Bool, format_bool)
        .register(ValueKind::Array, format_array);
}

/// Standard directives with `val` using [`standard_formatters`].
pub fn standard_registry() -> DirectiveRegistry {
    directives::registry_with_formats(standard_formatters())
}

/// Parser with the standard directives, operators and formatters.
pub fn standard_parser() -> TemplateParser {
    TemplateParser::with_registry(standard_registry())
}

/// Parses `source` with [`standard_parser`].
pub fn parse_template(name: &str, source: &str) -> Result<Template, Error> {
    standard_parser().parse(name, source)
}

struct ParsedSpecifier {
    zero_pad: bool,
    group: bool,
    width: usize,
    conversion: Conversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    PercentLiteral,
    Decimal,
    Hex,
    UpperHex,
    Octal,
    Binary,
}

impl ParsedSpecifier {
    /// Parses what follows a `%`: flags, width, then the conversion.
    fn parse(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<Self, Error> {
        let mut zero_pad = false;
        let mut group = false;
        while let Some(&flag) = chars.peek() {
            match flag {
                '0' => zero_pad = true,
                ',' => group = true,
                _ => break,
            }
            chars.next();
        }

        let mut width = 0usize;
        while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
            width = width.saturating_mul(10).saturating_add(digit as usize);
            if width > MAX_WIDTH {
                return Err(Error::render(format!(
                    "format width too large (at most {MAX_WIDTH})"
                )));
            }
            chars.next();
        }

        let Some(next) = chars.next() else {
            return Err(Error::render("incomplete format specifier"));
        };
        let conversion = match next {
            '%' => Conversion::PercentLiteral,
            'd' => Conversion::Decimal,
            'x' => Conversion::Hex,
            'X' => Conversion::UpperHex,
            'o' => Conversion::Octal,
            'b' => Conversion::Binary,
            other => {
                return Err(Error::render(format!(
                    "unsupported number format verb %{other}"
                )))
            }
        };

        Ok(Self {
            zero_pad,
            group,
            width,
            conversion,
        })
    }

    fn format(&self, number: i64) -> String {
        let magnitude = number.unsigned_abs();
        let digits = match self.conversion {
            Conversion::PercentLiteral => return "%".to_string(),
            Conversion::Decimal if self.group => group_thousands(magnitude),
            Conversion::Decimal => magnitude.to_string(),
            Conversion::Hex => format!("{magnitude:x}"),
            Conversion::UpperHex => format!("{magnitude:X}"),
            Conversion::Octal => format!("{magnitude:o}"),
            Conversion::Binary => format!("{magnitude:b}"),
        };
        let sign = if number < 0 { "-" } else { "" };
        let len = sign.len() + digits.len();
        if len >= self.width {
            return format!("{sign}{digits}");
        }
        let padding = self.width - len;
        if self.zero_pad {
            format!("{sign}{}{digits}", "0".repeat(padding))
        } else {
            format!("{}{sign}{digits}", " ".repeat(padding))
        }
    }
}

fn group_thousands(magnitude: u64) -> String {
    let digits = magnitude.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn format_number(value: &Value, format: Option<&str>) -> Result<String, Error> {
    let Some(format) = format else {
        return Ok(value_to_string(value));
    };
    let number = coerce_integer(value)?;
    let mut output = String::new();
    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            output.push(ch);
            continue;
        }
        let specifier = ParsedSpecifier::parse(&mut chars)?;
        output.push_str(&specifier.format(number));
    }
    Ok(output)
}

fn format_string(value: &Value, format: Option<&str>) -> Result<String, Error> {
    let text = value.as_str().unwrap_or_default();
    match format {
        None => Ok(text.to_string()),
        Some("upper") => Ok(text.to_uppercase()),
        Some("lower") => Ok(text.to_lowercase()),
        Some("capitalize") => {
            let mut chars = text.chars();
            Ok(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            })
        }
        Some("trim") => Ok(text.trim().to_string()),
        Some("html-unescape") => Ok(html::unescape(text)),
        Some(other) => Err(Error::render(format!("unknown string format {other:?}"))),
    }
}

fn format_bool(value: &Value, format: Option<&str>) -> Result<String, Error> {
    let flag = value.as_bool().unwrap_or_default();
    let Some(format) = format else {
        return Ok(flag.to_string());
    };
    let (yes, no) = format.split_once('|').ok_or_else(|| {
        Error::render(format!(
            "bool format must look like \"yes|no\", got {format:?}"
        ))
    })?;
    let label = if flag { yes } else { no };
    Ok(label.to_string())
}

fn format_array(value: &Value, format: Option<&str>) -> Result<String, Error> {
    let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
    let separator = format.unwrap_or(DEFAULT_SEPARATOR);
    Ok(items
        .iter()
        .map(value_to_string)
        .collect::<Vec<_>>()
        .join(separator))
}

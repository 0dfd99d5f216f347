// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Infix expressions compiled to postfix with the shunting-yard algorithm.
//!
//! Operators are plain symbols looked up in an [`OperatorTable`], so hosts can
//! add or replace operators without touching the tokenizer. Operators and
//! operands must be separate tokens (`a + b`); only the parentheses are split
//! out by the lexer on their own.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use smallvec::SmallVec;

use crate::context::Context;
use crate::error::Error;
use crate::token::Argument;
use crate::value::{coerce_integer, is_truthy};

/// Binding power of an operator, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `!=`
    NotEqual,
    /// `=`
    Equal,
    /// `-`
    Minus,
    /// `+`
    Plus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `!`
    Not,
}

/// Number of operands an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Prefix operator taking one operand.
    Unary,
    /// Infix operator taking two operands.
    Binary,
}

impl Arity {
    fn operands(self) -> usize {
        match self {
            Arity::Unary => 1,
            Arity::Binary => 2,
        }
    }
}

/// Evaluation rule of an operator; receives its operands left to right.
pub type OperatorFn = dyn Fn(&[Value]) -> Result<Value, Error> + Send + Sync;

/// A named operator: symbol, precedence, arity and evaluation rule.
#[derive(Clone)]
pub struct Operator {
    symbol: String,
    precedence: Precedence,
    arity: Arity,
    eval: Arc<OperatorFn>,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("symbol", &self.symbol)
            .field("precedence", &self.precedence)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl Operator {
    /// Operator written as `symbol` in templates, evaluated by `eval`.
    pub fn new<F>(symbol: impl Into<String>, precedence: Precedence, arity: Arity, eval: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            symbol: symbol.into(),
            precedence,
            arity,
            eval: Arc::new(eval),
        }
    }

    /// Symbol the operator is written as.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Binding power.
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Number of operands.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Evaluates the operator on `operands`.
    pub fn apply(&self, operands: &[Value]) -> Result<Value, Error> {
        (self.eval)(operands)
    }
}

/// Operators available to an expression, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    operators: HashMap<String, Operator>,
}

static STANDARD: Lazy<Arc<OperatorTable>> = Lazy::new(|| Arc::new(OperatorTable::build_standard()));

impl OperatorTable {
    /// Table with no operators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default table: `|| && != = - + * / !`.
    pub fn standard() -> Arc<Self> {
        STANDARD.clone()
    }

    fn build_standard() -> Self {
        let mut table = Self::empty();
        table
            .insert(Operator::new("||", Precedence::Or, Arity::Binary, |args| {
                Ok(Value::Bool(is_truthy(&args[0]) || is_truthy(&args[1])))
            }))
            .insert(Operator::new("&&", Precedence::And, Arity::Binary, |args| {
                Ok(Value::Bool(is_truthy(&args[0]) && is_truthy(&args[1])))
            }))
            .insert(Operator::new("!=", Precedence::NotEqual, Arity::Binary, |args| {
                Ok(Value::Bool(!values_equal(&args[0], &args[1])))
            }))
            .insert(Operator::new("=", Precedence::Equal, Arity::Binary, |args| {
                Ok(Value::Bool(values_equal(&args[0], &args[1])))
            }))
            .insert(Operator::new("-", Precedence::Minus, Arity::Binary, |args| {
                integer_op(args, |a, b| Ok(a.wrapping_sub(b)))
            }))
            .insert(Operator::new("+", Precedence::Plus, Arity::Binary, |args| {
                integer_op(args, |a, b| Ok(a.wrapping_add(b)))
            }))
            .insert(Operator::new("*", Precedence::Multiply, Arity::Binary, |args| {
                integer_op(args, |a, b| Ok(a.wrapping_mul(b)))
            }))
            .insert(Operator::new("/", Precedence::Divide, Arity::Binary, |args| {
                integer_op(args, |a, b| {
                    if b == 0 {
                        Err(Error::render("division by zero"))
                    } else {
                        Ok(a.wrapping_div(b))
                    }
                })
            }))
            .insert(Operator::new("!", Precedence::Not, Arity::Unary, |args| {
                Ok(Value::Bool(!is_truthy(&args[0])))
            }));
        table
    }

    /// Adds or replaces an operator.
    pub fn insert(&mut self, operator: Operator) -> &mut Self {
        self.operators.insert(operator.symbol.clone(), operator);
        self
    }

    /// Operator written as `symbol`.
    pub fn get(&self, symbol: &str) -> Option<&Operator> {
        self.operators.get(symbol)
    }

    fn lookup(&self, argument: &Argument) -> Option<&Operator> {
        argument.as_symbol().and_then(|symbol| self.get(symbol.name()))
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (a, b) => a == b,
    }
}

fn integer_op<F>(args: &[Value], op: F) -> Result<Value, Error>
where
    F: Fn(i64, i64) -> Result<i64, Error>,
{
    let left = coerce_integer(&args[0])?;
    let right = coerce_integer(&args[1])?;
    op(left, right).map(Value::from)
}

/// Compiled expression: the original infix tokens plus their postfix order.
#[derive(Debug, Clone)]
pub struct Expression {
    infix: Vec<Argument>,
    postfix: Vec<Argument>,
    operators: Arc<OperatorTable>,
}

impl Expression {
    /// Compiles with the standard operator table.
    pub fn compile(infix: Vec<Argument>) -> Result<Self, Error> {
        Self::with_operators(infix, OperatorTable::standard())
    }

    /// Runs the shunting-yard pass over `infix`.
    ///
    /// Unbalanced parentheses are reported as [`Error::Parse`] with line 0;
    /// callers that know the directive line replace it.
    pub fn with_operators(infix: Vec<Argument>, operators: Arc<OperatorTable>) -> Result<Self, Error> {
        let mut postfix = Vec::with_capacity(infix.len());
        let mut stack: Vec<&Argument> = Vec::new();

        for token in &infix {
            if token.is_symbol("(") {
                stack.push(token);
            } else if token.is_symbol(")") {
                loop {
                    match stack.pop() {
                        Some(top) if top.is_symbol("(") => break,
                        Some(top) => postfix.push(top.clone()),
                        None => return Err(unbalanced(&infix)),
                    }
                }
            } else if let Some(incoming) = operators.lookup(token) {
                while let Some(top) = stack.last() {
                    match operators.lookup(top) {
                        Some(op) if op.precedence >= incoming.precedence => {
                            postfix.push((*top).clone());
                            stack.pop();
                        }
                        _ => break,
                    }
                }
                stack.push(token);
            } else {
                postfix.push(token.clone());
            }
        }

        while let Some(top) = stack.pop() {
            if top.is_symbol("(") {
                return Err(unbalanced(&infix));
            }
            postfix.push(top.clone());
        }

        Ok(Self {
            infix,
            postfix,
            operators,
        })
    }

    /// Tokens as written.
    pub fn infix(&self) -> &[Argument] {
        &self.infix
    }

    /// Tokens in evaluation order.
    pub fn postfix(&self) -> &[Argument] {
        &self.postfix
    }

    /// Evaluates against `ctx`. Symbols that are not bound evaluate to `null`.
    pub fn evaluate(&self, ctx: &Context) -> Result<Value, Error> {
        let mut stack: SmallVec<[Value; 8]> = SmallVec::new();

        for token in &self.postfix {
            match token {
                Argument::Literal(literal) => stack.push(literal.value().clone()),
                Argument::Symbol(symbol) => {
                    if let Some(operator) = self.operators.get(symbol.name()) {
                        let needed = operator.arity.operands();
                        if stack.len() < needed {
                            return Err(Error::evaluation(
                                self,
                                Error::render(format!(
                                    "operator {} expects {needed} operand(s)",
                                    operator.symbol
                                )),
                            ));
                        }
                        let start = stack.len() - needed;
                        let operands: SmallVec<[Value; 2]> = stack.drain(start..).collect();
                        let result = operator
                            .apply(&operands)
                            .map_err(|err| Error::evaluation(self, err))?;
                        stack.push(result);
                    } else {
                        // Unbound symbols are null rather than an error.
                        stack.push(ctx.get(symbol.name()).cloned().unwrap_or(Value::Null));
                    }
                }
            }
        }

        if stack.len() != 1 {
            return Err(Error::evaluation(
                self,
                Error::render(format!(
                    "expression left {} values on the stack, expected 1",
                    stack.len()
                )),
            ));
        }
        Ok(stack.pop().unwrap_or(Value::Null))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, token) in self.infix.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

fn unbalanced(infix: &[Argument]) -> Error {
    let text: Vec<&str> = infix.iter().map(Argument::source).collect();
    Error::parse(format!("unbalanced parenthesis in `{}`", text.join(" ")), 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_arguments;
    use serde_json::json;

    fn compile(source: &str) -> Expression {
        let tokens: Vec<&str> = source.split_whitespace().collect();
        Expression::compile(parse_arguments(&tokens)).expect("expression should compile")
    }

    fn eval(source: &str) -> Value {
        compile(source)
            .evaluate(&Context::new())
            .expect("expression should evaluate")
    }

    fn postfix(source: &str) -> String {
        compile(source)
            .postfix()
            .iter()
            .map(Argument::source)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn same_precedence_is_left_associative() {
        assert_eq!(postfix("1 + 2 - 3"), "1 2 + 3 -");
        assert_eq!(eval("1 + 2 - 3"), json!(0));
        assert_eq!(eval("10 - 4 - 3"), json!(3));
    }

    #[test]
    fn multiply_binds_tighter_than_plus() {
        let expr = Expression::compile(vec![
            Argument::literal(2),
            Argument::symbol("+"),
            Argument::literal(3),
            Argument::symbol("*"),
            Argument::literal(4),
        ])
        .unwrap();
        assert_eq!(expr.evaluate(&Context::new()).unwrap(), json!(14));
        assert_eq!(eval("2 * 3 + 4"), json!(10));
    }

    #[test]
    fn table_orders_minus_below_plus() {
        // `-` binds weaker than `+`, so the right-hand sum is grouped first.
        assert_eq!(postfix("10 - 2 + 3"), "10 2 3 + -");
        assert_eq!(eval("10 - 2 + 3"), json!(5));
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(postfix("( 2 + 3 ) * 4"), "2 3 + 4 *");
        assert_eq!(eval("( 2 + 3 ) * 4"), json!(20));
    }

    #[test]
    fn unbalanced_parentheses_fail_compilation() {
        let err = Expression::compile(parse_arguments(&["1", ")"])).unwrap_err();
        assert!(err.to_string().contains("unbalanced parenthesis"));
        let err = Expression::compile(parse_arguments(&["(", "1"])).unwrap_err();
        assert!(err.to_string().contains("unbalanced parenthesis"));
    }

    #[test]
    fn division_truncates_toward_zero() {
        assert_eq!(eval("7 / 2"), json!(3));
        assert_eq!(eval("-7 / 2"), json!(-3));
        let err = compile("1 / 0").evaluate(&Context::new()).unwrap_err();
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        assert_eq!(eval("\"4\" * '5'"), json!(20));
        let err = compile("'x' + 1").evaluate(&Context::new()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("argument is not a number"), "{text}");
        assert!(text.contains("`'x' + 1`"), "{text}");
    }

    #[test]
    fn equality_treats_null_specially() {
        assert_eq!(eval("missing = null"), json!(true));
        assert_eq!(eval("missing = 0"), json!(false));
        assert_eq!(eval("1 = 1"), json!(true));
        assert_eq!(eval("'a' != 'b'"), json!(true));
        assert_eq!(eval("1 = '1'"), json!(false));
    }

    #[test]
    fn logical_operators_use_truthiness() {
        assert_eq!(eval("true && 'x'"), json!(true));
        assert_eq!(eval("missing || false"), json!(false));
        assert_eq!(eval("! missing"), json!(true));
        assert_eq!(eval("! 1 = 2 || true && false"), json!(false));
    }

    #[test]
    fn unbound_symbols_evaluate_to_null() {
        assert_eq!(eval("nothing"), Value::Null);
    }

    #[test]
    fn symbols_resolve_from_context() {
        let mut ctx = Context::new();
        ctx.define("a", json!(6), false).unwrap();
        ctx.define("b", json!("2"), false).unwrap();
        assert_eq!(compile("a / b + 1").evaluate(&ctx).unwrap(), json!(4));
    }

    #[test]
    fn leftover_operands_are_an_error() {
        let err = compile("1 2").evaluate(&Context::new()).unwrap_err();
        assert!(err.to_string().contains("expected 1"));
        let err = compile("+").evaluate(&Context::new()).unwrap_err();
        assert!(err.to_string().contains("expects 2 operand"));
        let empty = Expression::compile(Vec::new()).unwrap();
        assert!(empty.evaluate(&Context::new()).is_err());
    }

    #[test]
    fn custom_operators_extend_the_table() {
        let mut table = OperatorTable::empty();
        table.insert(Operator::new("~", Precedence::Plus, Arity::Binary, |args| {
            Ok(Value::String(format!("{}{}", args[0], args[1])))
        }));
        let expr =
            Expression::with_operators(parse_arguments(&["1", "~", "2"]), Arc::new(table)).unwrap();
        assert_eq!(expr.evaluate(&Context::new()).unwrap(), json!("12"));
        assert_eq!(expr.to_string(), "1 ~ 2");
    }
}

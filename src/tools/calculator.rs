//! Calculator tool - sandboxed arithmetic evaluation
//!
//! Expressions are evaluated by `meval` against a context that only contains
//! numeric constants and whitelisted math functions. There is no variable
//! binding, no string handling and no host access: anything outside that
//! namespace fails to parse or resolve and comes back as an error string.

use super::{parse_input, Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use meval::tokenizer::{Operation, Token};
use meval::{Context, ContextProvider, Expr};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Longest expression accepted
const MAX_EXPRESSION_LEN: usize = 512;

/// `math.` qualifiers as written by models used to Python's math module
static MATH_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmath\.").expect("static regex"));

pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    expression: String,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &'static str {
        "math_calculator"
    }

    fn description(&self) -> String {
        "Math calculator for numeric operations. Accepts numbers only. Supports +, -, *, /, % and ** as well as functions such as log (natural, or log(x, base)), log10, log2, sin, cos, tan, sqrt, pow, exp, abs, floor, ceil, round, min, max and the constants pi, e and tau. Examples: 'log(10)', '20 ** 2', 'pow(2, 10) / 3'.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["expression"],
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "Arithmetic expression to evaluate"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> ToolOutput {
        let input: CalculatorInput = match parse_input(input) {
            Ok(i) => i,
            Err(e) => return e,
        };

        match evaluate(&input.expression) {
            Ok(value) => ToolOutput::success(format_number(value)),
            Err(e) => ToolOutput::error(format!(
                "Math error: {e}. Make sure to use valid syntax (e.g. log(10) or 20 ** 2)"
            )),
        }
    }
}

/// Evaluate an expression inside the math-only sandbox
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err("empty expression".to_string());
    }
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(format!(
            "expression longer than {MAX_EXPRESSION_LEN} characters"
        ));
    }

    let normalized = MATH_QUALIFIER
        .replace_all(expression, "")
        .replace("**", "^");

    let expr: Expr = normalized.parse().map_err(|e: meval::Error| e.to_string())?;
    let value = eval_rpn(&expr, &sandbox())?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err("result is not a finite number".to_string())
    }
}

/// Stack evaluation of a parsed expression. Matches meval's own evaluator
/// except that `%` is Python's floored modulo.
fn eval_rpn(rpn: &[Token], ctx: &Context<'_>) -> Result<f64, String> {
    const MALFORMED: &str = "malformed expression";
    let mut stack: Vec<f64> = Vec::with_capacity(16);

    for token in rpn {
        match token {
            Token::Number(n) => stack.push(*n),
            Token::Var(name) => {
                let value = ctx
                    .get_var(name)
                    .ok_or_else(|| format!("unknown variable `{name}`"))?;
                stack.push(value);
            }
            Token::Binary(op) => {
                let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                    return Err(MALFORMED.to_string());
                };
                stack.push(match op {
                    Operation::Plus => left + right,
                    Operation::Minus => left - right,
                    Operation::Times => left * right,
                    Operation::Div => left / right,
                    Operation::Rem => floored_rem(left, right),
                    Operation::Pow => left.powf(right),
                });
            }
            Token::Unary(op) => {
                let x = stack.pop().ok_or(MALFORMED)?;
                match op {
                    Operation::Plus => stack.push(x),
                    Operation::Minus => stack.push(-x),
                    _ => return Err(format!("unsupported unary operator {op:?}")),
                }
            }
            Token::Func(name, Some(arity)) => {
                let start = stack.len().checked_sub(*arity).ok_or(MALFORMED)?;
                let value = ctx
                    .eval_func(name, &stack[start..])
                    .map_err(|e| format!("function `{name}`: {e}"))?;
                stack.truncate(start);
                stack.push(value);
            }
            Token::Func(_, None) | Token::LParen | Token::RParen | Token::Comma => {
                return Err(MALFORMED.to_string());
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(value), true) => Ok(value),
        _ => Err(MALFORMED.to_string()),
    }
}

/// Remainder with the sign of the divisor, as Python's `%`
fn floored_rem(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

/// `log(x)` is natural, `log(x, base)` as in Python
fn log(args: &[f64]) -> f64 {
    match args {
        [x, base] => x.ln() / base.ln(),
        [x, ..] => x.ln(),
        [] => f64::NAN,
    }
}

/// Builtins (`sqrt exp ln abs sin cos tan asin acos atan sinh cosh tanh floor
/// ceil round signum atan2 min max`, `pi`, `e`) plus Python `math` names
fn sandbox() -> Context<'static> {
    let mut ctx = Context::new();
    ctx.var("tau", std::f64::consts::TAU)
        .funcn("log", log, 1..3)
        .func("log10", f64::log10)
        .func("log2", f64::log2)
        .func("degrees", f64::to_degrees)
        .func("radians", f64::to_radians)
        .func("trunc", f64::trunc)
        .func2("pow", f64::powf)
        .func2("hypot", f64::hypot);
    ctx
}

/// Integral values print without a fractional part, others at full precision
#[allow(clippy::float_cmp)]
fn format_number(value: f64) -> String {
    // -0 prints as 0
    let value = value + 0.0;
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

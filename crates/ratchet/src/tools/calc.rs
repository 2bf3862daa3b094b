use std::future::ready;

use ratchet_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, JsonSchema)]
pub struct CalcParameters {
    #[schemars(description = "Arithmetic expression to evaluate, \
e.g. `(1 + 2) * 3`. Supports +, -, *, /, % and parentheses.")]
    expression: String,
}

/// A tool for evaluating arithmetic expressions.
pub struct CalcTool {
    parameter_schema: Value,
}

impl CalcTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        CalcTool {
            parameter_schema: schema_for!(CalcParameters).to_value(),
        }
    }
}

impl Default for CalcTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalcTool {
    type Input = CalcParameters;

    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression and returns the result as text."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(
        &self,
        input: CalcParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(evaluate(&input.expression).map(format_number))
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn evaluate(expression: &str) -> Result<f64, ToolError> {
    let mut parser = Parser {
        bytes: expression.as_bytes(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_spaces();
    if parser.pos != parser.bytes.len() {
        return Err(ToolError::invalid_input().with_reason(format!(
            "unexpected character at position {}",
            parser.pos + 1
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::execution()
            .with_reason("expression does not evaluate to a finite number"));
    }
    Ok(value)
}

/// A recursive descent parser over the expression bytes. Grammar:
///
/// ```text
/// expr   := term (("+" | "-") term)*
/// term   := factor (("*" | "/" | "%") factor)*
/// factor := "-" factor | number | "(" expr ")"
/// ```
struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(op @ (b'/' | b'%')) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    if rhs == 0.0 {
                        return Err(ToolError::execution()
                            .with_reason("division by zero"));
                    }
                    if op == b'/' {
                        value /= rhs;
                    } else {
                        value %= rhs;
                    }
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                Ok(-self.factor()?)
            }
            Some(b'(') => {
                self.pos += 1;
                let value = self.expr()?;
                if self.peek() != Some(b')') {
                    return Err(ToolError::invalid_input()
                        .with_reason("missing closing parenthesis"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) => Err(ToolError::invalid_input().with_reason(format!(
                "unexpected character `{}`",
                c as char
            ))),
            None => Err(ToolError::invalid_input()
                .with_reason("unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<f64, ToolError> {
        self.skip_spaces();
        let start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == b'.')
        {
            self.pos += 1;
        }
        // The scanned range contains only ASCII digits and dots.
        let literal =
            std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        literal.parse().map_err(|_| {
            ToolError::invalid_input()
                .with_reason(format!("invalid number `{literal}`"))
        })
    }

    /// Peeks the next non-space byte without consuming it.
    fn peek(&mut self) -> Option<u8> {
        self.skip_spaces();
        self.bytes.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.bytes.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate("2+2").unwrap(), 4.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("10 % 3").unwrap(), 1.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(evaluate("").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(2 + 3").is_err());
        assert!(evaluate("2 ** 3").is_err());
        assert!(evaluate("two + two").is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate("1 / 0").unwrap_err();
        assert_eq!(err.reason(), "division by zero");
    }

    #[test]
    fn test_result_formatting() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-7.0), "-7");
    }
}

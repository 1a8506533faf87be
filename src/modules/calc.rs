//! `calc` - arithmetic over `+ - * / % ^` and parentheses.
//!
//! Evaluated by a small recursive-descent parser; nothing is ever handed to
//! an interpreter.

use super::{Command, CommandError, CommandModule, Invocation, ModuleSettings};
use crate::error::ModuleError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tuffy_proto::Reply;

const ALLOWED: &str = "0123456789.+-*/%^() ";
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("invalid characters")]
    InvalidCharacters,
    #[error("syntax error: {0}")]
    Syntax(&'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

/// Evaluate an arithmetic expression.
///
/// `^` is exponentiation and binds tighter than unary minus, so `-2^2` is
/// `-4`. `%` takes the sign of the divisor.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(CalcError::InvalidCharacters);
    }
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(CalcError::Syntax("unexpected trailing input"));
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = input[start..end]
                    .parse::<f64>()
                    .map_err(|_| CalcError::Syntax("malformed number"))?;
                tokens.push(Token::Num(n));
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            _ => {
                chars.next();
                tokens.push(Token::Op(c));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        self.pos += 1;
        t
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut acc = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut acc = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                _ if rhs == 0.0 => return Err(CalcError::DivisionByZero),
                '/' => acc / rhs,
                _ => acc - rhs * (acc / rhs).floor(),
            };
        }
        Ok(acc)
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                self.nested(|p| p.unary()).map(|v| -v)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.nested(|p| p.unary())
            }
            _ => self.power(),
        }
    }

    // power := atom ('^' unary)?
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exp = self.nested(|p| p.unary())?;
            if base == 0.0 && exp < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            return Ok(base.powf(exp));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.nested(|p| p.expr())?;
                match self.bump() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(CalcError::Syntax("unbalanced parentheses")),
                }
            }
            Some(_) => Err(CalcError::Syntax("unexpected token")),
            None => Err(CalcError::Syntax("unexpected end of expression")),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, CalcError>) -> Result<f64, CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::Syntax("expression nested too deeply"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }
}

// ============================================================================
// Module
// ============================================================================

pub struct CalculatorModule {
    calc: Arc<CalcCommand>,
}

const DEFAULT_MAX_LENGTH: i64 = 200;

impl CalculatorModule {
    pub fn build(settings: &ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError> {
        let max_length = settings.int("max_length")?.unwrap_or(DEFAULT_MAX_LENGTH);
        let max_length = usize::try_from(max_length)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ModuleError::new(format!("max_length must be positive, got {max_length}")))?;
        Ok(Box::new(Self {
            calc: Arc::new(CalcCommand { max_length }),
        }))
    }
}

#[async_trait]
impl CommandModule for CalculatorModule {
    fn name(&self) -> &str {
        "calculator"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![self.calc.clone()]
    }
}

struct CalcCommand {
    max_length: usize,
}

#[async_trait]
impl Command for CalcCommand {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "Performs a simple calculation."
    }

    async fn invoke(&self, _ctx: &Invocation, args: &str) -> Result<Reply, CommandError> {
        if args.is_empty() {
            return Err(CommandError::InvalidArgs("usage: calc <expression>".to_string()));
        }
        if args.len() > self.max_length {
            return Err(CommandError::InvalidArgs(format!(
                "expression longer than {} characters",
                self.max_length
            )));
        }
        let text = match evaluate(args) {
            Ok(value) => format!("Result: `{args} = {}`", format_number(value)),
            Err(CalcError::InvalidCharacters) => "Invalid characters detected in the expression. \
                Only digits, basic operators (+-*/%^), parentheses, and spaces are allowed."
                .to_string(),
            Err(CalcError::Syntax(_)) => {
                "Invalid expression syntax. Please check your input.".to_string()
            }
            Err(CalcError::DivisionByZero) => {
                "*explodes 💥*\n-# (you can't divide by zero)".to_string()
            }
            Err(e) => format!("An error occurred during calculation: `{e}`"),
        };
        Ok(Reply::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Caller;

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(evaluate("5+3*2"), Ok(11.0));
        assert_eq!(evaluate("(5+3)*2"), Ok(16.0));
        assert_eq!(evaluate("10-4-3"), Ok(3.0));
        assert_eq!(evaluate("2^3^2"), Ok(512.0));
        assert_eq!(evaluate("-2^2"), Ok(-4.0));
        assert_eq!(evaluate("2^-1"), Ok(0.5));
        assert_eq!(evaluate(" 7 / 2 "), Ok(3.5));
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(evaluate("7%3"), Ok(1.0));
        assert_eq!(evaluate("-7%3"), Ok(2.0));
        assert_eq!(evaluate("7%-3"), Ok(-2.0));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(evaluate("2+abs(3)"), Err(CalcError::InvalidCharacters));
        assert!(matches!(evaluate("2+"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("(2+3"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("2 3"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate("1.2.3"), Err(CalcError::Syntax(_))));
        assert!(matches!(evaluate(""), Err(CalcError::Syntax(_))));
        assert_eq!(evaluate("1/0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("1%(2-2)"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("10^400"), Err(CalcError::NonFinite));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let expr = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(evaluate(&expr), Err(CalcError::Syntax(_))));
    }

    #[tokio::test]
    async fn replies_match_chat_wording() {
        let ctx = Invocation::new(Caller::guest(1));
        let calc = CalcCommand { max_length: 16 };
        let reply = calc.invoke(&ctx, "5+3*2").await.unwrap();
        assert_eq!(reply, Reply::text("Result: `5+3*2 = 11`"));

        let reply = calc.invoke(&ctx, "1/0").await.unwrap();
        assert_eq!(reply.to_lines()[1], "-# (you can't divide by zero)");

        assert!(calc.invoke(&ctx, "").await.is_err());
        assert!(calc.invoke(&ctx, "1+1+1+1+1+1+1+1+1").await.is_err());
    }

    #[test]
    fn max_length_setting() {
        let bad = ModuleSettings::new("cogs.calc", toml::from_str("max_length = 0").unwrap());
        assert!(CalculatorModule::build(&bad).is_err());
        let ok = ModuleSettings::new("cogs.calc", toml::from_str("max_length = 40").unwrap());
        assert!(CalculatorModule::build(&ok).is_ok());
    }
}

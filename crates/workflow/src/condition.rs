// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edge-condition expression language.
//!
//! A small, side-effect-free boolean language over the run context:
//! literals, `context.foo` field access, `==` / `!=`, `&&` / `||` / `!`,
//! and `in` membership. No function calls, no external references.
//!
//! Parse errors are fatal at workflow load. Evaluation errors (a missing
//! key, a non-boolean result) are soft: the conductor treats the edge as
//! false and records a skip decision.

use serde_json::Value;

use crate::error::WorkflowError;

// ── Tokens ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    Null,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    BangEq,
    In,
    Dot,
    LParen,
    RParen,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, chars: input.char_indices().peekable() }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, WorkflowError> {
        let mut tokens = Vec::new();
        while let Some(&(pos, ch)) = self.chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '(' => {
                    self.chars.next();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.chars.next();
                    tokens.push(Token::RParen);
                }
                '.' => {
                    self.chars.next();
                    tokens.push(Token::Dot);
                }
                '&' => {
                    self.chars.next();
                    self.expect_char('&', pos)?;
                    tokens.push(Token::AndAnd);
                }
                '|' => {
                    self.chars.next();
                    self.expect_char('|', pos)?;
                    tokens.push(Token::OrOr);
                }
                '!' => {
                    self.chars.next();
                    if self.chars.peek().is_some_and(|&(_, c)| c == '=') {
                        self.chars.next();
                        tokens.push(Token::BangEq);
                    } else {
                        tokens.push(Token::Bang);
                    }
                }
                '=' => {
                    self.chars.next();
                    self.expect_char('=', pos)?;
                    tokens.push(Token::EqEq);
                }
                '"' | '\'' => tokens.push(self.read_string(ch)?),
                c if c.is_ascii_digit() || c == '-' => tokens.push(self.read_number(pos)?),
                c if c.is_ascii_alphabetic() || c == '_' => tokens.push(self.read_word()),
                other => {
                    return Err(WorkflowError::ConditionSyntax {
                        pos,
                        message: format!("unexpected character {other:?}"),
                    });
                }
            }
        }
        Ok(tokens)
    }

    fn expect_char(&mut self, expected: char, pos: usize) -> Result<(), WorkflowError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            _ => Err(WorkflowError::ConditionSyntax {
                pos,
                message: format!("expected {expected:?}"),
            }),
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Token, WorkflowError> {
        let (start, _) = self.chars.next().unwrap_or((0, quote));
        let mut text = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(Token::Str(text));
            }
            text.push(c);
        }
        Err(WorkflowError::ConditionSyntax { pos: start, message: "unterminated string".into() })
    }

    fn read_number(&mut self, start: usize) -> Result<Token, WorkflowError> {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '-' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        self.input[start..end]
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| WorkflowError::ConditionSyntax {
                pos: start,
                message: format!("bad number {:?}", &self.input[start..end]),
            })
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        match word.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            "in" => Token::In,
            _ => Token::Ident(word),
        }
    }
}

// ── AST ─────────────────────────────────────────────────────────────────

/// A parsed, reusable condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Empty source: always true.
    Always,
    Literal(Value),
    /// `context.a.b`: path segments after `context`.
    Path(Vec<String>),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Eq(Box<Condition>, Box<Condition>),
    Ne(Box<Condition>, Box<Condition>),
    In(Box<Condition>, Box<Condition>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn syntax(&self, message: impl Into<String>) -> WorkflowError {
        WorkflowError::ConditionSyntax { pos: self.pos, message: message.into() }
    }

    fn parse_or(&mut self) -> Result<Condition, WorkflowError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Condition, WorkflowError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_not()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Condition, WorkflowError> {
        if self.eat(&Token::Bang) {
            return Ok(Condition::Not(Box::new(self.parse_not()?)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Condition, WorkflowError> {
        let left = self.parse_term()?;
        let op = match self.peek() {
            Some(Token::EqEq) => Token::EqEq,
            Some(Token::BangEq) => Token::BangEq,
            Some(Token::In) => Token::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_term()?;
        Ok(match op {
            Token::EqEq => Condition::Eq(Box::new(left), Box::new(right)),
            Token::BangEq => Condition::Ne(Box::new(left), Box::new(right)),
            _ => Condition::In(Box::new(left), Box::new(right)),
        })
    }

    fn parse_term(&mut self) -> Result<Condition, WorkflowError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(self.syntax("expected ')'"));
                }
                Ok(inner)
            }
            Some(Token::Str(s)) => Ok(Condition::Literal(Value::String(s))),
            Some(Token::Number(n)) => Ok(Condition::Literal(
                serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
            )),
            Some(Token::True) => Ok(Condition::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Condition::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Condition::Literal(Value::Null)),
            Some(Token::Ident(word)) if word == "context" => {
                let mut path = Vec::new();
                while self.eat(&Token::Dot) {
                    match self.next() {
                        Some(Token::Ident(segment)) => path.push(segment),
                        Some(Token::In) => path.push("in".to_string()),
                        _ => return Err(self.syntax("expected field name after '.'")),
                    }
                }
                Ok(Condition::Path(path))
            }
            Some(Token::Ident(word)) => {
                Err(self.syntax(format!("unknown reference {word:?} (only `context` is in scope)")))
            }
            other => Err(self.syntax(format!("unexpected token {other:?}"))),
        }
    }
}

/// Parse a condition. Empty (or all-whitespace) source is `Always`.
pub fn parse_condition(source: &str) -> Result<Condition, WorkflowError> {
    if source.trim().is_empty() {
        return Ok(Condition::Always);
    }
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let condition = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.syntax("trailing tokens after expression"));
    }
    Ok(condition)
}

// ── Evaluation ──────────────────────────────────────────────────────────

fn lookup<'v>(context: &'v Value, path: &[String]) -> Result<&'v Value, WorkflowError> {
    let mut current = context;
    for segment in path {
        current = current
            .get(segment)
            .ok_or_else(|| WorkflowError::ConditionEval(format!("missing key {segment:?}")))?;
    }
    Ok(current)
}

fn eval_value(condition: &Condition, context: &Value) -> Result<Value, WorkflowError> {
    Ok(match condition {
        Condition::Always => Value::Bool(true),
        Condition::Literal(v) => v.clone(),
        Condition::Path(path) => lookup(context, path)?.clone(),
        Condition::Not(inner) => Value::Bool(!truthy(&eval_value(inner, context)?)),
        Condition::And(a, b) => {
            Value::Bool(truthy(&eval_value(a, context)?) && truthy(&eval_value(b, context)?))
        }
        Condition::Or(a, b) => {
            Value::Bool(truthy(&eval_value(a, context)?) || truthy(&eval_value(b, context)?))
        }
        Condition::Eq(a, b) => {
            Value::Bool(values_equal(&eval_value(a, context)?, &eval_value(b, context)?))
        }
        Condition::Ne(a, b) => {
            Value::Bool(!values_equal(&eval_value(a, context)?, &eval_value(b, context)?))
        }
        Condition::In(item, container) => {
            let item = eval_value(item, context)?;
            let container = eval_value(container, context)?;
            Value::Bool(contains(&container, &item))
        }
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Equality that compares numbers by value: the parser always produces
/// floats, while contexts usually hold integers.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn contains(container: &Value, item: &Value) -> bool {
    match container {
        Value::Array(items) => items.iter().any(|candidate| values_equal(candidate, item)),
        Value::String(s) => item.as_str().is_some_and(|needle| s.contains(needle)),
        Value::Object(map) => item.as_str().is_some_and(|key| map.contains_key(key)),
        _ => false,
    }
}

/// Evaluate against a run context. `Err` means the expression could not be
/// decided (missing key); callers default the edge to false.
pub fn eval_condition(condition: &Condition, context: &Value) -> Result<bool, WorkflowError> {
    Ok(truthy(&eval_value(condition, context)?))
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;

//! OData-style query options for list endpoints.
//!
//! # Design
//! The list handlers load their full result set and hand it to
//! `QueryOptions::apply`, which works on the serialized JSON form of each
//! row. That keeps the adapter independent of the concrete resource types:
//! a type only declares which camelCase properties may be filtered, sorted
//! and selected, and which navigation properties may be expanded.
//!
//! Only the subset of the OData grammar that is useful on flat rows is
//! supported: comparisons, `and`/`or`/`not`, parentheses and the
//! `contains`/`startswith`/`endswith` string functions.

use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::model::{TodoItem, TodoValue};

/// Largest `$top` a client may ask for.
pub const MAX_TOP: usize = 100;

/// Deepest `not`/parenthesis nesting a `$filter` may use.
pub const MAX_FILTER_DEPTH: usize = 32;

/// Most `and`/`or` joins a `$filter` may contain.
pub const MAX_FILTER_JOINS: usize = 64;

/// A resource that can be shaped by query options.
pub trait Queryable: Serialize {
    /// Scalar properties, by JSON name.
    const PROPERTIES: &'static [&'static str];
    /// Navigation properties accepted by `$expand`.
    const NAVIGATION: &'static [&'static str] = &[];
}

impl Queryable for TodoItem {
    const PROPERTIES: &'static [&'static str] = &["id", "name", "isComplete"];
    const NAVIGATION: &'static [&'static str] = &["values"];
}

impl Queryable for TodoValue {
    const PROPERTIES: &'static [&'static str] = &["id", "value", "todoItemId"];
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("the query parameter '{0}' is not supported")]
    UnknownOption(String),

    #[error("invalid value '{value}' for {option}")]
    InvalidValue { option: &'static str, value: String },

    #[error("the limit of '{limit}' for Top query has been exceeded, the value from the incoming request is '{requested}'")]
    TopLimitExceeded { limit: usize, requested: usize },

    #[error("could not find a property named '{0}'")]
    UnknownProperty(String),

    #[error("syntax error in $filter: {0}")]
    Syntax(String),

    #[error("failed to shape result: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "ge" => Self::Ge,
            "lt" => Self::Lt,
            "le" => Self::Le,
            _ => return None,
        })
    }

    /// The operator that gives the same answer with operands swapped.
    fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFunction {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    fn to_json(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => json!(n),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

/// Parsed `$filter` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        property: String,
        op: CompareOp,
        literal: Literal,
    },
    Function {
        function: StringFunction,
        property: String,
        argument: String,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            Expr::Compare { property, op, literal } => {
                let left = row.get(property).unwrap_or(&Value::Null);
                compare(left, *op, &literal.to_json())
            }
            Expr::Function {
                function,
                property,
                argument,
            } => match row.get(property) {
                Some(Value::String(s)) => match function {
                    StringFunction::Contains => s.contains(argument.as_str()),
                    StringFunction::StartsWith => s.starts_with(argument.as_str()),
                    StringFunction::EndsWith => s.ends_with(argument.as_str()),
                },
                _ => false,
            },
            Expr::And(a, b) => a.matches(row) && b.matches(row),
            Expr::Or(a, b) => a.matches(row) || b.matches(row),
            Expr::Not(e) => !e.matches(row),
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    };
    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        // null never orders against anything
        _ if left.is_null() || right.is_null() => false,
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

/// Total order used by `$orderby`: null < bool < number < string.
fn sort_key_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub property: String,
    pub descending: bool,
}

/// Declarative filter/sort/page/projection request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<usize>,
    pub top: Option<usize>,
    pub count: bool,
    pub select: Option<Vec<String>>,
    pub expand: Vec<String>,
}

impl QueryOptions {
    /// Read options from raw query parameters. Parameters that do not start
    /// with `$` belong to someone else and are ignored.
    pub fn parse<T: Queryable>(params: &HashMap<String, String>) -> Result<Self, QueryError> {
        let mut options = QueryOptions::default();
        for (key, raw) in params {
            if !key.starts_with('$') {
                continue;
            }
            let raw = raw.trim();
            match key.as_str() {
                "$filter" => options.filter = Some(FilterParser::new(raw)?.parse::<T>()?),
                "$orderby" => options.order_by = parse_order_by::<T>(raw)?,
                "$skip" => options.skip = Some(parse_count("$skip", raw)?),
                "$top" => {
                    let top = parse_count("$top", raw)?;
                    if top > MAX_TOP {
                        return Err(QueryError::TopLimitExceeded {
                            limit: MAX_TOP,
                            requested: top,
                        });
                    }
                    options.top = Some(top);
                }
                "$count" => {
                    options.count = match raw {
                        "true" => true,
                        "false" => false,
                        _ => {
                            return Err(QueryError::InvalidValue {
                                option: "$count",
                                value: raw.to_string(),
                            })
                        }
                    }
                }
                "$select" => options.select = Some(parse_select::<T>(raw)?),
                "$expand" => options.expand = parse_expand::<T>(raw)?,
                other => return Err(QueryError::UnknownOption(other.to_string())),
            }
        }
        Ok(options)
    }

    /// Filter, count, sort, page and project `rows`.
    ///
    /// Returns a plain JSON array, or an `{"@odata.count", "value"}` envelope
    /// when `$count=true` was requested.
    pub fn apply<T: Queryable>(&self, rows: Vec<T>) -> Result<Value, QueryError> {
        let mut rows = rows
            .into_iter()
            .map(|row| -> Result<Map<String, Value>, QueryError> {
                match serde_json::to_value(row)? {
                    Value::Object(map) => Ok(map),
                    other => Err(QueryError::Syntax(format!("cannot query non-object row {other}"))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(filter) = &self.filter {
            rows.retain(|row| filter.matches(row));
        }
        let total = rows.len();

        if !self.order_by.is_empty() {
            rows.sort_by(|a, b| {
                self.order_by
                    .iter()
                    .map(|key| {
                        let ord = sort_key_cmp(
                            a.get(&key.property).unwrap_or(&Value::Null),
                            b.get(&key.property).unwrap_or(&Value::Null),
                        );
                        if key.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let page = rows
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.top.unwrap_or(usize::MAX))
            .map(|row| Value::Object(self.project(row)))
            .collect::<Vec<_>>();

        if self.count {
            Ok(json!({ "@odata.count": total, "value": page }))
        } else {
            Ok(Value::Array(page))
        }
    }

    fn project(&self, mut row: Map<String, Value>) -> Map<String, Value> {
        let Some(select) = &self.select else {
            return row;
        };
        let mut projected = Map::new();
        for name in select.iter().chain(self.expand.iter()) {
            if let Some(value) = row.remove(name) {
                projected.insert(name.clone(), value);
            }
        }
        projected
    }
}

fn parse_count(option: &'static str, raw: &str) -> Result<usize, QueryError> {
    raw.parse().map_err(|_| QueryError::InvalidValue {
        option,
        value: raw.to_string(),
    })
}

fn known_property<T: Queryable>(name: &str) -> Result<String, QueryError> {
    if T::PROPERTIES.contains(&name) {
        Ok(name.to_string())
    } else {
        Err(QueryError::UnknownProperty(name.to_string()))
    }
}

fn parse_order_by<T: Queryable>(raw: &str) -> Result<Vec<OrderBy>, QueryError> {
    raw.split(',')
        .map(|clause| {
            let mut parts = clause.split_whitespace();
            let property = parts.next().ok_or_else(|| QueryError::InvalidValue {
                option: "$orderby",
                value: raw.to_string(),
            })?;
            let descending = match parts.next() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(QueryError::InvalidValue {
                        option: "$orderby",
                        value: other.to_string(),
                    })
                }
            };
            if parts.next().is_some() {
                return Err(QueryError::InvalidValue {
                    option: "$orderby",
                    value: clause.trim().to_string(),
                });
            }
            Ok(OrderBy {
                property: known_property::<T>(property)?,
                descending,
            })
        })
        .collect()
}

fn parse_select<T: Queryable>(raw: &str) -> Result<Vec<String>, QueryError> {
    let mut selected = Vec::new();
    for name in raw.split(',').map(str::trim) {
        if name == "*" {
            selected.extend(T::PROPERTIES.iter().map(|p| p.to_string()));
        } else if T::NAVIGATION.contains(&name) {
            selected.push(name.to_string());
        } else {
            selected.push(known_property::<T>(name)?);
        }
    }
    Ok(selected)
}

fn parse_expand<T: Queryable>(raw: &str) -> Result<Vec<String>, QueryError> {
    raw.split(',')
        .map(str::trim)
        .map(|name| {
            if T::NAVIGATION.contains(&name) {
                Ok(name.to_string())
            } else {
                Err(QueryError::UnknownProperty(name.to_string()))
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    Word(String),
    Str(String),
    Number(f64),
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            s.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => s.push(ch),
                        None => return Err(QueryError::Syntax("unterminated string literal".to_string())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E') {
                        s.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = s
                    .parse::<f64>()
                    .map_err(|_| QueryError::Syntax(format!("invalid number '{s}'")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        s.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(s));
            }
            other => return Err(QueryError::Syntax(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

enum Operand {
    Property(String),
    Literal(Literal),
}

struct FilterParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    joins: usize,
}

impl FilterParser {
    fn new(input: &str) -> Result<Self, QueryError> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            depth: 0,
            joins: 0,
        })
    }

    fn parse<T: Queryable>(mut self) -> Result<Expr, QueryError> {
        let expr = self.parse_or::<T>()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => Err(QueryError::Syntax(format!("unexpected trailing {token:?}"))),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), QueryError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(QueryError::Syntax(format!("expected {expected:?}, found {token:?}"))),
            None => Err(QueryError::Syntax(format!("expected {expected:?}, found end of input"))),
        }
    }

    // Recursion and the left-leaning `and`/`or` chains are bounded so that
    // evaluating or dropping the tree stays shallow.
    fn descend(&mut self) -> Result<(), QueryError> {
        self.depth += 1;
        if self.depth > MAX_FILTER_DEPTH {
            return Err(QueryError::Syntax("filter nested too deeply".to_string()));
        }
        Ok(())
    }

    fn join(&mut self) -> Result<(), QueryError> {
        self.joins += 1;
        if self.joins > MAX_FILTER_JOINS {
            return Err(QueryError::Syntax("filter has too many terms".to_string()));
        }
        Ok(())
    }

    fn parse_or<T: Queryable>(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and::<T>()?;
        while self.eat_word("or") {
            self.join()?;
            let right = self.parse_and::<T>()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and<T: Queryable>(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_unary::<T>()?;
        while self.eat_word("and") {
            self.join()?;
            let right = self.parse_unary::<T>()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary<T: Queryable>(&mut self) -> Result<Expr, QueryError> {
        if self.eat_word("not") {
            self.descend()?;
            let inner = self.parse_unary::<T>()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_or::<T>()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        if let Some(function) = self.peek_function() {
            return self.parse_function::<T>(function);
        }
        self.parse_comparison::<T>()
    }

    fn peek_function(&self) -> Option<StringFunction> {
        let Some(Token::Word(word)) = self.peek() else {
            return None;
        };
        if self.tokens.get(self.pos + 1) != Some(&Token::LParen) {
            return None;
        }
        match word.as_str() {
            "contains" => Some(StringFunction::Contains),
            "startswith" => Some(StringFunction::StartsWith),
            "endswith" => Some(StringFunction::EndsWith),
            _ => None,
        }
    }

    fn parse_function<T: Queryable>(&mut self, function: StringFunction) -> Result<Expr, QueryError> {
        self.pos += 1;
        self.expect(Token::LParen)?;
        let property = match self.next() {
            Some(Token::Word(name)) => known_property::<T>(&name)?,
            other => return Err(QueryError::Syntax(format!("expected property name, found {other:?}"))),
        };
        self.expect(Token::Comma)?;
        let argument = match self.next() {
            Some(Token::Str(s)) => s,
            other => return Err(QueryError::Syntax(format!("expected string literal, found {other:?}"))),
        };
        self.expect(Token::RParen)?;
        Ok(Expr::Function {
            function,
            property,
            argument,
        })
    }

    fn parse_operand<T: Queryable>(&mut self) -> Result<Operand, QueryError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Operand::Literal(Literal::Number(n))),
            Some(Token::Str(s)) => Ok(Operand::Literal(Literal::String(s))),
            Some(Token::Word(w)) => Ok(match w.as_str() {
                "true" => Operand::Literal(Literal::Bool(true)),
                "false" => Operand::Literal(Literal::Bool(false)),
                "null" => Operand::Literal(Literal::Null),
                _ => Operand::Property(known_property::<T>(&w)?),
            }),
            Some(token) => Err(QueryError::Syntax(format!("expected operand, found {token:?}"))),
            None => Err(QueryError::Syntax("expected operand, found end of input".to_string())),
        }
    }

    fn parse_comparison<T: Queryable>(&mut self) -> Result<Expr, QueryError> {
        let left = self.parse_operand::<T>()?;
        let op = match self.next() {
            Some(Token::Word(w)) => {
                CompareOp::from_keyword(&w).ok_or_else(|| QueryError::Syntax(format!("unknown operator '{w}'")))?
            }
            other => return Err(QueryError::Syntax(format!("expected operator, found {other:?}"))),
        };
        let right = self.parse_operand::<T>()?;
        match (left, right) {
            (Operand::Property(property), Operand::Literal(literal)) => Ok(Expr::Compare { property, op, literal }),
            (Operand::Literal(literal), Operand::Property(property)) => Ok(Expr::Compare {
                property,
                op: op.flipped(),
                literal,
            }),
            _ => Err(QueryError::Syntax(
                "comparisons must be between a property and a literal".to_string(),
            )),
        }
    }
}

// crates/docstore-core/src/core/query.rs
// ============================================================================
// Module: Docstore Query Model
// Description: Parameterized query templates, parameters, and parser.
// Purpose: Keep every query value bound by name, never spliced into text.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Queries use a restricted subset of the document-store SQL dialect:
//!
//! ```text
//! SELECT [TOP n] * FROM c
//!   [WHERE cond {AND cond}]
//!   [ORDER BY c.path [ASC | DESC]]
//!
//! cond := c.path (= | != | <> | < | <= | > | >=) @param
//!       | IS_NULL(c.path)
//!       | NOT IS_NULL(c.path)
//! ```
//!
//! Literal values are rejected by the parser: every compared value is a named
//! placeholder bound through [`QueryParameters`]. Backends evaluate the parsed
//! form ([`ParsedQuery`]) instead of re-reading the text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::collection::COLLECTION_FIELD;
use crate::core::collection::COLLECTION_PARAM;
use crate::core::records::Document;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Alias used by generated templates.
pub const DEFAULT_ALIAS: &str = "c";
/// Maximum accepted template length in bytes.
pub const MAX_QUERY_BYTES: usize = 16 * 1024;
/// Maximum number of bound parameters.
pub const MAX_PARAMETERS: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Query template and parameter validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Template is empty.
    #[error("query template is empty")]
    Empty,
    /// Template exceeds the size limit.
    #[error("query template exceeds {max_bytes} bytes")]
    TooLarge {
        /// Maximum accepted size.
        max_bytes: usize,
    },
    /// Character outside the supported dialect.
    #[error("unexpected character '{0}' in query template")]
    UnexpectedCharacter(char),
    /// Token does not fit the grammar.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        /// Expected grammar element.
        expected: &'static str,
        /// Token found instead.
        found: String,
    },
    /// Template ended early.
    #[error("expected {expected}, found end of query")]
    UnexpectedEnd {
        /// Expected grammar element.
        expected: &'static str,
    },
    /// Literal value found where a placeholder is required.
    #[error("literal values are not allowed; bind {0} through a named parameter")]
    LiteralValue(String),
    /// `TOP` count is zero or out of range.
    #[error("TOP count must be a positive integer")]
    InvalidTop,
    /// Unsupported construct.
    #[error("unsupported query construct: {0}")]
    Unsupported(String),
    /// Field path does not start with the `FROM` alias.
    #[error("field path must start with alias {expected}, found {found}")]
    AliasMismatch {
        /// Alias declared in `FROM`.
        expected: String,
        /// Alias used in the path.
        found: String,
    },
    /// Field name is not a valid identifier.
    #[error("invalid field name: {0}")]
    InvalidField(String),
    /// Parameter name is not `@` followed by an identifier.
    #[error("invalid parameter name: {0}")]
    InvalidParameterName(String),
    /// Parameter bound twice.
    #[error("parameter bound more than once: {0}")]
    DuplicateParameter(String),
    /// Too many parameters.
    #[error("query binds more than {max} parameters")]
    TooManyParameters {
        /// Maximum parameter count.
        max: usize,
    },
    /// Placeholder in the template without a bound value.
    #[error("placeholder has no bound value: {0}")]
    MissingParameter(String),
    /// Bound value without a placeholder in the template.
    #[error("bound parameter is not referenced by the template: {0}")]
    UnusedParameter(String),
    /// Template does not restrict rows to a single collection.
    #[error("query must include the predicate c.collection_name = @collection_name")]
    MissingCollectionPredicate,
    /// Caller bound `@collection_name` to another collection.
    #[error("@collection_name is bound to {found}, expected {expected}")]
    ConflictingCollectionParameter {
        /// Collection the query runs against.
        expected: String,
        /// Value supplied by the caller.
        found: String,
    },
}

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// Scalar value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
}

impl ParamValue {
    /// Returns the JSON form compared against document fields.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Text(value) => Value::String(value.clone()),
        }
    }

    /// Returns the text payload when the value is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Ordered set of named placeholder values.
///
/// # Invariants
/// - Names are `@` followed by an identifier and appear at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    /// Bound values in insertion order.
    entries: Vec<(String, ParamValue)>,
}

impl QueryParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a parameter set from name/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when a name is invalid or repeated.
    pub fn from_pairs<I, N, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<ParamValue>,
    {
        let mut parameters = Self::new();
        for (name, value) in pairs {
            parameters.insert(name, value)?;
        }
        Ok(parameters)
    }

    /// Binds a value to a placeholder name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the name is invalid, already bound, or the
    /// set is full.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Result<(), QueryError> {
        let name = name.into();
        if !is_parameter_name(&name) {
            return Err(QueryError::InvalidParameterName(name));
        }
        if self.contains(&name) {
            return Err(QueryError::DuplicateParameter(name));
        }
        if self.entries.len() >= MAX_PARAMETERS {
            return Err(QueryError::TooManyParameters {
                max: MAX_PARAMETERS,
            });
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    /// Returns the value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(entry, _)| entry == name).map(|(_, value)| value)
    }

    /// Returns true when `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates bound values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of bound values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SECTION: Parsed Query
// ============================================================================

/// Dotted document field path (`c.a.b` is stored as `["a", "b"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    /// Field segments after the alias.
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted field path without alias (`target_id`, `meta.owner`).
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidField`] when a segment is not an identifier.
    pub fn parse(dotted: &str) -> Result<Self, QueryError> {
        let segments: Vec<String> = dotted.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| !is_identifier(segment)) {
            return Err(QueryError::InvalidField(dotted.to_string()));
        }
        Ok(Self {
            segments,
        })
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the path as a JSON path expression (`$.a.b`).
    #[must_use]
    pub fn json_path(&self) -> String {
        format!("$.{}", self.segments.join("."))
    }

    /// Resolves the path against a document.
    #[must_use]
    pub fn lookup<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = document.get(first)?;
        for segment in rest {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Returns true when the path is the single field `name`.
    #[must_use]
    pub fn is_field(&self, name: &str) -> bool {
        self.segments.len() == 1 && self.segments.first().is_some_and(|segment| segment == name)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Comparison operator in a `WHERE` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Returns the canonical operator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Single `WHERE` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `c.path op @param`
    Compare {
        /// Compared field.
        path: FieldPath,
        /// Operator.
        op: CompareOp,
        /// Placeholder name including `@`.
        param: String,
    },
    /// `IS_NULL(c.path)` or `NOT IS_NULL(c.path)`
    IsNull {
        /// Checked field.
        path: FieldPath,
        /// True for `NOT IS_NULL`.
        negated: bool,
    },
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Sort field.
    pub path: FieldPath,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Parsed query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Alias declared in `FROM`.
    pub alias: String,
    /// Optional row limit.
    pub top: Option<u64>,
    /// Conjunctive conditions.
    pub conditions: Vec<Condition>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
}

impl ParsedQuery {
    /// Parses a query template.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] when the template is outside the supported dialect.
    pub fn parse(text: &str) -> Result<Self, QueryError> {
        if text.trim().is_empty() {
            return Err(QueryError::Empty);
        }
        if text.len() > MAX_QUERY_BYTES {
            return Err(QueryError::TooLarge {
                max_bytes: MAX_QUERY_BYTES,
            });
        }
        let tokens = tokenize(text)?;
        Parser::new(tokens).parse_query()
    }

    /// Returns every placeholder referenced by the template.
    #[must_use]
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.conditions
            .iter()
            .filter_map(|condition| match condition {
                Condition::Compare {
                    param, ..
                } => Some(param.as_str()),
                Condition::IsNull {
                    ..
                } => None,
            })
            .collect()
    }

    /// Returns true when the template restricts rows to `@collection_name`.
    #[must_use]
    pub fn restricts_collection(&self) -> bool {
        self.conditions.iter().any(|condition| {
            matches!(
                condition,
                Condition::Compare { path, op: CompareOp::Eq, param }
                    if path.is_field(COLLECTION_FIELD) && param == COLLECTION_PARAM
            )
        })
    }

    /// Verifies that placeholders and bound values match one to one.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::MissingParameter`] or [`QueryError::UnusedParameter`].
    pub fn check_bindings(&self, parameters: &QueryParameters) -> Result<(), QueryError> {
        let placeholders = self.placeholders();
        if let Some(missing) = placeholders.iter().find(|name| !parameters.contains(name)) {
            return Err(QueryError::MissingParameter((*missing).to_string()));
        }
        if let Some((unused, _)) = parameters.iter().find(|(name, _)| !placeholders.contains(name))
        {
            return Err(QueryError::UnusedParameter(unused.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if let Some(top) = self.top {
            write!(f, "TOP {top} ")?;
        }
        write!(f, "* FROM {}", self.alias)?;
        for (index, condition) in self.conditions.iter().enumerate() {
            f.write_str(if index == 0 { " WHERE " } else { " AND " })?;
            match condition {
                Condition::Compare {
                    path,
                    op,
                    param,
                } => write!(f, "{}.{path} {} {param}", self.alias, op.as_str())?,
                Condition::IsNull {
                    path,
                    negated,
                } => {
                    if *negated {
                        f.write_str("NOT ")?;
                    }
                    write!(f, "IS_NULL({}.{path})", self.alias)?;
                }
            }
        }
        if let Some(order_by) = &self.order_by {
            let direction = match order_by.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            write!(f, " ORDER BY {}.{} {direction}", self.alias, order_by.path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builds collection-scoped query templates.
///
/// # Invariants
/// - Every built template carries the collection predicate.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    /// Query under construction.
    query: ParsedQuery,
    /// First validation error recorded by a builder step.
    error: Option<QueryError>,
}

impl QueryBuilder {
    /// Starts a template restricted to `@collection_name`.
    #[must_use]
    pub fn for_collection() -> Self {
        Self {
            query: ParsedQuery {
                alias: DEFAULT_ALIAS.to_string(),
                top: None,
                conditions: vec![Condition::Compare {
                    path: FieldPath {
                        segments: vec![COLLECTION_FIELD.to_string()],
                    },
                    op: CompareOp::Eq,
                    param: COLLECTION_PARAM.to_string(),
                }],
                order_by: None,
            },
            error: None,
        }
    }

    /// Limits the result to `count` rows.
    #[must_use]
    pub fn top(mut self, count: u64) -> Self {
        if count == 0 {
            self.record_error(QueryError::InvalidTop);
        } else {
            self.query.top = Some(count);
        }
        self
    }

    /// Adds `c.field = @param`.
    #[must_use]
    pub fn where_eq(self, field: &str, param: &str) -> Self {
        self.where_cmp(field, CompareOp::Eq, param)
    }

    /// Adds `c.field op @param`.
    #[must_use]
    pub fn where_cmp(mut self, field: &str, op: CompareOp, param: &str) -> Self {
        if !is_parameter_name(param) {
            self.record_error(QueryError::InvalidParameterName(param.to_string()));
            return self;
        }
        match FieldPath::parse(field) {
            Ok(path) => self.query.conditions.push(Condition::Compare {
                path,
                op,
                param: param.to_string(),
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Adds `IS_NULL(c.field)`.
    #[must_use]
    pub fn where_null(self, field: &str) -> Self {
        self.null_check(field, false)
    }

    /// Adds `NOT IS_NULL(c.field)`.
    #[must_use]
    pub fn where_not_null(self, field: &str) -> Self {
        self.null_check(field, true)
    }

    /// Orders rows by `c.field`.
    #[must_use]
    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        match FieldPath::parse(field) {
            Ok(path) => {
                self.query.order_by = Some(OrderBy {
                    path,
                    direction,
                });
            }
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Returns the template text.
    ///
    /// # Errors
    ///
    /// Returns the first [`QueryError`] recorded by a builder step.
    pub fn build(self) -> Result<String, QueryError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.query.to_string()),
        }
    }

    /// Adds a null check.
    fn null_check(mut self, field: &str, negated: bool) -> Self {
        match FieldPath::parse(field) {
            Ok(path) => self.query.conditions.push(Condition::IsNull {
                path,
                negated,
            }),
            Err(err) => self.record_error(err),
        }
        self
    }

    /// Keeps the first builder error.
    fn record_error(&mut self, err: QueryError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

// ============================================================================
// SECTION: Tokenizer
// ============================================================================

/// Lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Identifier or keyword.
    Ident(String),
    /// Placeholder including `@`.
    Param(String),
    /// Unsigned integer literal.
    Number(String),
    /// `.`
    Dot,
    /// `*`
    Star,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// Comparison operator.
    Op(CompareOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(value) | Self::Param(value) | Self::Number(value) => f.write_str(value),
            Self::Dot => f.write_str("."),
            Self::Star => f.write_str("*"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::Op(op) => f.write_str(op.as_str()),
        }
    }
}

/// Splits a template into tokens.
fn tokenize(text: &str) -> Result<Vec<Token>, QueryError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;
    while let Some(&ch) = chars.get(index) {
        let next = chars.get(index + 1).copied();
        match ch {
            _ if ch.is_whitespace() => index += 1,
            '.' => {
                tokens.push(Token::Dot);
                index += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                index += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                index += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                index += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                index += 1;
            }
            '=' => {
                tokens.push(Token::Op(CompareOp::Eq));
                index += 1;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                index += 2;
            }
            '<' => match next {
                Some('=') => {
                    tokens.push(Token::Op(CompareOp::Le));
                    index += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op(CompareOp::Ne));
                    index += 2;
                }
                _ => {
                    tokens.push(Token::Op(CompareOp::Lt));
                    index += 1;
                }
            },
            '>' => {
                if next == Some('=') {
                    tokens.push(Token::Op(CompareOp::Ge));
                    index += 2;
                } else {
                    tokens.push(Token::Op(CompareOp::Gt));
                    index += 1;
                }
            }
            '@' => {
                let name = read_while(&chars, index + 1, is_identifier_char);
                if name.is_empty() || !is_identifier(&name) {
                    return Err(QueryError::InvalidParameterName(format!("@{name}")));
                }
                index += 1 + name.chars().count();
                tokens.push(Token::Param(format!("@{name}")));
            }
            '\'' | '"' => return Err(QueryError::LiteralValue("string literal".to_string())),
            _ if ch.is_ascii_digit() => {
                let digits = read_while(&chars, index, |c| c.is_ascii_alphanumeric() || c == '.');
                index += digits.chars().count();
                tokens.push(Token::Number(digits));
            }
            _ if ch.is_ascii_alphabetic() || ch == '_' => {
                let word = read_while(&chars, index, is_identifier_char);
                index += word.chars().count();
                tokens.push(Token::Ident(word));
            }
            other => return Err(QueryError::UnexpectedCharacter(other)),
        }
    }
    Ok(tokens)
}

/// Collects characters from `start` while `accept` holds.
fn read_while(chars: &[char], start: usize, accept: impl Fn(char) -> bool) -> String {
    chars.iter().skip(start).take_while(|c| accept(**c)).collect()
}

/// Returns true for identifier characters.
const fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Returns true when `value` is a non-empty identifier not starting with a digit.
fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(is_identifier_char)
}

/// Returns true when `value` is `@` followed by an identifier.
fn is_parameter_name(value: &str) -> bool {
    value.strip_prefix('@').is_some_and(is_identifier)
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser over tokens.
struct Parser {
    /// Remaining tokens.
    tokens: Vec<Token>,
    /// Cursor into `tokens`.
    position: usize,
}

impl Parser {
    /// Creates a parser at the first token.
    const fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses a full query and requires end of input.
    fn parse_query(mut self) -> Result<ParsedQuery, QueryError> {
        self.expect_keyword("SELECT")?;
        let top = if self.eat_keyword("TOP") { Some(self.parse_top()?) } else { None };
        self.expect(&Token::Star, "*")?;
        self.expect_keyword("FROM")?;
        let alias = self.expect_ident("collection alias")?;
        let mut conditions = Vec::new();
        if self.eat_keyword("WHERE") {
            conditions.push(self.parse_condition(&alias)?);
            while self.eat_keyword("AND") {
                conditions.push(self.parse_condition(&alias)?);
            }
            if self.peek_keyword("OR") {
                return Err(QueryError::Unsupported("OR".to_string()));
            }
        }
        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let path = self.parse_path(&alias)?;
            let direction = if self.eat_keyword("DESC") {
                SortDirection::Desc
            } else {
                let _ = self.eat_keyword("ASC");
                SortDirection::Asc
            };
            if self.peek() == Some(&Token::Comma) {
                return Err(QueryError::Unsupported("multi-column ORDER BY".to_string()));
            }
            Some(OrderBy {
                path,
                direction,
            })
        } else {
            None
        };
        if let Some(token) = self.peek() {
            return Err(QueryError::UnexpectedToken {
                expected: "end of query",
                found: token.to_string(),
            });
        }
        Ok(ParsedQuery {
            alias,
            top,
            conditions,
            order_by,
        })
    }

    /// Parses the `TOP` count.
    fn parse_top(&mut self) -> Result<u64, QueryError> {
        match self.next() {
            Some(Token::Number(digits)) => match digits.parse::<u64>() {
                Ok(count) if count > 0 => Ok(count),
                _ => Err(QueryError::InvalidTop),
            },
            Some(Token::Param(_)) => Err(QueryError::Unsupported("parameterized TOP".to_string())),
            Some(token) => Err(QueryError::UnexpectedToken {
                expected: "TOP count",
                found: token.to_string(),
            }),
            None => Err(QueryError::UnexpectedEnd {
                expected: "TOP count",
            }),
        }
    }

    /// Parses a single condition.
    fn parse_condition(&mut self, alias: &str) -> Result<Condition, QueryError> {
        let negated = self.eat_keyword("NOT");
        if self.eat_keyword("IS_NULL") {
            self.expect(&Token::LParen, "(")?;
            let path = self.parse_path(alias)?;
            self.expect(&Token::RParen, ")")?;
            return Ok(Condition::IsNull {
                path,
                negated,
            });
        }
        if negated {
            return Err(QueryError::Unsupported("NOT is only supported before IS_NULL".to_string()));
        }
        if let Some(Token::Ident(word)) = self.peek()
            && is_function_call(word, self.tokens.get(self.position + 1))
        {
            return Err(QueryError::Unsupported(format!("function {word}")));
        }
        let path = self.parse_path(alias)?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(token) => {
                return Err(QueryError::UnexpectedToken {
                    expected: "comparison operator",
                    found: token.to_string(),
                });
            }
            None => {
                return Err(QueryError::UnexpectedEnd {
                    expected: "comparison operator",
                });
            }
        };
        match self.next() {
            Some(Token::Param(param)) => Ok(Condition::Compare {
                path,
                op,
                param,
            }),
            Some(Token::Number(value)) => Err(QueryError::LiteralValue(value)),
            Some(Token::Ident(word))
                if ["true", "false", "null"].contains(&word.to_ascii_lowercase().as_str()) =>
            {
                Err(QueryError::LiteralValue(word))
            }
            Some(token) => Err(QueryError::UnexpectedToken {
                expected: "parameter placeholder",
                found: token.to_string(),
            }),
            None => Err(QueryError::UnexpectedEnd {
                expected: "parameter placeholder",
            }),
        }
    }

    /// Parses `alias.field{.field}`.
    fn parse_path(&mut self, alias: &str) -> Result<FieldPath, QueryError> {
        let head = self.expect_ident("field path")?;
        if head != alias {
            return Err(QueryError::AliasMismatch {
                expected: alias.to_string(),
                found: head,
            });
        }
        let mut segments = Vec::new();
        while self.peek() == Some(&Token::Dot) {
            self.position += 1;
            segments.push(self.expect_field_name()?);
        }
        if segments.is_empty() {
            return Err(QueryError::InvalidField(head));
        }
        Ok(FieldPath {
            segments,
        })
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Consumes and returns the current token.
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Returns true when the current token is `keyword` (case-insensitive).
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    /// Consumes `keyword` when present.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Requires `keyword`.
    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), QueryError> {
        if self.eat_keyword(keyword) {
            return Ok(());
        }
        Err(self.unexpected(keyword))
    }

    /// Requires a specific token.
    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), QueryError> {
        if self.peek() == Some(token) {
            self.position += 1;
            return Ok(());
        }
        Err(self.unexpected(expected))
    }

    /// Requires an identifier that is not a reserved keyword.
    fn expect_ident(&mut self, expected: &'static str) -> Result<String, QueryError> {
        match self.peek() {
            Some(Token::Ident(word)) if !is_reserved(word) => {
                let word = word.clone();
                self.position += 1;
                Ok(word)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Requires a field name; keywords are allowed after a dot.
    fn expect_field_name(&mut self) -> Result<String, QueryError> {
        match self.peek() {
            Some(Token::Ident(word)) => {
                let word = word.clone();
                self.position += 1;
                Ok(word)
            }
            _ => Err(self.unexpected("field name")),
        }
    }

    /// Builds an error for the current position.
    fn unexpected(&self, expected: &'static str) -> QueryError {
        match self.peek() {
            Some(token) => QueryError::UnexpectedToken {
                expected,
                found: token.to_string(),
            },
            None => QueryError::UnexpectedEnd {
                expected,
            },
        }
    }
}

/// Returns true when `word` followed by `next` reads as a function call.
fn is_function_call(word: &str, next: Option<&Token>) -> bool {
    !is_reserved(word) && next == Some(&Token::LParen)
}

/// Returns true for reserved keywords.
fn is_reserved(word: &str) -> bool {
    const RESERVED: [&str; 12] =
        ["SELECT", "TOP", "FROM", "WHERE", "AND", "OR", "NOT", "ORDER", "BY", "ASC", "DESC", "IS_NULL"];
    RESERVED.iter().any(|keyword| keyword.eq_ignore_ascii_case(word))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn tokenizer_reads_operators_and_placeholders() {
        let tokens = tokenize("c.a <> @x AND c.b >= @y").unwrap();
        assert!(tokens.contains(&Token::Op(CompareOp::Ne)));
        assert!(tokens.contains(&Token::Op(CompareOp::Ge)));
        assert!(tokens.contains(&Token::Param("@y".to_string())));
    }

    #[test]
    fn tokenizer_rejects_quoted_literals() {
        let err = tokenize("c.a = 'x'").unwrap_err();
        assert!(matches!(err, QueryError::LiteralValue(_)));
    }

    #[test]
    fn parameter_names_require_identifier_after_at() {
        assert!(is_parameter_name("@target_id"));
        assert!(!is_parameter_name("target_id"));
        assert!(!is_parameter_name("@1abc"));
        assert!(!is_parameter_name("@"));
    }

    #[test]
    fn builder_output_reparses_to_same_query() {
        let text = QueryBuilder::for_collection()
            .top(1)
            .where_eq("target_id", "@target_id")
            .where_null("deleted_at")
            .order_by("id", SortDirection::Desc)
            .build()
            .unwrap();
        let parsed = ParsedQuery::parse(&text).unwrap();
        assert_eq!(parsed.to_string(), text);
        assert!(parsed.restricts_collection());
    }
}

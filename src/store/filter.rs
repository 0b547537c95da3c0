//! Caller-supplied selection and sort expressions.
//!
//! Selections are compiled into a [`Selection`] tree before anything touches
//! the store, so a malformed or out-of-scope expression fails the whole call
//! instead of executing partially. The accepted grammar is a boolean predicate
//! over the entry's own columns:
//!
//! ```text
//! expr   := term ( OR term )*
//! term   := factor ( AND factor )*
//! factor := '(' expr ')' | column op value
//! op     := '=' | '==' | '!=' | '<>'
//! value  := '?' | '?N' | 'quoted' | integer
//! ```

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use super::types::{BlockedEntry, Column, EntryId};

/// Longest accepted selection expression, in bytes.
pub const MAX_SELECTION_LEN: usize = 4096;

/// Deepest accepted parenthesis nesting.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Selection/sort compilation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("argument ?{0} out of range ({1} supplied)")]
    ArgumentOutOfRange(usize, usize),

    #[error("{0} arguments supplied but {1} referenced")]
    ArgumentCountMismatch(usize, usize),

    #[error("invalid sort order: {0}")]
    InvalidSort(String),

    #[error("expression of {0} bytes exceeds the {max} byte limit", max = MAX_SELECTION_LEN)]
    TooLong(usize),

    #[error("parentheses nested deeper than {max}", max = MAX_NESTING_DEPTH)]
    TooDeep,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Literal value bound into a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
}

/// Compiled boolean predicate over a [`BlockedEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Matches every entry
    All,
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Selection>),
    Or(Vec<Selection>),
}

impl Selection {
    /// Compile a caller-supplied expression with positional arguments.
    ///
    /// An empty or missing expression selects everything, provided no
    /// arguments were supplied.
    pub fn parse(expr: Option<&str>, args: &[String]) -> Result<Self, FilterError> {
        let expr = expr.map(str::trim).unwrap_or("");
        if expr.is_empty() {
            if !args.is_empty() {
                return Err(FilterError::ArgumentCountMismatch(args.len(), 0));
            }
            return Ok(Self::All);
        }
        if expr.len() > MAX_SELECTION_LEN {
            return Err(FilterError::TooLong(expr.len()));
        }

        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            args,
            next_arg: 0,
            max_arg: 0,
        };
        let selection = parser.expr()?;
        if let Some(tok) = parser.peek() {
            return Err(FilterError::UnexpectedToken(tok.describe()));
        }
        if parser.max_arg != args.len() {
            return Err(FilterError::ArgumentCountMismatch(args.len(), parser.max_arg));
        }
        Ok(selection)
    }

    /// Selection of a single entry by id.
    pub fn id(id: EntryId) -> Self {
        Self::Compare {
            column: Column::Id,
            op: CompareOp::Eq,
            value: Value::Integer(id.as_u64() as i64),
        }
    }

    /// `original_number = original OR e164_number = e164` (e164 arm only when non-empty).
    pub fn number(original: &str, e164: &str) -> Self {
        let by_original = Self::Compare {
            column: Column::OriginalNumber,
            op: CompareOp::Eq,
            value: Value::Text(original.to_string()),
        };
        if e164.is_empty() {
            return by_original;
        }
        Self::Or(vec![
            by_original,
            Self::Compare {
                column: Column::E164Number,
                op: CompareOp::Eq,
                value: Value::Text(e164.to_string()),
            },
        ])
    }

    /// Evaluate against an entry.
    pub fn matches(&self, entry: &BlockedEntry) -> bool {
        match self {
            Self::All => true,
            Self::Compare { column, op, value } => {
                let equal = column_equals(entry, *column, value);
                match op {
                    CompareOp::Eq => equal,
                    CompareOp::Ne => !equal,
                }
            }
            Self::And(parts) => parts.iter().all(|s| s.matches(entry)),
            Self::Or(parts) => parts.iter().any(|s| s.matches(entry)),
        }
    }
}

fn column_equals(entry: &BlockedEntry, column: Column, value: &Value) -> bool {
    match (column, value) {
        (Column::Id, Value::Integer(i)) => entry.id.as_u64() as i64 == *i,
        (Column::Id, Value::Text(s)) => s.trim().parse::<i64>().ok() == Some(entry.id.as_u64() as i64),
        (Column::OriginalNumber, Value::Text(s)) => entry.original_number == *s,
        (Column::OriginalNumber, Value::Integer(i)) => entry.original_number == i.to_string(),
        (Column::E164Number, Value::Text(s)) => entry.e164_number == *s,
        (Column::E164Number, Value::Integer(i)) => entry.e164_number == i.to_string(),
    }
}

/// Sort order over entry columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<(Column, bool)>,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            keys: vec![(Column::Id, false)],
        }
    }
}

impl SortOrder {
    /// Parse `column [ASC|DESC] (, column [ASC|DESC])*`. Empty → by id.
    pub fn parse(order: Option<&str>) -> Result<Self, FilterError> {
        let order = order.map(str::trim).unwrap_or("");
        if order.is_empty() {
            return Ok(Self::default());
        }

        let mut keys = Vec::new();
        for part in order.split(',') {
            let mut words = part.split_whitespace();
            let name = words
                .next()
                .ok_or_else(|| FilterError::InvalidSort(order.to_string()))?;
            let column = Column::from_name(name)
                .ok_or_else(|| FilterError::UnknownColumn(name.to_string()))?;
            let descending = match words.next() {
                None => false,
                Some(w) if w.eq_ignore_ascii_case("asc") => false,
                Some(w) if w.eq_ignore_ascii_case("desc") => true,
                Some(_) => return Err(FilterError::InvalidSort(order.to_string())),
            };
            if words.next().is_some() {
                return Err(FilterError::InvalidSort(order.to_string()));
            }
            keys.push((column, descending));
        }
        Ok(Self { keys })
    }

    /// Sort entries in place.
    pub fn apply(&self, entries: &mut [BlockedEntry]) {
        entries.sort_by(|a, b| {
            for (column, descending) in &self.keys {
                let ord = match column {
                    Column::Id => a.id.cmp(&b.id),
                    Column::OriginalNumber => a.original_number.cmp(&b.original_number),
                    Column::E164Number => a.e164_number.cmp(&b.e164_number),
                };
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Param(Option<usize>),
    Op(CompareOp),
    And,
    Or,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => s.clone(),
            Token::Str(s) => format!("'{}'", s),
            Token::Int(i) => i.to_string(),
            Token::Param(Some(n)) => format!("?{}", n),
            Token::Param(None) => "?".to_string(),
            Token::Op(CompareOp::Eq) => "=".to_string(),
            Token::Op(CompareOp::Ne) => "!=".to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
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
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Op(CompareOp::Ne)),
                    _ => return Err(FilterError::UnexpectedChar('!')),
                }
            }
            '<' => {
                chars.next();
                match chars.next() {
                    Some('>') => tokens.push(Token::Op(CompareOp::Ne)),
                    _ => return Err(FilterError::UnexpectedChar('<')),
                }
            }
            '?' => {
                chars.next();
                let digits = take_digits(&mut chars);
                let index = if digits.is_empty() {
                    None
                } else {
                    Some(digits.parse().map_err(|_| FilterError::UnexpectedToken(format!("?{}", digits)))?)
                };
                tokens.push(Token::Param(index));
            }
            '\'' => {
                chars.next();
                tokens.push(Token::Str(take_string(&mut chars)?));
            }
            '-' | '0'..='9' => {
                chars.next();
                let mut digits = String::new();
                if c == '-' {
                    digits.push('-');
                } else {
                    digits.push(c);
                }
                digits.push_str(&take_digits(&mut chars));
                let value = digits
                    .parse()
                    .map_err(|_| FilterError::UnexpectedToken(digits.clone()))?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident.eq_ignore_ascii_case("and") {
                    tokens.push(Token::And);
                } else if ident.eq_ignore_ascii_case("or") {
                    tokens.push(Token::Or);
                } else {
                    tokens.push(Token::Ident(ident));
                }
            }
            other => return Err(FilterError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    digits
}

fn take_string(chars: &mut Peekable<Chars<'_>>) -> Result<String, FilterError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some('\'') => {
                // '' is an escaped quote
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    return Ok(value);
                }
            }
            Some(c) => value.push(c),
            None => return Err(FilterError::UnterminatedString),
        }
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    /// Open parentheses enclosing the current position
    depth: usize,
    args: &'a [String],
    next_arg: usize,
    max_arg: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, FilterError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(FilterError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expr(&mut self) -> Result<Selection, FilterError> {
        let mut parts = vec![self.term()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            parts.push(self.term()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Selection::Or(parts)
        })
    }

    fn term(&mut self) -> Result<Selection, FilterError> {
        let mut parts = vec![self.factor()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            parts.push(self.factor()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Selection::And(parts)
        })
    }

    fn factor(&mut self) -> Result<Selection, FilterError> {
        match self.advance()? {
            Token::LParen => {
                if self.depth >= MAX_NESTING_DEPTH {
                    return Err(FilterError::TooDeep);
                }
                self.depth += 1;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance()? {
                    Token::RParen => Ok(inner),
                    other => Err(FilterError::UnexpectedToken(other.describe())),
                }
            }
            Token::Ident(name) => {
                let column =
                    Column::from_name(&name).ok_or(FilterError::UnknownColumn(name))?;
                let op = match self.advance()? {
                    Token::Op(op) => op,
                    other => return Err(FilterError::UnexpectedToken(other.describe())),
                };
                let value = self.value()?;
                Ok(Selection::Compare { column, op, value })
            }
            other => Err(FilterError::UnexpectedToken(other.describe())),
        }
    }

    fn value(&mut self) -> Result<Value, FilterError> {
        match self.advance()? {
            Token::Str(s) => Ok(Value::Text(s)),
            Token::Int(i) => Ok(Value::Integer(i)),
            Token::Param(index) => {
                // Bare '?' takes the slot after the highest one seen so far
                let index = index.unwrap_or(self.next_arg + 1);
                if index == 0 || index > self.args.len() {
                    return Err(FilterError::ArgumentOutOfRange(index, self.args.len()));
                }
                self.next_arg = self.next_arg.max(index);
                self.max_arg = self.max_arg.max(index);
                Ok(Value::Text(self.args[index - 1].clone()))
            }
            other => Err(FilterError::UnexpectedToken(other.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, original: &str, e164: &str) -> BlockedEntry {
        BlockedEntry {
            id: EntryId::from_u64(id),
            original_number: original.to_string(),
            e164_number: e164.to_string(),
        }
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_selects_all() {
        assert_eq!(Selection::parse(None, &[]).unwrap(), Selection::All);
        assert_eq!(Selection::parse(Some("  "), &[]).unwrap(), Selection::All);
        assert!(Selection::parse(None, &args(&["x"])).is_err());
    }

    #[test]
    fn test_unblock_style_selection() {
        let sel = Selection::parse(
            Some("original_number=? or e164_number=?"),
            &args(&["555-0100", "+15550100"]),
        )
        .unwrap();

        assert!(sel.matches(&entry(1, "555-0100", "")));
        assert!(sel.matches(&entry(2, "5550100", "+15550100")));
        assert!(!sel.matches(&entry(3, "5550199", "+15550199")));
    }

    #[test]
    fn test_numbered_params_and_grouping() {
        let sel = Selection::parse(
            Some("(original_number = ?1 OR e164_number = ?1) AND _id != ?2"),
            &args(&["+15550100", "7"]),
        )
        .unwrap();

        assert!(sel.matches(&entry(1, "+15550100", "")));
        assert!(!sel.matches(&entry(7, "+15550100", "")));
    }

    #[test]
    fn test_literals() {
        let sel = Selection::parse(Some("_id = 3 OR original_number = 'it''s'"), &[]).unwrap();
        assert!(sel.matches(&entry(3, "x", "")));
        assert!(sel.matches(&entry(9, "it's", "")));
        assert!(!sel.matches(&entry(9, "its", "")));
    }

    #[test]
    fn test_rejects_injection() {
        assert!(matches!(
            Selection::parse(Some("1=1; DROP TABLE blocked"), &[]),
            Err(FilterError::UnexpectedToken(_)) | Err(FilterError::UnexpectedChar(_))
        ));
        assert!(Selection::parse(Some("original_number = ? --"), &args(&["a"])).is_err());
        assert!(Selection::parse(
            Some("original_number = ?) OR (1"),
            &args(&["a"])
        )
        .is_err());
    }

    #[test]
    fn test_rejects_unknown_columns() {
        assert_eq!(
            Selection::parse(Some("name = ?"), &args(&["a"])),
            Err(FilterError::UnknownColumn("name".to_string()))
        );
    }

    #[test]
    fn test_argument_checks() {
        assert_eq!(
            Selection::parse(Some("_id = ?"), &[]),
            Err(FilterError::ArgumentOutOfRange(1, 0))
        );
        assert_eq!(
            Selection::parse(Some("_id = ?"), &args(&["1", "2"])),
            Err(FilterError::ArgumentCountMismatch(2, 1))
        );
    }

    #[test]
    fn test_incomplete_expressions() {
        assert_eq!(
            Selection::parse(Some("_id ="), &[]),
            Err(FilterError::UnexpectedEnd)
        );
        assert!(Selection::parse(Some("(_id = 1"), &[]).is_err());
        assert!(Selection::parse(Some("'unterminated"), &[]).is_err());
    }

    #[test]
    fn test_sort_order() {
        let mut entries = vec![entry(1, "b", ""), entry(2, "a", ""), entry(3, "c", "")];

        SortOrder::parse(Some("original_number DESC")).unwrap().apply(&mut entries);
        let order: Vec<_> = entries.iter().map(|e| e.original_number.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);

        SortOrder::parse(None).unwrap().apply(&mut entries);
        assert_eq!(entries[0].id, EntryId::from_u64(1));

        assert!(SortOrder::parse(Some("_id; DROP")).is_err());
        assert!(SortOrder::parse(Some("name")).is_err());
        assert!(SortOrder::parse(Some("_id sideways")).is_err());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |depth: usize| {
            format!("{}_id = 1{}", "(".repeat(depth), ")".repeat(depth))
        };

        assert!(Selection::parse(Some(&nested(MAX_NESTING_DEPTH)), &[]).is_ok());
        assert_eq!(
            Selection::parse(Some(&nested(MAX_NESTING_DEPTH + 1)), &[]),
            Err(FilterError::TooDeep)
        );

        // far past the limit fails fast instead of exhausting the stack
        let deep = format!("{}_id = 1", "(".repeat(2000));
        assert_eq!(Selection::parse(Some(&deep), &[]), Err(FilterError::TooDeep));
    }

    #[test]
    fn test_length_is_bounded() {
        let long = format!("original_number = '{}'", "1".repeat(MAX_SELECTION_LEN));
        assert_eq!(
            Selection::parse(Some(&long), &[]),
            Err(FilterError::TooLong(long.len()))
        );

        let huge = format!("{}_id = 1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            Selection::parse(Some(&huge), &[]),
            Err(FilterError::TooLong(_))
        ));
    }
}

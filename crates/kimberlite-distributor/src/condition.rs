//! The test-and-set condition evaluator (SPEC_FULL.md "Condition evaluator").
//!
//! spec.md leaves the selection expression grammar unspecified beyond "a
//! selection expression string"; `original_source`'s `document::select`
//! parser implements the full Vespa document-selection language, which is
//! out of scope here (DESIGN.md Open Question). We implement a small
//! boolean expression language over typed document fields — enough to
//! express realistic test-and-set conditions like
//! `fields.amount > 100 and fields.status == "pending"` — and parse it into
//! an AST that's evaluated directly rather than compiled, matching the
//! recursive-descent style `kimberlite-query`'s parser uses for its own
//! expression grammar.

use crate::types::{Document, FieldValue};

/// A parsed test-and-set condition, ready to be evaluated against a
/// candidate document.
#[derive(Debug, Clone, PartialEq)]
pub struct TasCondition {
    expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        literal: FieldValue,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Raised when a test-and-set condition string fails to parse.
///
/// Maps to [`crate::error::ReturnCode::IllegalParameters`] at the call site
/// (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ConditionParseError(String);

impl TasCondition {
    /// Parses a selection expression.
    ///
    /// Grammar (informally): a `|`-free, `'`/`"`-quoted-literal boolean
    /// expression of `field OP literal` comparisons joined by `and`/`or`
    /// (left-associative, `and` binds tighter than `or`), optionally
    /// parenthesized.
    pub fn parse(selection: &str) -> Result<Self, ConditionParseError> {
        let tokens = tokenize(selection)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(ConditionParseError(format!(
                "unexpected trailing input at token {}",
                parser.pos
            )));
        }
        Ok(TasCondition { expr })
    }

    /// Evaluates this condition against `doc`. Returns `true` only if the
    /// condition matches exactly (spec.md §4.6: "result must be exactly
    /// 'true' to count as a match" — an absent or untyped field never
    /// matches, it simply fails the comparison rather than erroring).
    pub fn matches(&self, doc: &Document) -> bool {
        eval(&self.expr, doc)
    }
}

fn eval(expr: &Expr, doc: &Document) -> bool {
    match expr {
        Expr::And(lhs, rhs) => eval(lhs, doc) && eval(rhs, doc),
        Expr::Or(lhs, rhs) => eval(lhs, doc) || eval(rhs, doc),
        Expr::Compare { field, op, literal } => doc
            .fields
            .get(field)
            .is_some_and(|value| compare(value, *op, literal)),
    }
}

fn compare(value: &FieldValue, op: CompareOp, literal: &FieldValue) -> bool {
    use CompareOp::{Eq as OpEq, Ge, Gt, Le, Lt, Ne};
    let ordering = match (value, literal) {
        (FieldValue::Int(a), FieldValue::Int(b)) => a.partial_cmp(b),
        (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
        (FieldValue::Int(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
        (FieldValue::Float(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
        (FieldValue::Str(a), FieldValue::Str(b)) => a.partial_cmp(b),
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a.partial_cmp(b),
        _ => return false,
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        OpEq => ordering.is_eq(),
        Ne => !ordering.is_eq(),
        Lt => ordering.is_lt(),
        Le => ordering.is_le(),
        Gt => ordering.is_gt(),
        Ge => ordering.is_ge(),
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(f64),
    Bool(bool),
    Op(CompareOp),
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ConditionParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(ConditionParseError(format!(
                        "unterminated string literal starting at {i}"
                    )));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Eq));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ne));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Le));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(CompareOp::Ge));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op(CompareOp::Lt));
                i += 1;
            }
            '>' => {
                tokens.push(Token::Op(CompareOp::Gt));
                i += 1;
            }
            _ if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number: f64 = text
                    .parse()
                    .map_err(|_| ConditionParseError(format!("invalid number literal '{text}'")))?;
                tokens.push(Token::Number(number));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" | "AND" => Token::And,
                    "or" | "OR" => Token::Or,
                    "true" | "TRUE" => Token::Bool(true),
                    "false" | "FALSE" => Token::Bool(false),
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(ConditionParseError(format!(
                    "unexpected character '{other}' at position {i}"
                )));
            }
        }
    }
    Ok(tokens)
}

// ============================================================================
// Recursive-descent parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionParseError> {
        let mut lhs = self.parse_atom()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, ConditionParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.parse_or()?;
            match self.advance() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(ConditionParseError("expected ')'".to_string())),
            }
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionParseError> {
        let field = match self.advance() {
            Some(Token::Ident(name)) => name.clone(),
            other => {
                return Err(ConditionParseError(format!(
                    "expected field name, found {other:?}"
                )));
            }
        };
        let op = match self.advance() {
            Some(Token::Op(op)) => *op,
            other => return Err(ConditionParseError(format!("expected operator, found {other:?}"))),
        };
        let literal = match self.advance() {
            Some(Token::Str(s)) => FieldValue::Str(s.clone()),
            Some(Token::Number(n)) => FieldValue::Float(*n),
            Some(Token::Bool(b)) => FieldValue::Bool(*b),
            other => return Err(ConditionParseError(format!("expected literal, found {other:?}"))),
        };
        Ok(Expr::Compare { field, op, literal })
    }
}

//! Boolean evaluation of fully substituted condition strings.
//!
//! Grammar (keywords are case-insensitive, `AND` binds tighter than `OR`):
//!
//! ```text
//! condition  := and_group ( OR and_group )*
//! and_group  := primary ( AND primary )*
//! primary    := '(' condition ')' | comparison | TRUE | FALSE
//! comparison := operand op operand
//! op         := == | != | > | < | >= | <= | CONTAINS | NOT_CONTAINS
//! operand    := 'quoted' | bare | '[' operand ( ',' operand )* ']'
//! ```

use crate::ConditionError;
use std::cmp::Ordering;

/// Deepest parenthesis nesting accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse and evaluate a condition in one step
pub fn evaluate_condition(condition: &str) -> Result<bool, ConditionError> {
    ConditionalGroup::parse(condition)?.evaluate()
}

/// Parsed boolean condition
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalGroup {
    root: Node,
}

impl ConditionalGroup {
    pub fn parse(condition: &str) -> Result<Self, ConditionError> {
        let tokens = Lexer::new(condition).tokenize()?;
        if tokens.is_empty() {
            return Err(ConditionError::Syntax {
                position: 0,
                message: "empty condition".to_string(),
            });
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.condition()?;
        if let Some(token) = parser.tokens.get(parser.pos) {
            return Err(ConditionError::Syntax {
                position: token.position,
                message: format!("unexpected {:?}", token.kind),
            });
        }

        Ok(Self { root })
    }

    pub fn evaluate(&self) -> Result<bool, ConditionError> {
        self.root.evaluate()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Or(Vec<Node>),
    And(Vec<Node>),
    Compare {
        left: Operand,
        op: Operator,
        right: Operand,
    },
    Constant(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
}

impl Node {
    fn evaluate(&self) -> Result<bool, ConditionError> {
        match self {
            Node::Or(nodes) => {
                for node in nodes {
                    if node.evaluate()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Node::And(nodes) => {
                for node in nodes {
                    if !node.evaluate()? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Node::Compare { left, op, right } => compare(left, *op, right),
            Node::Constant(value) => Ok(*value),
        }
    }
}

fn compare(left: &Operand, op: Operator, right: &Operand) -> Result<bool, ConditionError> {
    match op {
        Operator::Contains => contains(left, right),
        Operator::NotContains => contains(left, right).map(|found| !found),
        _ => {
            let (Operand::Scalar(l), Operand::Scalar(r)) = (left, right) else {
                return Err(ConditionError::Evaluation(format!(
                    "{:?} is only defined for single values",
                    op
                )));
            };
            let ordering = order(l, r);
            Ok(match op {
                Operator::Equal => ordering == Ordering::Equal,
                Operator::NotEqual => ordering != Ordering::Equal,
                Operator::Greater => ordering == Ordering::Greater,
                Operator::Less => ordering == Ordering::Less,
                Operator::GreaterOrEqual => ordering != Ordering::Less,
                Operator::LessOrEqual => ordering != Ordering::Greater,
                Operator::Contains | Operator::NotContains => unreachable!("handled above"),
            })
        }
    }
}

/// Numeric when both sides are numbers, case-insensitive text otherwise
fn order(left: &str, right: &str) -> Ordering {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.to_lowercase().cmp(&right.to_lowercase()),
    }
}

fn contains(left: &Operand, right: &Operand) -> Result<bool, ConditionError> {
    let member = |list: &[String], value: &str| list.iter().any(|item| order(item, value) == Ordering::Equal);
    Ok(match (left, right) {
        (Operand::List(list), Operand::Scalar(value)) => member(list, value),
        (Operand::Scalar(value), Operand::List(list)) => member(list, value),
        (Operand::List(list), Operand::List(wanted)) => wanted.iter().all(|w| member(list, w)),
        (Operand::Scalar(haystack), Operand::Scalar(needle)) => {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Quoted(String),
    Bare(String),
    Op(Operator),
    And,
    Or,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ConditionError> {
        let mut tokens = Vec::new();
        while let Some(&(position, c)) = self.chars.peek() {
            let kind = match c {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                '\'' => self.quoted(position)?,
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                '=' | '!' | '<' | '>' => self.symbol(position)?,
                _ => self.bare(position),
            };
            tokens.push(Token { kind, position });
        }
        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.chars.next();
        kind
    }

    fn quoted(&mut self, start: usize) -> Result<TokenKind, ConditionError> {
        self.chars.next();
        let mut value = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == '\'' {
                return Ok(TokenKind::Quoted(value));
            }
            value.push(c);
        }
        Err(ConditionError::Syntax {
            position: start,
            message: "unterminated quoted literal".to_string(),
        })
    }

    fn symbol(&mut self, start: usize) -> Result<TokenKind, ConditionError> {
        let Some((_, first)) = self.chars.next() else {
            return Err(ConditionError::Syntax {
                position: start,
                message: "unexpected end of input".to_string(),
            });
        };
        let followed_by_eq = matches!(self.chars.peek(), Some(&(_, '=')));
        if followed_by_eq {
            self.chars.next();
        }
        let op = match (first, followed_by_eq) {
            ('=', true) => Operator::Equal,
            ('!', true) => Operator::NotEqual,
            ('>', true) => Operator::GreaterOrEqual,
            ('<', true) => Operator::LessOrEqual,
            ('>', false) => Operator::Greater,
            ('<', false) => Operator::Less,
            _ => {
                return Err(ConditionError::Syntax {
                    position: start,
                    message: format!("unknown operator '{}'", first),
                })
            }
        };
        Ok(TokenKind::Op(op))
    }

    fn bare(&mut self, start: usize) -> TokenKind {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_whitespace() || "'()[],=!<>".contains(c) {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        let word = &self.input[start..end];
        match word.to_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "CONTAINS" => TokenKind::Op(Operator::Contains),
            "NOT_CONTAINS" => TokenKind::Op(Operator::NotContains),
            _ => TokenKind::Bare(word.to_string()),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.position)
            .unwrap_or_default()
    }

    fn next(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> ConditionError {
        ConditionError::Syntax {
            position: self.position(),
            message: message.into(),
        }
    }

    fn condition(&mut self) -> Result<Node, ConditionError> {
        let mut groups = vec![self.and_group()?];
        while self.peek() == Some(&TokenKind::Or) {
            self.next();
            groups.push(self.and_group()?);
        }
        Ok(if groups.len() == 1 {
            groups.remove(0)
        } else {
            Node::Or(groups)
        })
    }

    fn and_group(&mut self) -> Result<Node, ConditionError> {
        let mut nodes = vec![self.primary()?];
        while self.peek() == Some(&TokenKind::And) {
            self.next();
            nodes.push(self.primary()?);
        }
        Ok(if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            Node::And(nodes)
        })
    }

    fn primary(&mut self) -> Result<Node, ConditionError> {
        if self.peek() == Some(&TokenKind::LParen) {
            if self.depth >= MAX_NESTING_DEPTH {
                return Err(self.error("nesting too deep"));
            }
            self.next();
            self.depth += 1;
            let inner = self.condition()?;
            self.depth -= 1;
            return match self.next() {
                Some(TokenKind::RParen) => Ok(inner),
                _ => Err(self.error("expected ')'")),
            };
        }

        let left = self.operand()?;
        match self.peek() {
            Some(TokenKind::Op(op)) => {
                let op = *op;
                self.next();
                let right = self.operand()?;
                Ok(Node::Compare { left, op, right })
            }
            _ => match &left {
                Operand::Scalar(word) if word.eq_ignore_ascii_case("true") => Ok(Node::Constant(true)),
                Operand::Scalar(word) if word.eq_ignore_ascii_case("false") => Ok(Node::Constant(false)),
                _ => Err(self.error("expected a comparison operator")),
            },
        }
    }

    fn operand(&mut self) -> Result<Operand, ConditionError> {
        match self.next() {
            Some(TokenKind::Quoted(value)) | Some(TokenKind::Bare(value)) => Ok(Operand::Scalar(value)),
            Some(TokenKind::LBracket) => {
                let mut items = Vec::new();
                loop {
                    match self.next() {
                        Some(TokenKind::Quoted(value)) | Some(TokenKind::Bare(value)) => items.push(value),
                        Some(TokenKind::RBracket) if items.is_empty() => break,
                        _ => return Err(self.error("expected a list item")),
                    }
                    match self.next() {
                        Some(TokenKind::Comma) => continue,
                        Some(TokenKind::RBracket) => break,
                        _ => return Err(self.error("expected ',' or ']'")),
                    }
                }
                Ok(Operand::List(items))
            }
            _ => Err(self.error("expected a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_binds_tighter_than_or() {
        assert!(evaluate_condition("'a' == 'b' AND 'x' == 'y' OR 'c' == 'c'").unwrap());
        assert!(!evaluate_condition("'a' == 'b' AND ('x' == 'y' OR 'c' == 'c')").unwrap());
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(evaluate_condition("'10' > '9'").unwrap());
        assert!(evaluate_condition("'2.50' == '2.5'").unwrap());
        assert!(evaluate_condition("'abc' < 'abd'").unwrap());
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |depth: usize| format!("{}'a' == 'a'{}", "(".repeat(depth), ")".repeat(depth));
        assert!(evaluate_condition(&nested(MAX_NESTING_DEPTH)).unwrap());
        assert!(matches!(
            evaluate_condition(&nested(MAX_NESTING_DEPTH + 1)),
            Err(ConditionError::Syntax { ref message, .. }) if message == "nesting too deep"
        ));
        assert!(evaluate_condition(&nested(30_000)).is_err());
    }

    #[test]
    fn lexer_reports_unterminated_literal() {
        assert!(matches!(
            evaluate_condition("'abc == 'abc'"),
            Err(ConditionError::Syntax { .. })
        ));
    }
}

// Combinator Expression Parser
// Parses tokens into an AST: literals, arithmetic and named calls only

use crate::expression::lexer::{LexError, Lexer, Token};

use std::fmt;

/// Abstract syntax tree node for parameter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Null literal (optional argument placeholder)
    Null,

    /// Number literal
    Number(f64),

    /// String literal
    Str(String),

    /// List literal: [1, 2, 3]
    List(Vec<Expr>),

    /// Named call: cross(a, b), range(1, 10)
    Call { name: String, args: Vec<Expr> },

    /// Unary operation: -expr
    Unary { op: UnaryOp, expr: Box<Expr> },

    /// Binary operation: a + b
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // - (unary minus)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add, // +
    Sub, // -
    Mul, // *
    Div, // /
    Mod, // %
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Mod => write!(f, "%"),
        }
    }
}

/// Parse error
#[derive(Debug, Clone)]
pub struct ParseExprError {
    pub message: String,
}

impl ParseExprError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseExprError {}

impl From<LexError> for ParseExprError {
    fn from(err: LexError) -> Self {
        Self::new(err.to_string())
    }
}

/// Recursive descent parser over the token stream
pub struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    /// Parse a complete expression from source text
    pub fn parse(input: &str) -> Result<Expr, ParseExprError> {
        let tokens = Lexer::new(input).tokenize()?;
        let mut parser = Self { tokens, pos: 0 };
        let expr = parser.additive()?;
        parser.expect(Token::Eof)?;
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseExprError> {
        let token = self.advance();
        if token != expected {
            return Err(ParseExprError::new(format!(
                "expected {} but found {}",
                expected, token
            )));
        }
        Ok(())
    }

    fn additive(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseExprError> {
        if *self.peek() == Token::Minus {
            self.advance();
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseExprError> {
        match self.advance() {
            Token::Null => Ok(Expr::Null),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::LParen => {
                let expr = self.additive()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if *self.peek() != Token::RBracket {
                    loop {
                        items.push(self.additive()?);
                        if *self.peek() != Token::Comma {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Ident(name) => {
                // The restricted grammar only admits identifiers as
                // call heads; bare references do not exist.
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    loop {
                        args.push(self.additive()?);
                        if *self.peek() != Token::Comma {
                            break;
                        }
                        self.advance();
                    }
                }
                self.expect(Token::RParen)?;
                Ok(Expr::Call { name, args })
            }
            token => Err(ParseExprError::new(format!(
                "unexpected token {}",
                token
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_calls() {
        let expr = ExprParser::parse("cross(var('A'), repeat(var('B'), 3))").unwrap();
        let Expr::Call { name, args } = expr else {
            panic!("expected call");
        };
        assert_eq!(name, "cross");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[1], Expr::Call { name, .. } if name == "repeat"));
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let expr = ExprParser::parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_parse_list_literal() {
        let expr = ExprParser::parse("[1, 2, 'x']").unwrap();
        assert!(matches!(expr, Expr::List(items) if items.len() == 3));
    }

    #[test]
    fn test_bare_identifier_rejected() {
        assert!(ExprParser::parse("cross").is_err());
        assert!(ExprParser::parse("1 +").is_err());
    }
}

// Combinator Expression Lexer
// Tokenizes the restricted parameter expression language

use std::fmt;

/// Token types for parameter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Null,
    Number(f64),
    Str(String),

    // Function names
    Ident(String),

    // Operators
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %
    Comma,   // ,

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]

    // End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Comma => write!(f, ","),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer error
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lexer for parameter expressions
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let Some(&(pos, ch)) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        self.position = pos;

        match ch {
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '*' => self.single(Token::Star),
            '/' => self.single(Token::Slash),
            '%' => self.single(Token::Percent),
            ',' => self.single(Token::Comma),
            '(' => self.single(Token::LParen),
            ')' => self.single(Token::RParen),
            '[' => self.single(Token::LBracket),
            ']' => self.single(Token::RBracket),
            '\'' | '"' => self.read_string(ch),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_ident(),
            c => Err(LexError {
                message: format!("unexpected character '{}'", c),
                position: pos,
            }),
        }
    }

    fn single(&mut self, token: Token) -> Result<Token, LexError> {
        self.chars.next();
        Ok(token)
    }

    fn read_string(&mut self, quote: char) -> Result<Token, LexError> {
        self.chars.next();
        let mut value = String::new();
        for (_, ch) in self.chars.by_ref() {
            if ch == quote {
                return Ok(Token::Str(value));
            }
            value.push(ch);
        }
        Err(LexError {
            message: "unterminated string".to_string(),
            position: self.position,
        })
    }

    fn read_number(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                text.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        text.parse()
            .map(Token::Number)
            .map_err(|_| LexError {
                message: format!("invalid number '{}'", text),
                position: self.position,
            })
    }

    fn read_ident(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        if text == "null" {
            return Ok(Token::Null);
        }
        Ok(Token::Ident(text))
    }
}

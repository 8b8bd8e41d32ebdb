//! Tokenizer for filter rules

use super::FilterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Str(String),
    True,
    False,
    If,
    Else,
    Define,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Question,
    Colon,
    /// `;` or a significant line break
    Terminator,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, FilterError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    col: usize,
    paren_depth: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            col: 1,
            paren_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, line: usize, col: usize, message: impl Into<String>) -> FilterError {
        FilterError::Syntax {
            line,
            col,
            message: message.into(),
        }
    }

    fn push(&mut self, kind: TokenKind, line: usize, col: usize) {
        self.tokens.push(Token { kind, line, col });
    }

    fn run(mut self) -> Result<Vec<Token>, FilterError> {
        while let Some(&c) = self.chars.peek() {
            let (line, col) = (self.line, self.col);

            if c == '\n' {
                self.bump();
                // Line breaks inside parentheses never end a statement
                if self.paren_depth == 0 {
                    self.push(TokenKind::Terminator, line, col);
                }
                continue;
            }
            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c.is_ascii_digit() {
                let kind = self.number(line, col)?;
                self.push(kind, line, col);
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                let kind = self.word();
                self.push(kind, line, col);
                continue;
            }

            self.bump();
            let kind = match c {
                '"' => self.string(line, col)?,
                '`' => self.raw_string(line, col)?,
                '/' if self.eat('/') => {
                    while let Some(&next) = self.chars.peek() {
                        if next == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                ':' if self.eat('=') => TokenKind::Define,
                ':' => TokenKind::Colon,
                '=' if self.eat('=') => TokenKind::Eq,
                '=' => TokenKind::Assign,
                '!' if self.eat('=') => TokenKind::NotEq,
                '!' => TokenKind::Not,
                '<' if self.eat('=') => TokenKind::LtEq,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::GtEq,
                '>' => TokenKind::Gt,
                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '(' => {
                    self.paren_depth += 1;
                    TokenKind::LParen
                }
                ')' => {
                    self.paren_depth = self.paren_depth.saturating_sub(1);
                    TokenKind::RParen
                }
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                ',' => TokenKind::Comma,
                '?' => TokenKind::Question,
                ';' => TokenKind::Terminator,
                other => return Err(self.error(line, col, format!("unexpected character '{}'", other))),
            };
            self.push(kind, line, col);
        }

        let (line, col) = (self.line, self.col);
        self.push(TokenKind::Eof, line, col);
        Ok(self.tokens)
    }

    fn number(&mut self, line: usize, col: usize) -> Result<TokenKind, FilterError> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        digits
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| self.error(line, col, format!("integer literal {} out of range", digits)))
    }

    fn word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match word.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            _ => TokenKind::Ident(word),
        }
    }

    fn string(&mut self, line: usize, col: usize) -> Result<TokenKind, FilterError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error(line, col, "unterminated string literal")),
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(self.error(line, col, format!("unknown escape sequence '\\{}'", other)))
                        }
                        None => return Err(self.error(line, col, "unterminated string literal")),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn raw_string(&mut self, line: usize, col: usize) -> Result<TokenKind, FilterError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(line, col, "unterminated raw string literal")),
                Some('`') => return Ok(TokenKind::Str(value)),
                Some(c) => value.push(c),
            }
        }
    }
}

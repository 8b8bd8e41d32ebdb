//! Recursive-descent parser producing the rule AST

use super::lexer::{Token, TokenKind};
use super::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Define {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Option<Vec<Stmt>>,
    },
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, FilterError> {
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.statements(false)?;
    parser.expect(TokenKind::Eof, "end of rule")?;
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_terminators(&mut self) {
        while self.eat(&TokenKind::Terminator) {}
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> FilterError {
        FilterError::Syntax {
            line: token.line,
            col: token.col,
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, FilterError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            Err(self.error_at(&found, format!("expected {}, found {}", what, describe(&found.kind))))
        }
    }

    /// Statement list up to Eof, or up to the closing brace of a block
    fn statements(&mut self, in_block: bool) -> Result<Vec<Stmt>, FilterError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_terminators();
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::RBrace if in_block => break,
                _ => {}
            }
            stmts.push(self.statement()?);

            match self.peek().kind {
                TokenKind::Terminator | TokenKind::Eof => {}
                TokenKind::RBrace if in_block => {}
                _ => {
                    let found = self.peek().clone();
                    return Err(self.error_at(
                        &found,
                        format!("expected end of statement, found {}", describe(&found.kind)),
                    ));
                }
            }
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, FilterError> {
        let token = self.advance();
        match token.kind {
            TokenKind::If => self.if_statement(),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::Define) {
                    Ok(Stmt::Define {
                        name,
                        value: self.expression()?,
                    })
                } else if self.eat(&TokenKind::Assign) {
                    Ok(Stmt::Assign {
                        name,
                        value: self.expression()?,
                    })
                } else {
                    let found = self.peek().clone();
                    Err(self.error_at(
                        &found,
                        format!("expected ':=' or '=' after '{}', found {}", name, describe(&found.kind)),
                    ))
                }
            }
            other => Err(FilterError::Syntax {
                line: token.line,
                col: token.col,
                message: format!("expected statement, found {}", describe(&other)),
            }),
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, FilterError> {
        let cond = self.expression()?;
        let then = self.block()?;

        // `else` may sit on the line after the closing brace
        let save = self.pos;
        self.skip_terminators();
        let otherwise = if self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            self.pos = save;
            None
        };

        Ok(Stmt::If { cond, then, otherwise })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, FilterError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.statements(true)?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    pub fn expression(&mut self) -> Result<Expr, FilterError> {
        let cond = self.binary(0)?;
        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        self.skip_terminators();
        let then = self.expression()?;
        self.skip_terminators();
        self.expect(TokenKind::Colon, "':' in conditional expression")?;
        self.skip_terminators();
        let otherwise = self.expression()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Precedence climbing over the left-associative binary operators
    fn binary(&mut self, min_level: u8) -> Result<Expr, FilterError> {
        let mut lhs = self.unary()?;
        while let Some((op, level)) = binary_op(&self.peek().kind) {
            if level < min_level {
                break;
            }
            self.advance();
            self.skip_terminators();
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FilterError> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.primary(),
        };
        self.advance();
        Ok(Expr::Unary {
            op,
            expr: Box::new(self.unary()?),
        })
    }

    fn primary(&mut self) -> Result<Expr, FilterError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(value) => Ok(Expr::Int(value)),
            TokenKind::Str(value) => Ok(Expr::Str(value)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Ident(name) => {
                if !self.eat(&TokenKind::LParen) {
                    return Ok(Expr::Ident(name));
                }
                let mut args = Vec::new();
                if !self.eat(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&TokenKind::RParen) {
                            break;
                        }
                        self.expect(TokenKind::Comma, "',' or ')'")?;
                    }
                }
                Ok(Expr::Call { name, args })
            }
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(FilterError::Syntax {
                line: token.line,
                col: token.col,
                message: format!("expected expression, found {}", describe(&other)),
            }),
        }
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let op = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::Eq => (BinaryOp::Eq, 3),
        TokenKind::NotEq => (BinaryOp::NotEq, 3),
        TokenKind::Lt => (BinaryOp::Lt, 3),
        TokenKind::LtEq => (BinaryOp::LtEq, 3),
        TokenKind::Gt => (BinaryOp::Gt, 3),
        TokenKind::GtEq => (BinaryOp::GtEq, 3),
        TokenKind::Plus => (BinaryOp::Add, 4),
        TokenKind::Minus => (BinaryOp::Sub, 4),
        TokenKind::Star => (BinaryOp::Mul, 5),
        TokenKind::Slash => (BinaryOp::Div, 5),
        TokenKind::Percent => (BinaryOp::Rem, 5),
        _ => return None,
    };
    Some(op)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Int(value) => format!("integer {}", value),
        TokenKind::Str(value) => format!("string {:?}", value),
        TokenKind::Terminator => "end of statement".to_string(),
        TokenKind::Eof => "end of rule".to_string(),
        other => format!("{:?}", other),
    }
}

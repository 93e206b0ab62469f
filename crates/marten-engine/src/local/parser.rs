//! Recursive-descent parser for the local scripting dialect.

use marten_value::num_bigint::BigInt;

use crate::error::{EngineError, EngineResult};
use crate::local::lexer::{Spanned, Token, tokenize};

#[derive(Debug, Clone)]
pub enum Stmt {
    Let(String, Expr),
    Assign(AssignTarget, Expr),
    Expr(Expr),
    Throw(Expr, u32),
    TryCatch {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Member(Expr, String, u32),
    Index(Expr, Expr, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Big(BigInt),
    Str(String),
    Ident(String, u32),
    Member(Box<Expr>, String, u32),
    Index(Box<Expr>, Box<Expr>, u32),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    Binary(BinOp, Box<Expr>, Box<Expr>, u32),
    Unary(UnOp, Box<Expr>),
    ObjectLit(Vec<(String, Expr)>),
}

pub fn parse(source: &str) -> EngineResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while !parser.at(&Token::Eof) {
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos].line
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> EngineResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(what))
        }
    }

    fn error(&self, what: &str) -> EngineError {
        EngineError::Syntax(format!(
            "expected {what} at line {}, found {:?}",
            self.line(),
            self.peek()
        ))
    }

    fn ident(&mut self, what: &str) -> EngineResult<String> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.error(what)),
        }
    }

    fn statement(&mut self) -> EngineResult<Stmt> {
        let line = self.line();
        match self.peek() {
            Token::Let => {
                self.bump();
                let name = self.ident("variable name")?;
                self.expect(Token::Assign, "'='")?;
                let value = self.expression()?;
                self.eat(&Token::Semi);
                Ok(Stmt::Let(name, value))
            }
            Token::Function => {
                self.bump();
                let name = self.ident("function name")?;
                self.expect(Token::LParen, "'('")?;
                let mut params = Vec::new();
                if !self.at(&Token::RParen) {
                    loop {
                        params.push(self.ident("parameter name")?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "')'")?;
                let body = self.block()?;
                Ok(Stmt::Function { name, params, body })
            }
            Token::Return => {
                self.bump();
                let value = if self.at(&Token::Semi) || self.at(&Token::RBrace) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.eat(&Token::Semi);
                Ok(Stmt::Return(value))
            }
            Token::Throw => {
                self.bump();
                let value = self.expression()?;
                self.eat(&Token::Semi);
                Ok(Stmt::Throw(value, line))
            }
            Token::Try => {
                self.bump();
                let body = self.block()?;
                self.expect(Token::Catch, "'catch'")?;
                self.expect(Token::LParen, "'('")?;
                let binding = self.ident("catch binding")?;
                self.expect(Token::RParen, "')'")?;
                let handler = self.block()?;
                Ok(Stmt::TryCatch {
                    body,
                    binding,
                    handler,
                })
            }
            Token::While => {
                self.bump();
                self.expect(Token::LParen, "'('")?;
                let cond = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body })
            }
            Token::If => {
                self.bump();
                self.expect(Token::LParen, "'('")?;
                let cond = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                let then = self.block()?;
                let otherwise = if self.eat(&Token::Else) {
                    if self.at(&Token::If) {
                        vec![self.statement()?]
                    } else {
                        self.block()?
                    }
                } else {
                    Vec::new()
                };
                Ok(Stmt::If {
                    cond,
                    then,
                    otherwise,
                })
            }
            _ => {
                let expr = self.expression()?;
                if self.at(&Token::Assign) {
                    let target = match expr {
                        Expr::Ident(name, _) => AssignTarget::Name(name),
                        Expr::Member(object, name, line) => {
                            AssignTarget::Member(*object, name, line)
                        }
                        Expr::Index(object, key, line) => AssignTarget::Index(*object, *key, line),
                        _ => return Err(self.error("assignable target")),
                    };
                    self.bump();
                    let value = self.expression()?;
                    self.eat(&Token::Semi);
                    return Ok(Stmt::Assign(target, value));
                }
                self.eat(&Token::Semi);
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn block(&mut self) -> EngineResult<Vec<Stmt>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.at(&Token::Eof) {
                return Err(self.error("'}'"));
            }
            stmts.push(self.statement()?);
        }
        self.bump();
        Ok(stmts)
    }

    fn expression(&mut self) -> EngineResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> EngineResult<Expr> {
        let mut left = self.and_expr()?;
        while self.at(&Token::OrOr) {
            let line = self.line();
            self.bump();
            let right = self.and_expr()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> EngineResult<Expr> {
        let mut left = self.equality()?;
        while self.at(&Token::AndAnd) {
            let line = self.line();
            self.bump();
            let right = self.equality()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn equality(&mut self) -> EngineResult<Expr> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::NotEq,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> EngineResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::LtEq => BinOp::LtEq,
                Token::Gt => BinOp::Gt,
                Token::GtEq => BinOp::GtEq,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn additive(&mut self) -> EngineResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> EngineResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right), line);
        }
        Ok(left)
    }

    fn unary(&mut self) -> EngineResult<Expr> {
        match self.peek() {
            Token::Bang => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.unary()?)))
            }
            Token::Minus => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.unary()?)))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> EngineResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    let line = self.line();
                    self.bump();
                    let name = self.ident("member name")?;
                    expr = Expr::Member(Box::new(expr), name, line);
                }
                Token::LBracket => {
                    let line = self.line();
                    self.bump();
                    let key = self.expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(key), line);
                }
                Token::LParen => {
                    let line = self.line();
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen, "')'")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        line,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> EngineResult<Expr> {
        let line = self.line();
        match self.peek().clone() {
            Token::Undefined => {
                self.bump();
                Ok(Expr::Undefined)
            }
            Token::Null => {
                self.bump();
                Ok(Expr::Null)
            }
            Token::True => {
                self.bump();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.bump();
                Ok(Expr::Bool(false))
            }
            Token::Int(value) => {
                self.bump();
                Ok(Expr::Int(value))
            }
            Token::Float(value) => {
                self.bump();
                Ok(Expr::Float(value))
            }
            Token::Big(value) => {
                self.bump();
                Ok(Expr::Big(value))
            }
            Token::Str(value) => {
                self.bump();
                Ok(Expr::Str(value))
            }
            // `new Ctor(...)` is sugar for calling the constructor value.
            Token::New => {
                self.bump();
                let name = self.ident("constructor name")?;
                Ok(Expr::Ident(name, line))
            }
            Token::Ident(name) => {
                self.bump();
                Ok(Expr::Ident(name, line))
            }
            Token::LParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBrace => {
                self.bump();
                let mut fields = Vec::new();
                if !self.at(&Token::RBrace) {
                    loop {
                        let key = match self.peek().clone() {
                            Token::Ident(name) => {
                                self.bump();
                                name
                            }
                            Token::Str(name) => {
                                self.bump();
                                name
                            }
                            _ => return Err(self.error("property name")),
                        };
                        self.expect(Token::Colon, "':'")?;
                        fields.push((key, self.expression()?));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RBrace, "'}'")?;
                Ok(Expr::ObjectLit(fields))
            }
            _ => Err(self.error("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_function_and_call() {
        let stmts = parse("function double(x) { return x * 2; } double(3);").unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0], Stmt::Function { name, params, .. }
            if name == "double" && params == &["x".to_string()]));
        assert!(matches!(&stmts[1], Stmt::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_parses_try_catch_and_throw() {
        let stmts = parse("try { throw TypeError('bad'); } catch (e) { e.message; }").unwrap();
        assert!(matches!(&stmts[0], Stmt::TryCatch { binding, .. } if binding == "e"));
    }

    #[test]
    fn test_member_assignment_target() {
        let stmts = parse("obj.field = 1;").unwrap();
        assert!(matches!(
            &stmts[0],
            Stmt::Assign(AssignTarget::Member(_, name, _), _) if name == "field"
        ));
    }

    #[test]
    fn test_missing_brace_is_syntax_error() {
        assert!(matches!(
            parse("while (true) { 1;"),
            Err(EngineError::Syntax(_))
        ));
    }
}

//! The parser
//!
//! A hand-written recursive-descent parser over the token stream produced
//! by [`super::lex::Lexer`]. Precedence, low to high: `and` < `not` <
//! `<` (comparison) < `+`/`-` < `*`.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::Id;

use super::ast::*;
use super::lex::*;

#[derive(Display)]
#[display("Parse error: {}", self.0)]
pub struct ParseError(String);

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

fn err<T>(msg: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError(msg.into()))
}

pub fn parse(input: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::tokenize(input).map_err(|e| ParseError(e.to_string()))?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.parse_program()?;
    if parser.pos != parser.tokens.len() {
        return err(format!(
            "unexpected trailing input at token {}",
            parser.pos
        ));
    }
    Ok(program)
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token<'src>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        match self.advance() {
            Some(tok) if tok.kind == kind => Ok(tok),
            Some(tok) => err(format!("expected {kind}, found {}", tok.kind)),
            None => err(format!("expected {kind}, found end of input")),
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_id(&mut self) -> Result<Id, ParseError> {
        let tok = self.expect(TokenKind::Id)?;
        Ok(Id::from(tok.text.to_string()))
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        self.expect(TokenKind::Def)?;
        let main = self.parse_id()?;
        if main.as_str() != "main" {
            return err(format!("expected program name 'main', found '{main}'"));
        }
        self.expect(TokenKind::With)?;
        self.expect(TokenKind::Input)?;
        let input = self.parse_id()?;
        self.expect(TokenKind::Output)?;
        let output = self.parse_id()?;
        self.expect(TokenKind::As)?;
        let body = self.parse_command()?;
        Ok(Program { input, output, body })
    }

    /// `stmt (';' stmt)*`, folded left-associatively into nested `Seq`.
    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut cmd = self.parse_stmt()?;
        while self.eat(TokenKind::Semi) {
            let next = self.parse_stmt()?;
            cmd = Command::Seq(Box::new(cmd), Box::new(next));
        }
        Ok(cmd)
    }

    /// A parenthesized command, or a single statement.
    fn parse_block(&mut self) -> Result<Command, ParseError> {
        if self.eat(TokenKind::LParen) {
            let cmd = self.parse_command()?;
            self.expect(TokenKind::RParen)?;
            Ok(cmd)
        } else {
            self.parse_stmt()
        }
    }

    fn parse_stmt(&mut self) -> Result<Command, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Skip) => {
                self.advance();
                Ok(Command::Skip)
            }
            Some(TokenKind::Id) => {
                let name = self.parse_id()?;
                self.expect(TokenKind::Assign)?;
                let rhs = self.parse_int_expr()?;
                Ok(Command::Assign(name, rhs))
            }
            Some(TokenKind::If) => {
                self.advance();
                let cond = self.parse_bool_expr()?;
                self.expect(TokenKind::Then)?;
                let tt = self.parse_block()?;
                self.expect(TokenKind::Else)?;
                let ff = self.parse_block()?;
                Ok(Command::If {
                    cond,
                    tt: Box::new(tt),
                    ff: Box::new(ff),
                })
            }
            Some(TokenKind::While) => {
                self.advance();
                let cond = self.parse_bool_expr()?;
                self.expect(TokenKind::Do)?;
                let body = self.parse_block()?;
                Ok(Command::While {
                    cond,
                    body: Box::new(body),
                })
            }
            Some(kind) => err(format!("expected a statement, found {kind}")),
            None => err("expected a statement, found end of input"),
        }
    }

    // --- integer expressions: add/sub (left-assoc) over mul (left-assoc) over atoms ---

    fn parse_int_expr(&mut self) -> Result<IntExpr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => IntOp::Add,
                Some(TokenKind::Minus) => IntOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = IntExpr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<IntExpr, ParseError> {
        let mut lhs = self.parse_int_atom()?;
        while self.peek_kind() == Some(TokenKind::Mul) {
            self.advance();
            let rhs = self.parse_int_atom()?;
            lhs = IntExpr::BinOp {
                op: IntOp::Mul,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_int_atom(&mut self) -> Result<IntExpr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Id) => Ok(IntExpr::Var(self.parse_id()?)),
            Some(TokenKind::Num) => {
                let tok = self.advance().expect("peeked");
                let n: i64 = tok
                    .text
                    .parse()
                    .map_err(|_| ParseError(format!("invalid integer literal '{}'", tok.text)))?;
                Ok(IntExpr::Const(n))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let e = self.parse_int_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            Some(kind) => err(format!("expected an integer expression, found {kind}")),
            None => err("expected an integer expression, found end of input"),
        }
    }

    // --- boolean expressions: and (left-assoc) over not (prefix) over atoms ---

    fn parse_bool_expr(&mut self) -> Result<BoolExpr, ParseError> {
        let mut lhs = self.parse_not_expr()?;
        while self.peek_kind() == Some(TokenKind::And) {
            self.advance();
            let rhs = self.parse_not_expr()?;
            lhs = BoolExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not_expr(&mut self) -> Result<BoolExpr, ParseError> {
        if self.eat(TokenKind::Not) {
            Ok(BoolExpr::Not(Box::new(self.parse_not_expr()?)))
        } else {
            self.parse_bool_atom()
        }
    }

    fn parse_bool_atom(&mut self) -> Result<BoolExpr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::True) => {
                self.advance();
                Ok(BoolExpr::True)
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(BoolExpr::False)
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let b = self.parse_bool_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(b)
            }
            _ => {
                let lhs = self.parse_int_expr()?;
                self.expect(TokenKind::Lt)?;
                let rhs = self.parse_int_expr()?;
                Ok(BoolExpr::Less(Box::new(lhs), Box::new(rhs)))
            }
        }
    }
}

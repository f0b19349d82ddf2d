//! The lexer.

use derive_more::Display;
use regex::Regex;

/// Tokens in the program
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("kind: '{kind}', part of input: '{text}'")]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
}

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("num")]
    Num,
    #[display(":=")]
    Assign,
    #[display("def")]
    Def,
    #[display("with")]
    With,
    #[display("input")]
    Input,
    #[display("output")]
    Output,
    #[display("as")]
    As,
    #[display("skip")]
    Skip,
    #[display("if")]
    If,
    #[display("then")]
    Then,
    #[display("else")]
    Else,
    #[display("while")]
    While,
    #[display("do")]
    Do,
    #[display("true")]
    True,
    #[display("false")]
    False,
    #[display("and")]
    And,
    #[display("not")]
    Not,
    #[display(";")]
    Semi,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Mul,
    #[display("<")]
    Lt,
}

pub struct LexError(usize, char);

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

impl std::fmt::Debug for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lexer error: unexpected character {:?} at {}", self.1, self.0)
    }
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    whitespace: Regex,
    matchers: Vec<(Regex, TokenKind)>,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        // Keywords are tried before the general identifier matcher, and are
        // anchored with a word boundary so `inputx` still lexes as one `Id`.
        let keyword = |kw: &str| Regex::new(&format!(r"\A{}\b", regex::escape(kw))).unwrap();

        Lexer {
            input,
            pos: 0,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://.*))*").unwrap(),
            matchers: vec![
                (keyword("def"), TokenKind::Def),
                (keyword("with"), TokenKind::With),
                (keyword("input"), TokenKind::Input),
                (keyword("output"), TokenKind::Output),
                (keyword("as"), TokenKind::As),
                (keyword("skip"), TokenKind::Skip),
                (keyword("if"), TokenKind::If),
                (keyword("then"), TokenKind::Then),
                (keyword("else"), TokenKind::Else),
                (keyword("while"), TokenKind::While),
                (keyword("do"), TokenKind::Do),
                (keyword("true"), TokenKind::True),
                (keyword("false"), TokenKind::False),
                (keyword("and"), TokenKind::And),
                (keyword("not"), TokenKind::Not),
                (Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(), TokenKind::Id),
                (Regex::new(r"\A[0-9]+").unwrap(), TokenKind::Num),
                (Regex::new(r"\A:=").unwrap(), TokenKind::Assign),
                (Regex::new(r"\A;").unwrap(), TokenKind::Semi),
                (Regex::new(r"\A\(").unwrap(), TokenKind::LParen),
                (Regex::new(r"\A\)").unwrap(), TokenKind::RParen),
                (Regex::new(r"\A\+").unwrap(), TokenKind::Plus),
                (Regex::new(r"\A-").unwrap(), TokenKind::Minus),
                (Regex::new(r"\A\*").unwrap(), TokenKind::Mul),
                (Regex::new(r"\A<").unwrap(), TokenKind::Lt),
            ],
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    // Skip comments and whitespace
    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.pos += m.end()
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let rest = &self.input[self.pos..];
        for (re, kind) in &self.matchers {
            if let Some(m) = re.find(rest) {
                let text = &rest[..m.end()];
                self.pos += m.end();
                return Ok(Some(Token { kind: *kind, text }));
            }
        }
        let bad = rest.chars().next().expect("end_of_input already checked");
        Err(LexError(self.pos, bad))
    }

    /// Tokenize the whole input eagerly; a convenience for the parser and
    /// for `smolc --out tokens`.
    pub fn tokenize(input: &'input str) -> Result<Vec<Token<'input>>, LexError> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some(tok) = lexer.next()? {
            out.push(tok);
        }
        Ok(out)
    }
}

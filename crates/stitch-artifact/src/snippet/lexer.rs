//! Snippet tokens

use logos::Logos;
use std::fmt::{self, Display, Formatter};
use std::ops::Range;

/// Snippet token
///
/// Keywords win over identifiers of the same length.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("log")]
    Log,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,

    /// Positional reference: `$0` is the receiver, `$1..` the parameters
    #[regex(r"\$[0-9]+", |lex| lex.slice()[1..].parse::<u16>().ok())]
    Positional(u16),

    /// Named placeholder such as `$e`
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Placeholder(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    /// Identifier; `$` is allowed after the first character for nested classes
    #[regex(r"[A-Za-z_][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Return => "return",
            Token::Throw => "throw",
            Token::Log => "log",
            Token::Let => "let",
            Token::If => "if",
            Token::Else => "else",
            Token::This => "this",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Semi => ";",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Assign => "=",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Positional(n) => return write!(f, "${n}"),
            Token::Placeholder(name) | Token::Ident(name) => name,
            Token::Int(n) => return write!(f, "{n}"),
            Token::Str(s) => return write!(f, "{s:?}"),
        };
        f.write_str(text)
    }
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Tokenize a snippet, pairing each token with its byte span
///
/// # Errors
/// Returns the byte offset of the first unrecognized input
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, usize> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => return Err(lexer.span().start),
        }
    }
    Ok(tokens)
}

//! Snippet language
//!
//! Directives carry short statement fragments as text (`addCatch`
//! templates). A snippet is tokenized with [`logos`] and parsed by a small
//! recursive-descent parser into the same [`Stmt`] tree that compiled
//! bodies use.
//!
//! # Grammar
//!
//! ```text
//! stmt := 'return' expr? ';' | 'throw' expr ';' | 'log' '(' expr ')' ';'
//!       | 'let' ident '=' expr ';' | 'if' '(' expr ')' block ('else' block)?
//!       | '{' stmt* '}' | place '=' expr ';' | expr ';'
//! expr := additive (('==' | '!=' | '<' | '>') additive)*
//! ```
//!
//! `$0` is the receiver, `$1..$n` are the parameters and `$e` is the fault
//! caught by a guard. `a.b.C.m(..)` is a static call, `m(..)` and
//! `this.m(..)` call the receiver.

mod lexer;
mod parser;

pub use lexer::Token;

use crate::body::Stmt;
use parser::Parser;

/// Placeholder bound to the caught fault inside a catch template
pub const CATCH_BINDING: &str = "$e";

/// Snippet parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct SnippetError {
    pub message: String,
    /// Byte offset into the snippet source
    pub offset: usize,
}

/// Parse a statement snippet
///
/// # Errors
/// Returns error on unrecognized characters or malformed statements
pub fn parse(source: &str) -> Result<Vec<Stmt>, SnippetError> {
    let tokens = lexer::tokenize(source).map_err(|offset| SnippetError {
        message: "unrecognized input".into(),
        offset,
    })?;
    let mut parser = Parser::new(&tokens, source.len());
    let stmts = parser.statements()?;
    if !parser.at_end() {
        return Err(parser.trailing());
    }
    if stmts.is_empty() {
        return Err(SnippetError {
            message: "snippet has no statements".into(),
            offset: 0,
        });
    }
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BinOp, Expr, Value};
    use crate::name::ClassName;
    use pretty_assertions::assert_eq;

    #[test]
    fn catch_template_with_placeholder() {
        let stmts = parse(r#"log("failed: " + $e); return false;"#).unwrap();
        assert_eq!(
            stmts,
            vec![
                Stmt::Log {
                    message: Expr::Binary {
                        op: BinOp::Add,
                        lhs: Box::new(Expr::str("failed: ")),
                        rhs: Box::new(Expr::local(CATCH_BINDING)),
                    },
                },
                Stmt::Return {
                    value: Some(Expr::constant(Value::Bool(false))),
                },
            ]
        );
    }

    #[test]
    fn outer_braces_are_flattened() {
        let braced = parse("{ return; }").unwrap();
        assert_eq!(braced, parse("return;").unwrap());
    }

    #[test]
    fn paths_resolve_to_static_and_receiver_access() {
        let stmts = parse("a.b.Log.e(\"tag\", $1); this.count = $0.count + 1; run();").unwrap();
        assert_eq!(
            stmts[0],
            Stmt::Eval {
                expr: Expr::InvokeStatic {
                    owner: ClassName::new("a.b.Log").unwrap(),
                    method: "e".into(),
                    args: vec![Expr::str("tag"), Expr::Param { index: 0 }],
                },
            }
        );
        assert_eq!(
            stmts[1],
            Stmt::SetInstance {
                name: "count".into(),
                value: Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(Expr::InstanceField {
                        name: "count".into()
                    }),
                    rhs: Box::new(Expr::constant(Value::Int(1))),
                },
            }
        );
        assert_eq!(
            stmts[2],
            Stmt::Eval {
                expr: Expr::InvokeVirtual {
                    method: "run".into(),
                    args: vec![],
                },
            }
        );
    }

    #[test]
    fn static_field_assignment() {
        let stmts = parse("a.Foo.TAG = \"x\";").unwrap();
        assert_eq!(
            stmts,
            vec![Stmt::SetStatic {
                owner: ClassName::new("a.Foo").unwrap(),
                name: "TAG".into(),
                value: Expr::str("x"),
            }]
        );
    }

    #[test]
    fn if_else_without_braces() {
        let stmts = parse("if ($1 > 0) return 1; else return -1;").unwrap();
        let Stmt::If {
            then, otherwise, ..
        } = &stmts[0]
        else {
            panic!("expected if");
        };
        assert_eq!(then.len(), 1);
        assert_eq!(
            otherwise[0],
            Stmt::Return {
                value: Some(Expr::constant(Value::Int(-1)))
            }
        );
    }

    #[test]
    fn errors_carry_offsets() {
        let err = parse("return").unwrap_err();
        assert_eq!(err.offset, 6);
        assert!(err.message.contains("end of input"));

        let err = parse("log(1)").unwrap_err();
        assert!(err.message.contains("';'"));

        let err = parse("1 = 2;").unwrap_err();
        assert!(err.message.contains("not assignable"));

        assert!(parse("").is_err());
        assert!(parse("return; }").is_err());
        assert!(parse("log(#);").is_err());
    }
}

//! Method body instruction trees
//!
//! Compiled bodies are stored as a small structured tree of [`Stmt`] and
//! [`Expr`] nodes. The tree is what the mutator splices and what the
//! verifier walks for symbol references.

use crate::name::ClassName;
use std::fmt::{self, Display, Formatter};

/// Constant value
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    /// Truthiness used by `if` and advice guards
    #[inline]
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    /// Integer addition, or concatenation when either side is a string
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Gt,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Const {
        value: Value,
    },
    /// Receiver of an instance-bound body
    This,
    /// Zero-based parameter
    Param {
        index: u16,
    },
    Local {
        name: String,
    },
    StaticField {
        owner: ClassName,
        name: String,
    },
    /// Field of the receiver
    InstanceField {
        name: String,
    },
    InvokeStatic {
        owner: ClassName,
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    /// Method of the receiver (resolved through the super chain)
    InvokeVirtual {
        method: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    /// Constant shorthand
    #[inline]
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Expr::Const { value }
    }

    /// String constant shorthand
    #[inline]
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Expr::Const {
            value: Value::Str(value.into()),
        }
    }

    /// Local variable shorthand
    #[inline]
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Expr::Local { name: name.into() }
    }

    /// Visit this expression and every nested one, pre-order
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::InvokeStatic { args, .. } | Expr::InvokeVirtual { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            _ => {}
        }
    }
}

/// Statement node
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
    },
    SetStatic {
        owner: ClassName,
        name: String,
        value: Expr,
    },
    SetInstance {
        name: String,
        value: Expr,
    },
    Eval {
        expr: Expr,
    },
    Log {
        message: Expr,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        otherwise: Vec<Stmt>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    Throw {
        message: Expr,
    },
    /// Guarded region: a fault raised inside `body` binds to `binding` and
    /// runs `handler` instead of propagating
    Guard {
        body: Vec<Stmt>,
        binding: String,
        handler: Vec<Stmt>,
    },
}

impl Stmt {
    /// Expressions directly owned by this statement (not nested blocks)
    pub fn exprs(&self) -> impl Iterator<Item = &Expr> {
        let (first, second): (Option<&Expr>, Option<&Expr>) = match self {
            Stmt::Let { value, .. }
            | Stmt::SetStatic { value, .. }
            | Stmt::SetInstance { value, .. } => (Some(value), None),
            Stmt::Eval { expr } => (Some(expr), None),
            Stmt::Log { message } | Stmt::Throw { message } => (Some(message), None),
            Stmt::If { cond, .. } => (Some(cond), None),
            Stmt::Return { value } => (value.as_ref(), None),
            Stmt::Guard { .. } => (None, None),
        };
        first.into_iter().chain(second)
    }
}

/// Whether every path through the block ends in `return` or `throw`
#[must_use]
pub fn always_exits(stmts: &[Stmt]) -> bool {
    match stmts.last() {
        Some(Stmt::Return { .. } | Stmt::Throw { .. }) => true,
        Some(Stmt::If {
            then, otherwise, ..
        }) => always_exits(then) && always_exits(otherwise),
        Some(Stmt::Guard { body, handler, .. }) => always_exits(body) && always_exits(handler),
        _ => false,
    }
}

/// Remove assignments to a field, recursing into nested blocks
///
/// Returns the number of statements removed.
pub fn strip_field_writes(stmts: &mut Vec<Stmt>, owner: &ClassName, field: &str, is_static: bool) -> usize {
    let before = stmts.len();
    stmts.retain(|stmt| match stmt {
        Stmt::SetStatic { owner: o, name, .. } => !(is_static && o == owner && name == field),
        Stmt::SetInstance { name, .. } => !(!is_static && name == field),
        _ => true,
    });
    let mut removed = before - stmts.len();
    for stmt in stmts.iter_mut() {
        match stmt {
            Stmt::If {
                then, otherwise, ..
            } => {
                removed += strip_field_writes(then, owner, field, is_static);
                removed += strip_field_writes(otherwise, owner, field, is_static);
            }
            Stmt::Guard { body, handler, .. } => {
                removed += strip_field_writes(body, owner, field, is_static);
                removed += strip_field_writes(handler, owner, field, is_static);
            }
            _ => {}
        }
    }
    removed
}

//! Expression AST nodes

use super::span::Spanned;
use serde::{Deserialize, Serialize};

/// Expression kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Null literal
    NullLit,
    /// Boolean literal
    BoolLit(bool),
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// String literal (escapes already processed)
    StringLit(String),
    /// Variable reference
    Var(String),
    /// Implicit receiver inside methods and constructors
    This,
    /// List literal
    ListLit(Vec<Spanned<Expr>>),
    /// Dict literal; keys are string literals
    DictLit(Vec<(String, Spanned<Expr>)>),
    /// Unary operation
    Unary {
        op: UnOp,
        operand: Box<Spanned<Expr>>,
    },
    /// Binary operation (including `and`/`or`, which short-circuit)
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    /// Call with an arbitrary callee expression
    Call {
        callee: Box<Spanned<Expr>>,
        args: Vec<Spanned<Expr>>,
    },
    /// Method call; the receiver is evaluated exactly once
    MethodCall {
        recv: Box<Spanned<Expr>>,
        method: String,
        args: Vec<Spanned<Expr>>,
    },
    /// Property read
    FieldAccess {
        obj: Box<Spanned<Expr>>,
        field: String,
    },
    /// Subscript read
    Index {
        obj: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
    /// Instance construction
    New {
        class: String,
        args: Vec<Spanned<Expr>>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{s}")
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not"),
        }
    }
}

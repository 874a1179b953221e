//! Abstract Syntax Tree definitions

mod expr;
mod span;

pub use expr::{BinOp, Expr, UnOp};
pub use span::{Span, Spanned};

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A complete program: the statement list of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Spanned<Stmt>>,
}

/// A brace-delimited statement sequence
pub type Block = Vec<Spanned<Stmt>>;

/// Statement kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = expr;`
    Let { name: String, init: Spanned<Expr> },
    /// `fn name(params) { ... }`; shared so every closure over this
    /// declaration points at one body
    Fn(Rc<FuncDecl>),
    /// `class Name { ... }`
    Class(ClassDecl),
    /// `if (cond) { ... } else ...`; the else branch is either a block
    /// statement or a chained if
    If {
        cond: Spanned<Expr>,
        then_block: Block,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    /// `while (cond) { ... }`
    While { cond: Spanned<Expr>, body: Block },
    /// `for (var = start to end) { ... }`, inclusive bound
    ForRange {
        var: String,
        start: Spanned<Expr>,
        end: Spanned<Expr>,
        body: Block,
    },
    /// `for (var in collection) { ... }`
    ForEach {
        var: String,
        iter: Spanned<Expr>,
        body: Block,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `return expr;` (`return;` carries a null literal)
    Return(Spanned<Expr>),
    /// `try { ... } catch (e) { ... } finally { ... }`
    Try {
        body: Block,
        catch: Option<CatchClause>,
        finally: Option<Block>,
    },
    /// `import "path.ql";`
    Import(String),
    /// Bare `{ ... }` block
    Block(Block),
    /// Assignment statement; never creates a binding
    Assign {
        target: AssignTarget,
        value: Spanned<Expr>,
    },
    /// Expression statement
    Expr(Spanned<Expr>),
}

/// Catch clause of a try statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    /// Name bound to the error message, if declared
    pub var: Option<String>,
    pub body: Block,
}

/// Left-hand side of an assignment statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    /// `name = ...`
    Var(String),
    /// `obj.field = ...`
    Field {
        obj: Box<Spanned<Expr>>,
        field: String,
    },
    /// `obj[index] = ...`
    Index {
        obj: Box<Spanned<Expr>>,
        index: Box<Spanned<Expr>>,
    },
}

/// Function declaration; also used for class members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
}

/// Class declaration; a member named `init` is the constructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub members: Vec<Rc<FuncDecl>>,
}

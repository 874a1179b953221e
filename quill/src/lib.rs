//! Quill Interpreter Library
//!
//! A small dynamically typed scripting language with closures, classes,
//! and a mark-and-sweep heap.

pub mod ast;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;

pub use ast::Span;
pub use error::{CompileError, Result};

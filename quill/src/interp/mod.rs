//! Tree-walking interpreter: tagged values, a mark-and-sweep heap, and
//! lexical environments threaded through an AST evaluator.

mod builtins;
mod env;
mod error;
mod eval;
mod heap;
mod object;
mod table;
mod value;

pub use env::{child_env, EnvRef, Environment};
pub use error::{ErrorKind, InterpResult, RuntimeError};
pub use eval::Interpreter;
pub use heap::Heap;
pub use object::{BuiltinFn, Object};
pub use table::Table;
pub use value::{display_value, type_name, value_equal, ObjId, Value};

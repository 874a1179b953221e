use std::rc::Rc;

use crate::ast::FuncDecl;

use super::env::EnvRef;
use super::error::InterpResult;
use super::heap::Heap;
use super::table::Table;
use super::value::{ObjId, Value};

/// A builtin callable. Builtins are leaf calls: they may read and allocate
/// on the heap but never re-enter the evaluator, so allocation inside one
/// never triggers a collection mid-call.
pub type BuiltinFn = fn(&mut Heap, &[Value]) -> InterpResult<Value>;

/// Heap-allocated payload of a [`Value::Obj`].
#[derive(Debug, Clone)]
pub enum Object {
    /// Immutable text with its FNV-1a hash precomputed at allocation, so
    /// string equality can reject on hash before comparing bytes.
    Str { text: String, hash: u32 },
    List(Vec<Value>),
    Dict(Table),
    /// User function plus the scope chain captured at its definition site.
    Function { decl: Rc<FuncDecl>, closure: EnvRef },
    /// `ctor` is the member named `init`, stored apart from the method table.
    Class { name: String, ctor: Option<ObjId>, methods: Table },
    Instance { class: ObjId, fields: Table },
    Native { name: &'static str, func: BuiltinFn },
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Str { .. } => "string",
            Object::List(_) => "list",
            Object::Dict(_) => "dict",
            Object::Function { .. } => "function",
            Object::Class { .. } => "class",
            Object::Instance { .. } => "instance",
            Object::Native { .. } => "native",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::Str { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Object::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Table> {
        match self {
            Object::Dict(table) => Some(table),
            _ => None,
        }
    }
}

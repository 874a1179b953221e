use super::heap::Heap;
use super::object::Object;

/// Index of an object slot in the [`Heap`] arena.
pub type ObjId = usize;

/// A runtime value.
///
/// Immediate values (`Null`, `Bool`, `Int`, `Float`) live inline and copy
/// freely. Everything else is an [`Object`] on the heap, referenced by slot
/// index. Two `Obj` values are `==` exactly when they point at the same slot,
/// which gives identity semantics for lists, dicts and instances; string
/// content comparison goes through [`value_equal`] instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Obj(ObjId),
}

impl Value {
    /// Only `null` and `false` are falsy. Zero, empty strings and empty
    /// collections all count as truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(*id),
            _ => None,
        }
    }
}

/// Name of a value's runtime type, as reported by the `type` builtin and
/// used in error messages.
pub fn type_name(heap: &Heap, value: Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Obj(id) => heap.get(id).type_name(),
    }
}

/// Renders a value the way `print` shows it.
///
/// Strings print bare (no quotes), inside collections too. Floats use the
/// host's shortest round-trip formatting, so `1.0` prints as `1`. Cycles are
/// not detected; printing a self-referencing list recurses.
pub fn display_value(heap: &Heap, value: Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Obj(id) => match heap.get(id) {
            Object::Str { text, .. } => text.clone(),
            Object::List(items) => {
                let parts: Vec<String> =
                    items.iter().map(|v| display_value(heap, *v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Object::Dict(table) => {
                let parts: Vec<String> = table
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, display_value(heap, v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Object::Function { decl, .. } => format!("<fn {}>", decl.name),
            Object::Class { name, .. } => format!("<class {name}>"),
            Object::Instance { class, .. } => {
                let name = match heap.get(*class) {
                    Object::Class { name, .. } => name.as_str(),
                    _ => "?",
                };
                format!("<{name} instance>")
            }
            Object::Native { name, .. } => format!("<native fn {name}>"),
        },
    }
}

/// Equality as the `==` operator sees it.
///
/// No coercion across types: `1 == 1.0` is false, `0 == false` is false.
/// Strings compare by content (hash first, then bytes); every other object
/// compares by identity.
pub fn value_equal(heap: &Heap, a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Obj(x), Value::Obj(y)) => {
            if x == y {
                return true;
            }
            match (heap.get(x), heap.get(y)) {
                (
                    Object::Str { text: tx, hash: hx },
                    Object::Str { text: ty, hash: hy },
                ) => hx == hy && tx == ty,
                _ => false,
            }
        }
        _ => false,
    }
}

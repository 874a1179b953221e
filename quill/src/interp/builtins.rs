//! Builtin function library, seeded into the global environment at startup.
//!
//! Builtins are leaf calls: they receive the heap and the already-evaluated
//! argument values, and they never re-enter the evaluator. Missing trailing
//! arguments read as Null; where a default is sensible (an optional prompt,
//! a slice end) Null selects it, and anywhere else an unusable argument
//! type is a Type error.

use std::io;
use std::thread;
use std::time::Duration;

use rand::Rng;

use super::env::EnvRef;
use super::error::{InterpResult, RuntimeError};
use super::heap::Heap;
use super::object::{BuiltinFn, Object};
use super::table::Table;
use super::value::{display_value, type_name, value_equal, ObjId, Value};

/// `repeat` refuses to build strings past this many copies.
const MAX_REPEAT: i64 = 10_000;

/// Timeout shared by the blocking HTTP builtins.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Register every builtin as a Native object in the global environment.
/// User code may shadow any of these names.
pub fn register(heap: &mut Heap, globals: &EnvRef) {
    let mut define = |name: &'static str, func: BuiltinFn| {
        let native = heap.alloc(Object::Native { name, func });
        globals.borrow_mut().define(name.to_string(), native);
    };

    // Core
    define("print", builtin_print);
    define("println", builtin_println);
    define("input", builtin_input);
    define("type", builtin_type);
    define("to_string", builtin_to_string);
    define("to_number", builtin_to_number);
    define("to_int", builtin_to_int);
    define("length", builtin_length);

    // Math
    define("floor", builtin_floor);
    define("ceil", builtin_ceil);
    define("round", builtin_round);
    define("abs", builtin_abs);
    define("max", builtin_max);
    define("min", builtin_min);
    define("sqrt", builtin_sqrt);
    define("random", builtin_random);
    define("random_range", builtin_random_range);

    // Strings
    define("split", builtin_split);
    define("join", builtin_join);
    define("substring", builtin_substring);
    define("replace", builtin_replace);
    define("trim", builtin_trim);
    define("upper", builtin_upper);
    define("lower", builtin_lower);
    define("index_of", builtin_index_of);
    define("contains", builtin_contains);
    define("starts_with", builtin_starts_with);
    define("ends_with", builtin_ends_with);
    define("repeat", builtin_repeat);
    define("char_code_at", builtin_char_code_at);

    // Lists
    define("push", builtin_push);
    define("pop", builtin_pop);
    define("shift", builtin_shift);
    define("slice", builtin_slice);
    define("sort", builtin_sort);
    define("reverse", builtin_reverse);
    define("list_index_of", builtin_list_index_of);
    define("remove", builtin_remove);

    // Dicts
    define("keys", builtin_keys);
    define("values", builtin_values);
    define("has_key", builtin_has_key);
    define("delete", builtin_delete);
    define("merge", builtin_merge);

    // Time and console
    define("clock", builtin_clock);
    define("sleep", builtin_sleep);
    define("clear_screen", builtin_clear_screen);

    // HTTP
    define("http_get", builtin_http_get);
    define("http_post", builtin_http_post);
    define("http_request", builtin_http_request);
}

// ============ argument access ============

/// Missing trailing arguments read as Null.
fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).copied().unwrap_or(Value::Null)
}

/// An optional argument: missing or Null selects the default.
fn opt_arg(args: &[Value], i: usize) -> Option<Value> {
    match args.get(i).copied() {
        None | Some(Value::Null) => None,
        Some(v) => Some(v),
    }
}

fn str_arg(heap: &Heap, args: &[Value], i: usize) -> InterpResult<String> {
    let v = arg(args, i);
    if let Value::Obj(id) = v {
        if let Some(text) = heap.get(id).as_str() {
            return Ok(text.to_string());
        }
    }
    Err(RuntimeError::type_error("string", type_name(heap, v)))
}

fn int_arg(heap: &Heap, args: &[Value], i: usize) -> InterpResult<i64> {
    match arg(args, i) {
        Value::Int(n) => Ok(n),
        v => Err(RuntimeError::type_error("int", type_name(heap, v))),
    }
}

fn list_arg(heap: &Heap, args: &[Value], i: usize) -> InterpResult<ObjId> {
    let v = arg(args, i);
    if let Value::Obj(id) = v {
        if matches!(heap.get(id), Object::List(_)) {
            return Ok(id);
        }
    }
    Err(RuntimeError::type_error("list", type_name(heap, v)))
}

fn dict_arg(heap: &Heap, args: &[Value], i: usize) -> InterpResult<ObjId> {
    let v = arg(args, i);
    if let Value::Obj(id) = v {
        if matches!(heap.get(id), Object::Dict(_)) {
            return Ok(id);
        }
    }
    Err(RuntimeError::type_error("dict", type_name(heap, v)))
}

fn number(heap: &Heap, value: Value) -> InterpResult<f64> {
    value
        .as_float()
        .ok_or_else(|| RuntimeError::type_error("number", type_name(heap, value)))
}

// ============ core ============

fn builtin_print(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let mut line = String::new();
    for (i, value) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&display_value(heap, *value));
    }
    heap.write_out(&line);
    Ok(Value::Null)
}

fn builtin_println(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    builtin_print(heap, args)?;
    heap.write_out("\n");
    Ok(Value::Null)
}

/// input(prompt?) -> String, or Null once stdin is closed.
fn builtin_input(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    if let Some(prompt) = opt_arg(args, 0) {
        let text = display_value(heap, prompt);
        heap.write_out(&text);
    }
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => Ok(Value::Null),
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(heap.alloc_str(line))
        }
    }
}

fn builtin_type(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let name = type_name(heap, arg(args, 0)).to_string();
    Ok(heap.alloc_str(name))
}

fn builtin_to_string(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let v = arg(args, 0);
    if let Value::Obj(id) = v {
        // Already a string: hand the same object back instead of copying.
        if heap.get(id).as_str().is_some() {
            return Ok(v);
        }
    }
    let text = display_value(heap, v);
    Ok(heap.alloc_str(text))
}

/// to_number(s) -> Int for integer text, Float for float text, Null if the
/// whole (trimmed) string does not parse. Numbers pass through unchanged.
fn builtin_to_number(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let v = arg(args, 0);
    match v {
        Value::Int(_) | Value::Float(_) => Ok(v),
        Value::Obj(id) => {
            if let Some(text) = heap.get(id).as_str() {
                let text = text.trim();
                if let Ok(n) = text.parse::<i64>() {
                    return Ok(Value::Int(n));
                }
                if let Ok(f) = text.parse::<f64>() {
                    return Ok(Value::Float(f));
                }
                return Ok(Value::Null);
            }
            Err(RuntimeError::type_error("string or number", type_name(heap, v)))
        }
        _ => Err(RuntimeError::type_error("string or number", type_name(heap, v))),
    }
}

/// to_int(x): Float truncates toward zero, String parses ("3.7" -> 3),
/// Null if unparseable.
fn builtin_to_int(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let v = arg(args, 0);
    match v {
        Value::Int(_) => Ok(v),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        Value::Obj(id) => {
            if let Some(text) = heap.get(id).as_str() {
                let text = text.trim();
                if let Ok(n) = text.parse::<i64>() {
                    return Ok(Value::Int(n));
                }
                if let Ok(f) = text.parse::<f64>() {
                    return Ok(Value::Int(f as i64));
                }
                return Ok(Value::Null);
            }
            Err(RuntimeError::type_error("string or number", type_name(heap, v)))
        }
        _ => Err(RuntimeError::type_error("string or number", type_name(heap, v))),
    }
}

/// length(x): characters of a String, elements of a List, entries of a Dict.
fn builtin_length(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let v = arg(args, 0);
    if let Value::Obj(id) = v {
        match heap.get(id) {
            Object::Str { text, .. } => return Ok(Value::Int(text.chars().count() as i64)),
            Object::List(items) => return Ok(Value::Int(items.len() as i64)),
            Object::Dict(table) => return Ok(Value::Int(table.len() as i64)),
            _ => {}
        }
    }
    Err(RuntimeError::type_error("string, list or dict", type_name(heap, v)))
}

// ============ math ============

fn builtin_floor(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    match arg(args, 0) {
        v @ Value::Int(_) => Ok(v),
        Value::Float(f) => Ok(Value::Float(f.floor())),
        v => Err(RuntimeError::type_error("number", type_name(heap, v))),
    }
}

fn builtin_ceil(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    match arg(args, 0) {
        v @ Value::Int(_) => Ok(v),
        Value::Float(f) => Ok(Value::Float(f.ceil())),
        v => Err(RuntimeError::type_error("number", type_name(heap, v))),
    }
}

fn builtin_round(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    match arg(args, 0) {
        v @ Value::Int(_) => Ok(v),
        Value::Float(f) => Ok(Value::Float(f.round())),
        v => Err(RuntimeError::type_error("number", type_name(heap, v))),
    }
}

fn builtin_abs(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    match arg(args, 0) {
        // i64::MIN has no Int magnitude; promote like unary minus does.
        Value::Int(n) => Ok(match n.checked_abs() {
            Some(a) => Value::Int(a),
            None => Value::Float((n as f64).abs()),
        }),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        v => Err(RuntimeError::type_error("number", type_name(heap, v))),
    }
}

/// max(a, b) returns whichever operand compares larger, unconverted.
fn builtin_max(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let a = arg(args, 0);
    let b = arg(args, 1);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(if x >= y { a } else { b });
    }
    let x = number(heap, a)?;
    let y = number(heap, b)?;
    Ok(if x >= y { a } else { b })
}

fn builtin_min(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let a = arg(args, 0);
    let b = arg(args, 1);
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(if x <= y { a } else { b });
    }
    let x = number(heap, a)?;
    let y = number(heap, b)?;
    Ok(if x <= y { a } else { b })
}

fn builtin_sqrt(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let x = number(heap, arg(args, 0))?;
    Ok(Value::Float(x.sqrt()))
}

fn builtin_random(_heap: &mut Heap, _args: &[Value]) -> InterpResult<Value> {
    let mut rng = rand::thread_rng();
    Ok(Value::Float(rng.r#gen::<f64>()))
}

/// random_range(a, b) -> inclusive Int; operands may arrive in either order.
fn builtin_random_range(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let a = int_or_trunc(heap, arg(args, 0))?;
    let b = int_or_trunc(heap, arg(args, 1))?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut rng = rand::thread_rng();
    Ok(Value::Int(rng.gen_range(lo..=hi)))
}

fn int_or_trunc(heap: &Heap, v: Value) -> InterpResult<i64> {
    match v {
        Value::Int(n) => Ok(n),
        Value::Float(f) => Ok(f as i64),
        _ => Err(RuntimeError::type_error("number", type_name(heap, v))),
    }
}

// ============ strings ============

/// split(s, sep): an empty separator yields one element per character.
fn builtin_split(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let sep = str_arg(heap, args, 1)?;
    let parts: Vec<String> = if sep.is_empty() {
        text.chars().map(|c| c.to_string()).collect()
    } else {
        text.split(&sep).map(|s| s.to_string()).collect()
    };
    let items: Vec<Value> = parts.into_iter().map(|p| heap.alloc_str(p)).collect();
    Ok(heap.alloc_list(items))
}

fn builtin_join(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let sep = match opt_arg(args, 1) {
        Some(_) => str_arg(heap, args, 1)?,
        None => String::new(),
    };
    let items = heap.get(id).as_list().cloned().unwrap_or_default();
    let parts: Vec<String> = items.iter().map(|v| display_value(heap, *v)).collect();
    Ok(heap.alloc_str(parts.join(&sep)))
}

/// substring(s, start, end?) with character indices, clamped to the string.
fn builtin_substring(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let chars: Vec<char> = text.chars().collect();
    let start = int_arg(heap, args, 1)?.max(0) as usize;
    let end = match opt_arg(args, 2) {
        Some(_) => int_arg(heap, args, 2)?,
        None => chars.len() as i64,
    };
    let end = (end.max(0) as usize).min(chars.len());
    let piece: String = if start >= end {
        String::new()
    } else {
        chars[start..end].iter().collect()
    };
    Ok(heap.alloc_str(piece))
}

fn builtin_replace(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let from = str_arg(heap, args, 1)?;
    let to = str_arg(heap, args, 2)?;
    if from.is_empty() {
        return Ok(arg(args, 0));
    }
    Ok(heap.alloc_str(text.replace(&from, &to)))
}

fn builtin_trim(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    Ok(heap.alloc_str(text.trim().to_string()))
}

fn builtin_upper(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    Ok(heap.alloc_str(text.to_uppercase()))
}

fn builtin_lower(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    Ok(heap.alloc_str(text.to_lowercase()))
}

/// index_of(s, needle) -> character index of the first match, or -1.
fn builtin_index_of(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let needle = str_arg(heap, args, 1)?;
    match text.find(&needle) {
        Some(byte_pos) => Ok(Value::Int(text[..byte_pos].chars().count() as i64)),
        None => Ok(Value::Int(-1)),
    }
}

fn builtin_contains(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let needle = str_arg(heap, args, 1)?;
    Ok(Value::Bool(text.contains(&needle)))
}

fn builtin_starts_with(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let prefix = str_arg(heap, args, 1)?;
    Ok(Value::Bool(text.starts_with(&prefix)))
}

fn builtin_ends_with(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let suffix = str_arg(heap, args, 1)?;
    Ok(Value::Bool(text.ends_with(&suffix)))
}

fn builtin_repeat(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let count = int_arg(heap, args, 1)?.clamp(0, MAX_REPEAT);
    Ok(heap.alloc_str(text.repeat(count as usize)))
}

/// char_code_at(s, i) -> Unicode scalar value at character index i, or Null
/// when the index is out of range.
fn builtin_char_code_at(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let text = str_arg(heap, args, 0)?;
    let index = int_arg(heap, args, 1)?;
    if index < 0 {
        return Ok(Value::Null);
    }
    match text.chars().nth(index as usize) {
        Some(c) => Ok(Value::Int(c as i64)),
        None => Ok(Value::Null),
    }
}

// ============ lists ============

fn builtin_push(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let value = arg(args, 1);
    if let Object::List(items) = heap.get_mut(id) {
        items.push(value);
    }
    Ok(Value::Obj(id))
}

fn builtin_pop(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    if let Object::List(items) = heap.get_mut(id) {
        return Ok(items.pop().unwrap_or(Value::Null));
    }
    Ok(Value::Null)
}

fn builtin_shift(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    if let Object::List(items) = heap.get_mut(id) {
        if !items.is_empty() {
            return Ok(items.remove(0));
        }
    }
    Ok(Value::Null)
}

/// slice(list, start, end?) -> a new list; both bounds clamped.
fn builtin_slice(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let items = heap.get(id).as_list().cloned().unwrap_or_default();
    let start = int_arg(heap, args, 1)?.max(0) as usize;
    let end = match opt_arg(args, 2) {
        Some(_) => int_arg(heap, args, 2)?,
        None => items.len() as i64,
    };
    let end = (end.max(0) as usize).min(items.len());
    if start >= end {
        return Ok(heap.alloc_list(Vec::new()));
    }
    let piece = items[start..end].to_vec();
    Ok(heap.alloc_list(piece))
}

/// sort(list): numeric ascending, in place; returns the same list. Every
/// element must be Int or Float.
fn builtin_sort(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let mut items = heap.get(id).as_list().cloned().unwrap_or_default();
    for item in &items {
        if !matches!(item, Value::Int(_) | Value::Float(_)) {
            return Err(RuntimeError::type_error("number", type_name(heap, *item)));
        }
    }
    items.sort_by(|a, b| match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        _ => {
            let x = a.as_float().unwrap_or(0.0);
            let y = b.as_float().unwrap_or(0.0);
            x.total_cmp(&y)
        }
    });
    if let Object::List(slot) = heap.get_mut(id) {
        *slot = items;
    }
    Ok(Value::Obj(id))
}

fn builtin_reverse(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    if let Object::List(items) = heap.get_mut(id) {
        items.reverse();
    }
    Ok(Value::Obj(id))
}

/// list_index_of(list, v) compares with operator equality, so strings match
/// by content and other objects by identity.
fn builtin_list_index_of(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let needle = arg(args, 1);
    let items = heap.get(id).as_list().cloned().unwrap_or_default();
    for (i, item) in items.iter().enumerate() {
        if value_equal(heap, *item, needle) {
            return Ok(Value::Int(i as i64));
        }
    }
    Ok(Value::Int(-1))
}

fn builtin_remove(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = list_arg(heap, args, 0)?;
    let index = int_arg(heap, args, 1)?;
    if let Object::List(items) = heap.get_mut(id) {
        if index >= 0 && (index as usize) < items.len() {
            return Ok(items.remove(index as usize));
        }
    }
    Ok(Value::Null)
}

// ============ dicts ============

fn builtin_keys(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = dict_arg(heap, args, 0)?;
    let keys: Vec<String> = match heap.get(id).as_dict() {
        Some(table) => table.iter().map(|(k, _)| k.to_string()).collect(),
        None => Vec::new(),
    };
    let items: Vec<Value> = keys.into_iter().map(|k| heap.alloc_str(k)).collect();
    Ok(heap.alloc_list(items))
}

fn builtin_values(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = dict_arg(heap, args, 0)?;
    let values: Vec<Value> = match heap.get(id).as_dict() {
        Some(table) => table.iter().map(|(_, v)| v).collect(),
        None => Vec::new(),
    };
    Ok(heap.alloc_list(values))
}

fn builtin_has_key(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = dict_arg(heap, args, 0)?;
    let key = str_arg(heap, args, 1)?;
    let found = heap.get(id).as_dict().map(|t| t.contains(&key)).unwrap_or(false);
    Ok(Value::Bool(found))
}

fn builtin_delete(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let id = dict_arg(heap, args, 0)?;
    let key = str_arg(heap, args, 1)?;
    if let Object::Dict(table) = heap.get_mut(id) {
        return Ok(Value::Bool(table.delete(&key)));
    }
    Ok(Value::Bool(false))
}

/// merge(a, b) -> a new dict with every entry of both; b wins on conflicts.
fn builtin_merge(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let a = dict_arg(heap, args, 0)?;
    let b = dict_arg(heap, args, 1)?;
    let mut merged = Table::new();
    for id in [a, b] {
        let entries: Vec<(String, Value)> = match heap.get(id).as_dict() {
            Some(table) => table.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            None => Vec::new(),
        };
        for (key, value) in entries {
            merged.set(&key, value);
        }
    }
    Ok(heap.alloc_dict(merged))
}

// ============ time and console ============

fn builtin_clock(heap: &mut Heap, _args: &[Value]) -> InterpResult<Value> {
    Ok(Value::Float(heap.elapsed_secs()))
}

fn builtin_sleep(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let ms = int_arg(heap, args, 0)?.max(0);
    thread::sleep(Duration::from_millis(ms as u64));
    Ok(Value::Null)
}

fn builtin_clear_screen(heap: &mut Heap, _args: &[Value]) -> InterpResult<Value> {
    heap.write_out("\x1b[2J\x1b[H");
    Ok(Value::Null)
}

// ============ http ============

fn http_client() -> Option<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .ok()
}

/// http_get(url) -> response body String, or Null on any transport failure.
fn builtin_http_get(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let url = str_arg(heap, args, 0)?;
    let body = http_client()
        .and_then(|client| client.get(&url).send().ok())
        .and_then(|resp| resp.text().ok());
    match body {
        Some(text) => Ok(heap.alloc_str(text)),
        None => Ok(Value::Null),
    }
}

/// http_post(url, body) sends body as application/json.
fn builtin_http_post(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let url = str_arg(heap, args, 0)?;
    let body = str_arg(heap, args, 1)?;
    let text = http_client()
        .and_then(|client| {
            client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .ok()
        })
        .and_then(|resp| resp.text().ok());
    match text {
        Some(text) => Ok(heap.alloc_str(text)),
        None => Ok(Value::Null),
    }
}

/// http_request(method, url, body?, headers?) -> Dict {status, body,
/// headers} or Null on transport failure. Non-string header values are
/// skipped.
fn builtin_http_request(heap: &mut Heap, args: &[Value]) -> InterpResult<Value> {
    let method = str_arg(heap, args, 0)?;
    let url = str_arg(heap, args, 1)?;
    let body = match opt_arg(args, 2) {
        Some(_) => Some(str_arg(heap, args, 2)?),
        None => None,
    };
    let mut headers: Vec<(String, String)> = Vec::new();
    if opt_arg(args, 3).is_some() {
        let id = dict_arg(heap, args, 3)?;
        if let Some(table) = heap.get(id).as_dict() {
            for (key, value) in table.iter() {
                if let Value::Obj(vid) = value {
                    if let Some(text) = heap.get(vid).as_str() {
                        headers.push((key.to_string(), text.to_string()));
                    }
                }
            }
        }
    }

    let method = match reqwest::Method::from_bytes(method.to_uppercase().as_bytes()) {
        Ok(m) => m,
        Err(_) => return Ok(Value::Null),
    };
    let response = http_client().and_then(|client| {
        let mut request = client.request(method, &url);
        for (name, value) in &headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().ok()
    });
    let response = match response {
        Some(resp) => resp,
        None => return Ok(Value::Null),
    };

    let status = response.status().as_u16() as i64;
    let mut header_pairs: Vec<(String, String)> = Vec::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            header_pairs.push((name.as_str().to_string(), text.to_string()));
        }
    }
    let body_text = response.text().unwrap_or_default();

    let body_value = heap.alloc_str(body_text);
    let mut header_table = Table::new();
    for (name, value) in header_pairs {
        let value = heap.alloc_str(value);
        header_table.set(&name, value);
    }
    let headers_value = heap.alloc_dict(header_table);

    let mut result = Table::new();
    result.set("status", Value::Int(status));
    result.set("body", body_value);
    result.set("headers", headers_value);
    Ok(heap.alloc_dict(result))
}

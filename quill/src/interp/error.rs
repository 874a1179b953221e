//! Runtime errors for the interpreter

use std::fmt;

use crate::ast::Span;

use super::Value;

/// Runtime error during interpretation.
///
/// The span is filled in by the evaluator at the innermost node that had
/// one, so re-wrapping an error on the way out never overwrites a more
/// precise position.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

/// Kinds of runtime errors
#[derive(Debug, Clone)]
pub enum ErrorKind {
    /// Parse failure surfacing at runtime (an imported file). Not catchable.
    Syntax,
    /// Generic runtime fault
    Runtime,
    /// Operand or argument of an unusable type
    TypeError,
    /// Unknown variable, class or member
    Undefined,
    /// Division or remainder by zero
    ZeroDivision,
    /// List index outside [0, length)
    IndexOutOfBounds,
    /// Reserved: no operation raises this today
    ArgumentCount,
    /// Control flow: break out of the nearest loop
    Break,
    /// Control flow: continue to the next loop iteration
    Continue,
    /// Control flow: early return from function (with value)
    Return(Box<Value>),
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        // Compare discriminants only; Return carries a payload but two
        // returns are still the same kind of exit
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl ErrorKind {
    /// Whether a `catch` clause may capture this kind. Control-flow
    /// carriers pass through try blocks untouched, and syntax errors
    /// always abort the run.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Runtime
                | ErrorKind::TypeError
                | ErrorKind::Undefined
                | ErrorKind::ZeroDivision
                | ErrorKind::IndexOutOfBounds
                | ErrorKind::ArgumentCount
        )
    }

    /// Short label for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax error",
            ErrorKind::Runtime => "Runtime error",
            ErrorKind::TypeError => "Type error",
            ErrorKind::Undefined => "Undefined",
            ErrorKind::ZeroDivision => "Zero division",
            ErrorKind::IndexOutOfBounds => "Index out of bounds",
            ErrorKind::ArgumentCount => "Argument count",
            ErrorKind::Break => "Break",
            ErrorKind::Continue => "Continue",
            ErrorKind::Return(_) => "Return",
        }
    }
}

impl RuntimeError {
    fn new(kind: ErrorKind, message: String) -> Self {
        RuntimeError { kind, message, span: None }
    }

    /// Attach a span unless a more precise one is already present.
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        RuntimeError::new(ErrorKind::Runtime, message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        RuntimeError::new(ErrorKind::Syntax, message.into())
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        RuntimeError::new(
            ErrorKind::TypeError,
            format!("expected {expected}, got {got}"),
        )
    }

    pub fn undefined_variable(name: &str) -> Self {
        RuntimeError::new(
            ErrorKind::Undefined,
            format!("undefined variable: {name}"),
        )
    }

    pub fn undefined_member(type_name: &str, member: &str) -> Self {
        RuntimeError::new(
            ErrorKind::Undefined,
            format!("{type_name} has no member: {member}"),
        )
    }

    pub fn division_by_zero() -> Self {
        RuntimeError::new(ErrorKind::ZeroDivision, "division by zero".to_string())
    }

    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        RuntimeError::new(
            ErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds for length {}", index, len),
        )
    }

    pub fn recursion_limit(depth: usize) -> Self {
        RuntimeError::new(
            ErrorKind::Runtime,
            format!("recursion limit exceeded: depth {depth}"),
        )
    }

    pub fn return_value(value: Value) -> Self {
        RuntimeError::new(ErrorKind::Return(Box::new(value)), String::new())
    }

    pub fn break_loop() -> Self {
        RuntimeError::new(ErrorKind::Break, "break outside of loop".to_string())
    }

    pub fn continue_loop() -> Self {
        RuntimeError::new(
            ErrorKind::Continue,
            "continue outside of loop".to_string(),
        )
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for interpreter operations
pub type InterpResult<T> = Result<T, RuntimeError>;

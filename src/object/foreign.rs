//! Foreign (host) callables and the host-type wrapping boundary.
//!
//! Any host function with the [`ForeignFn`] signature can be exposed to
//! executed code: positional-only arguments, an arity check before
//! invocation when declared, and host failures surfaced as structured
//! runtime errors rather than native propagation.

use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Behavior, Value};

/// The host-callable signature: positional arguments in, one value out.
pub type ForeignFn = fn(Vec<Value>) -> Result<Value, RuntimeError>;

#[derive(Debug)]
pub struct ForeignFunction {
    pub name: &'static str,
    /// Declared positional arity; `None` disables the pre-call check.
    pub arity: Option<u8>,
    pub func: ForeignFn,
}

impl ForeignFunction {
    pub fn wrap(name: &'static str, arity: Option<u8>, func: ForeignFn) -> Value {
        Value::Foreign(Rc::new(ForeignFunction { name, arity, func }))
    }
}

fn foreign_stringify(v: &Value) -> String {
    match v {
        Value::Foreign(func) => format!("<builtin function '{}'>", func.name),
        _ => String::new(),
    }
}

fn foreign_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Foreign(x), Value::Foreign(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

pub static FOREIGN_BEHAVIOR: Behavior = Behavior {
    name: "builtin",
    stringify: foreign_stringify,
    represent: foreign_stringify,
    equals: Some(foreign_equals),
    ..Behavior::BASE
};

// ===== Host-type wrapping =====

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::string(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::string(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Value {
        Value::Null
    }
}

// ===== Argument unwrapping helpers for foreign bodies =====

pub fn expect_int(v: &Value, what: &str) -> Result<i64, RuntimeError> {
    match v {
        Value::Int(x) => Ok(*x),
        other => Err(RuntimeError::type_error(format!(
            "{} must be an integer, not {}",
            what,
            super::behavior(other).name
        ))),
    }
}

pub fn expect_str<'a>(v: &'a Value, what: &str) -> Result<&'a str, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(format!(
            "{} must be a string, not {}",
            what,
            super::behavior(other).name
        ))),
    }
}

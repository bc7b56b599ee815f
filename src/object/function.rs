//! Interpreted function values.

use std::rc::Rc;

use crate::vm::code::CodeObject;

use super::{Behavior, ForeignFunction, ScopeRef, Value};

/// A first-class interpreted function: compiled code plus everything the
/// call protocol needs. `captured` aliases the defining frame's variable
/// mapping (and the chain above it), innermost first — populated at
/// function-value creation time, never at call time.
#[derive(Debug)]
pub struct FunctionObj {
    pub name: String,
    pub code: Rc<CodeObject>,
    pub captured: Vec<ScopeRef>,
    pub globals: ScopeRef,
    /// Bound receiver for methods, available as `this` in the body.
    pub this: Option<Value>,
}

impl FunctionObj {
    pub fn new(
        name: String,
        code: Rc<CodeObject>,
        captured: Vec<ScopeRef>,
        globals: ScopeRef,
    ) -> Self {
        Self {
            name,
            code,
            captured,
            globals,
            this: None,
        }
    }

    /// A copy of this function with a bound receiver.
    pub fn bind(&self, receiver: Value) -> FunctionObj {
        FunctionObj {
            name: self.name.clone(),
            code: self.code.clone(),
            captured: self.captured.clone(),
            globals: self.globals.clone(),
            this: Some(receiver),
        }
    }
}

/// A callable value, classified for the call protocol. Interpreted
/// functions go through the frame-push protocol; foreign functions are
/// invoked directly.
pub enum Callee {
    Interpreted(Rc<FunctionObj>),
    Foreign(Rc<ForeignFunction>),
    NotCallable,
}

pub fn classify(v: &Value) -> Callee {
    match v {
        Value::Function(func) => Callee::Interpreted(func.clone()),
        Value::Foreign(func) => Callee::Foreign(func.clone()),
        _ => Callee::NotCallable,
    }
}

fn function_stringify(v: &Value) -> String {
    match v {
        Value::Function(func) => format!("<function '{}'>", func.name),
        _ => String::new(),
    }
}

fn function_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

pub static FUNCTION_BEHAVIOR: Behavior = Behavior {
    name: "function",
    stringify: function_stringify,
    represent: function_stringify,
    equals: Some(function_equals),
    ..Behavior::BASE
};

//! Struct types and struct instances.
//!
//! A struct declaration produces a [`StructType`] value; the builtin
//! `new(Type)` produces a [`StructInstance`] with every declared field bound
//! to null. Methods are attached to the type (`func (Point) norm() ...`)
//! and bind their receiver on attribute access.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Behavior, FunctionObj, Value};

#[derive(Debug)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: RefCell<HashMap<String, Value>>,
}

impl StructType {
    pub fn new(name: String, fields: Vec<String>) -> Self {
        Self {
            name,
            fields,
            methods: RefCell::new(HashMap::new()),
        }
    }

    /// Create an instance with every declared field set to null.
    pub fn instantiate(self: &Rc<Self>) -> Value {
        let mut fields = HashMap::new();
        for field in &self.fields {
            fields.insert(field.clone(), Value::Null);
        }
        Value::Instance(Rc::new(StructInstance {
            ty: self.clone(),
            fields: RefCell::new(fields),
        }))
    }
}

#[derive(Debug)]
pub struct StructInstance {
    pub ty: Rc<StructType>,
    pub fields: RefCell<HashMap<String, Value>>,
}

// ===== struct type behavior =====

fn type_stringify(v: &Value) -> String {
    match v {
        Value::StructType(ty) => format!("<struct '{}'>", ty.name),
        _ => String::new(),
    }
}

fn type_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::StructType(x), Value::StructType(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn type_get_attr(v: &Value, name: &str) -> Result<Value, RuntimeError> {
    let Value::StructType(ty) = v else {
        return Err(RuntimeError::attribute_error("struct", name));
    };
    ty.methods
        .borrow()
        .get(name)
        .cloned()
        .ok_or_else(|| RuntimeError::attribute_error(&ty.name, name))
}

pub static STRUCT_TYPE_BEHAVIOR: Behavior = Behavior {
    name: "struct",
    stringify: type_stringify,
    represent: type_stringify,
    equals: Some(type_equals),
    get_attr: Some(type_get_attr),
    ..Behavior::BASE
};

// ===== struct instance behavior =====

fn instance_stringify(v: &Value) -> String {
    let Value::Instance(instance) = v else {
        return String::new();
    };
    let fields = instance.fields.borrow();
    let parts: Vec<String> = instance
        .ty
        .fields
        .iter()
        .filter_map(|name| {
            fields
                .get(name)
                .map(|value| format!("{}: {}", name, super::represent(value)))
        })
        .collect();
    format!("{}{{{}}}", instance.ty.name, parts.join(", "))
}

fn instance_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Instance(x), Value::Instance(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// Fields first, then methods of the type (bound to this instance).
fn instance_get_attr(v: &Value, name: &str) -> Result<Value, RuntimeError> {
    let Value::Instance(instance) = v else {
        return Err(RuntimeError::attribute_error("instance", name));
    };
    if let Some(value) = instance.fields.borrow().get(name) {
        return Ok(value.clone());
    }
    if let Some(method) = instance.ty.methods.borrow().get(name) {
        if let Value::Function(func) = method {
            return Ok(Value::Function(Rc::new(func.bind(v.clone()))));
        }
        return Ok(method.clone());
    }
    Err(RuntimeError::attribute_error(&instance.ty.name, name))
}

/// Only declared fields are assignable.
fn instance_set_attr(v: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    let Value::Instance(instance) = v else {
        return Err(RuntimeError::attribute_error("instance", name));
    };
    let mut fields = instance.fields.borrow_mut();
    if !fields.contains_key(name) {
        return Err(RuntimeError::attribute_error(&instance.ty.name, name));
    }
    fields.insert(name.to_string(), value);
    Ok(())
}

pub static INSTANCE_BEHAVIOR: Behavior = Behavior {
    name: "instance",
    stringify: instance_stringify,
    represent: instance_stringify,
    equals: Some(instance_equals),
    get_attr: Some(instance_get_attr),
    set_attr: Some(instance_set_attr),
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::{get_attr, set_attr};

    fn point() -> Value {
        let ty = Rc::new(StructType::new(
            "Point".to_string(),
            vec!["x".to_string(), "y".to_string()],
        ));
        ty.instantiate()
    }

    #[test]
    fn fields_start_null() {
        let p = point();
        assert_eq!(get_attr(&p, "x").unwrap(), Value::Null);
    }

    #[test]
    fn field_assignment() {
        let p = point();
        set_attr(&p, "x", Value::Int(3)).unwrap();
        assert_eq!(get_attr(&p, "x").unwrap(), Value::Int(3));
    }

    #[test]
    fn unknown_field_raises() {
        let p = point();
        let err = set_attr(&p, "z", Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeMissing);
    }
}

//! Sequence behavior: mutable, shared arrays.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Behavior, Value};

fn items_of(v: &Value) -> Option<&Rc<RefCell<Vec<Value>>>> {
    match v {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn array_stringify(v: &Value) -> String {
    let Some(items) = items_of(v) else {
        return String::new();
    };
    let parts: Vec<String> = items.borrow().iter().map(super::represent).collect();
    format!("[{}]", parts.join(", "))
}

fn array_truthy(v: &Value) -> bool {
    items_of(v).map(|items| !items.borrow().is_empty()).unwrap_or(false)
}

fn array_equals(a: &Value, b: &Value) -> bool {
    match (items_of(a), items_of(b)) {
        (Some(x), Some(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| super::equals(l, r))
        }
        _ => false,
    }
}

fn array_add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (items_of(a), items_of(b)) {
        (Some(x), Some(y)) => {
            let mut joined = x.borrow().clone();
            joined.extend(y.borrow().iter().cloned());
            Ok(Value::array(joined))
        }
        _ => Err(RuntimeError::type_error(format!(
            "cannot concatenate array and {}",
            super::behavior(b).name
        ))),
    }
}

fn array_length(v: &Value) -> Result<i64, RuntimeError> {
    Ok(items_of(v).map(|items| items.borrow().len()).unwrap_or(0) as i64)
}

fn resolve_index(i: i64, len: usize) -> Result<usize, RuntimeError> {
    let actual = if i < 0 { i + len as i64 } else { i };
    if actual < 0 || actual as usize >= len {
        return Err(RuntimeError::index_error(i, len));
    }
    Ok(actual as usize)
}

fn array_get_item(v: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::type_error(format!(
            "array index must be an integer, not {}",
            super::behavior(index).name
        )));
    };
    let items = items_of(v).expect("array behavior on non-array").borrow();
    let at = resolve_index(*i, items.len())?;
    Ok(items[at].clone())
}

fn array_set_item(v: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::type_error(format!(
            "array index must be an integer, not {}",
            super::behavior(index).name
        )));
    };
    let mut items = items_of(v).expect("array behavior on non-array").borrow_mut();
    let at = resolve_index(*i, items.len())?;
    items[at] = value;
    Ok(())
}

pub static ARRAY_BEHAVIOR: Behavior = Behavior {
    name: "array",
    stringify: array_stringify,
    represent: array_stringify,
    truthy: array_truthy,
    equals: Some(array_equals),
    add: Some(array_add),
    length: Some(array_length),
    get_item: Some(array_get_item),
    set_item: Some(array_set_item),
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{equals, get_item, set_item};

    #[test]
    fn deep_equality() {
        let a = Value::array(vec![Value::Int(1), Value::string("x")]);
        let b = Value::array(vec![Value::Int(1), Value::string("x")]);
        assert!(equals(&a, &b));
    }

    #[test]
    fn shared_mutation_is_visible_through_aliases() {
        let a = Value::array(vec![Value::Int(1)]);
        let alias = a.clone();
        set_item(&a, &Value::Int(0), Value::Int(9)).unwrap();
        assert_eq!(get_item(&alias, &Value::Int(0)).unwrap(), Value::Int(9));
    }

    #[test]
    fn negative_indexing() {
        let a = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(get_item(&a, &Value::Int(-1)).unwrap(), Value::Int(2));
    }
}

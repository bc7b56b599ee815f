//! Mapping behavior: mutable, shared maps with hashable keys.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::RuntimeError;

use super::{Behavior, MapKey, Value};

fn entries_of(v: &Value) -> Option<&Rc<RefCell<BTreeMap<MapKey, Value>>>> {
    match v {
        Value::Map(entries) => Some(entries),
        _ => None,
    }
}

fn map_stringify(v: &Value) -> String {
    let Some(entries) = entries_of(v) else {
        return String::new();
    };
    let parts: Vec<String> = entries
        .borrow()
        .iter()
        .map(|(k, v)| format!("{}: {}", super::represent(&k.to_value()), super::represent(v)))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn map_truthy(v: &Value) -> bool {
    entries_of(v)
        .map(|entries| !entries.borrow().is_empty())
        .unwrap_or(false)
}

fn map_equals(a: &Value, b: &Value) -> bool {
    match (entries_of(a), entries_of(b)) {
        (Some(x), Some(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len()
                && x.iter().all(|(k, v)| {
                    y.get(k).map(|other| super::equals(v, other)).unwrap_or(false)
                })
        }
        _ => false,
    }
}

fn map_length(v: &Value) -> Result<i64, RuntimeError> {
    Ok(entries_of(v).map(|entries| entries.borrow().len()).unwrap_or(0) as i64)
}

fn map_get_item(v: &Value, key: &Value) -> Result<Value, RuntimeError> {
    let key = super::hash_key(key)?;
    let entries = entries_of(v).expect("map behavior on non-map").borrow();
    entries.get(&key).cloned().ok_or_else(|| {
        RuntimeError::new(
            crate::error::ErrorKind::IndexOutOfRange,
            format!("key not found: {}", super::represent(&key.to_value())),
        )
    })
}

fn map_set_item(v: &Value, key: &Value, value: Value) -> Result<(), RuntimeError> {
    let key = super::hash_key(key)?;
    entries_of(v)
        .expect("map behavior on non-map")
        .borrow_mut()
        .insert(key, value);
    Ok(())
}

pub static MAP_BEHAVIOR: Behavior = Behavior {
    name: "map",
    stringify: map_stringify,
    represent: map_stringify,
    truthy: map_truthy,
    equals: Some(map_equals),
    length: Some(map_length),
    get_item: Some(map_get_item),
    set_item: Some(map_set_item),
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::{get_item, set_item};

    fn empty_map() -> Value {
        Value::Map(Rc::new(RefCell::new(BTreeMap::new())))
    }

    #[test]
    fn insert_and_lookup() {
        let m = empty_map();
        set_item(&m, &Value::string("a"), Value::Int(1)).unwrap();
        assert_eq!(get_item(&m, &Value::string("a")).unwrap(), Value::Int(1));
    }

    #[test]
    fn missing_key() {
        let err = get_item(&empty_map(), &Value::string("nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn unhashable_key_raises() {
        let m = empty_map();
        let err = set_item(&m, &Value::array(vec![]), Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unhashable);
    }
}

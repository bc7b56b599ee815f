//! The builtin namespace: foreign functions available everywhere, last in
//! the name-resolution chain.

use lazy_static::lazy_static;

use crate::error::RuntimeError;
use crate::object::foreign::{expect_str, ForeignFn};
use crate::object::{
    self, new_scope, ForeignFunction, MapKey, ScopeRef, Value,
};

lazy_static! {
    /// Name, declared arity, body. The table is data; `install` turns it
    /// into a scope per machine.
    static ref BUILTIN_TABLE: Vec<(&'static str, Option<u8>, ForeignFn)> = vec![
        ("new", Some(1), builtin_new as ForeignFn),
        ("len", Some(1), builtin_len),
        ("type", Some(1), builtin_type),
        ("str", Some(1), builtin_str),
        ("repr", Some(1), builtin_repr),
        ("int", Some(1), builtin_int),
        ("float", Some(1), builtin_float),
        ("abs", Some(1), builtin_abs),
        ("append", Some(2), builtin_append),
        ("keys", Some(1), builtin_keys),
        ("contains", Some(2), builtin_contains),
        ("split", Some(2), builtin_split),
    ];
}

/// Build the builtin scope for one machine.
pub fn install() -> ScopeRef {
    let scope = new_scope();
    {
        let mut bindings = scope.borrow_mut();
        for (name, arity, func) in BUILTIN_TABLE.iter() {
            bindings.insert(name.to_string(), ForeignFunction::wrap(name, *arity, *func));
        }
    }
    scope
}

/// `new(Type)` — instantiate a struct type with all fields null.
fn builtin_new(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::StructType(ty) => Ok(ty.instantiate()),
        other => Err(RuntimeError::type_error(format!(
            "new() needs a struct type, not {}",
            object::behavior(other).name
        ))),
    }
}

fn builtin_len(args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Int(object::length(&args[0])?))
}

/// The kind name of a value; struct instances report their type name.
fn builtin_type(args: Vec<Value>) -> Result<Value, RuntimeError> {
    let name = match &args[0] {
        Value::Instance(instance) => instance.ty.name.clone(),
        other => object::behavior(other).name.to_string(),
    };
    Ok(Value::string(name))
}

fn builtin_str(args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(object::stringify(&args[0])))
}

fn builtin_repr(args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::string(object::represent(&args[0])))
}

fn builtin_int(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Int(v) => Ok(Value::Int(*v)),
        Value::Float(v) => Ok(Value::Int(*v as i64)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            RuntimeError::type_error(format!("cannot convert {:?} to an integer", &**s))
        }),
        other => Err(RuntimeError::type_error(format!(
            "cannot convert {} to an integer",
            object::behavior(other).name
        ))),
    }
}

fn builtin_float(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Int(v) => Ok(Value::Float(*v as f64)),
        Value::Float(v) => Ok(Value::Float(*v)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            RuntimeError::type_error(format!("cannot convert {:?} to a float", &**s))
        }),
        other => Err(RuntimeError::type_error(format!(
            "cannot convert {} to a float",
            object::behavior(other).name
        ))),
    }
}

fn builtin_abs(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Int(v) => Ok(Value::Int(v.wrapping_abs())),
        Value::Float(v) => Ok(Value::Float(v.abs())),
        other => Err(RuntimeError::type_error(format!(
            "abs() needs a number, not {}",
            object::behavior(other).name
        ))),
    }
}

fn builtin_append(mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    let value = args.pop().expect("arity checked");
    match &args[0] {
        Value::Array(items) => {
            items.borrow_mut().push(value);
            Ok(Value::Null)
        }
        other => Err(RuntimeError::type_error(format!(
            "append() needs an array, not {}",
            object::behavior(other).name
        ))),
    }
}

fn builtin_keys(args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Map(entries) => {
            let keys: Vec<Value> = entries.borrow().keys().map(MapKey::to_value).collect();
            Ok(Value::array(keys))
        }
        other => Err(RuntimeError::type_error(format!(
            "keys() needs a map, not {}",
            object::behavior(other).name
        ))),
    }
}

fn builtin_contains(args: Vec<Value>) -> Result<Value, RuntimeError> {
    let found = match &args[0] {
        Value::Str(haystack) => {
            let needle = expect_str(&args[1], "contains() needle")?;
            haystack.contains(needle)
        }
        Value::Array(items) => items.borrow().iter().any(|item| object::equals(item, &args[1])),
        Value::Map(entries) => {
            let key = object::hash_key(&args[1])?;
            entries.borrow().contains_key(&key)
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "contains() needs a string, array or map, not {}",
                object::behavior(other).name
            )))
        }
    };
    Ok(Value::Bool(found))
}

fn builtin_split(args: Vec<Value>) -> Result<Value, RuntimeError> {
    let text = expect_str(&args[0], "split() text")?;
    let separator = expect_str(&args[1], "split() separator")?;
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        text.split(separator).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn install_populates_the_scope() {
        let scope = install();
        assert!(scope.borrow().contains_key("len"));
        assert!(scope.borrow().contains_key("new"));
    }

    #[test]
    fn int_conversion() {
        assert_eq!(
            builtin_int(vec![Value::string("42")]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            builtin_int(vec![Value::Float(3.9)]).unwrap(),
            Value::Int(3)
        );
        let err = builtin_int(vec![Value::string("nope")]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn contains_works_across_kinds() {
        assert_eq!(
            builtin_contains(vec![Value::string("hello"), Value::string("ell")]).unwrap(),
            Value::Bool(true)
        );
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            builtin_contains(vec![arr, Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn split_on_separator() {
        let result = builtin_split(vec![Value::string("a,b,c"), Value::string(",")]).unwrap();
        assert_eq!(object::length(&result).unwrap(), 3);
    }
}

//! Text behavior: immutable strings.

use std::cmp::Ordering;

use crate::error::RuntimeError;

use super::{Behavior, MapKey, Value};

fn str_of(v: &Value) -> &str {
    match v {
        Value::Str(s) => s,
        _ => "",
    }
}

fn text_stringify(v: &Value) -> String {
    str_of(v).to_string()
}

fn text_represent(v: &Value) -> String {
    let mut out = String::from("\"");
    for c in str_of(v).chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn text_truthy(v: &Value) -> bool {
    !str_of(v).is_empty()
}

fn text_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        _ => false,
    }
}

fn text_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn text_add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::string(s))
        }
        _ => Err(RuntimeError::type_error(format!(
            "cannot concatenate string and {}",
            super::behavior(b).name
        ))),
    }
}

/// `"ab" * 3` repeats the string.
fn text_mul(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Str(x), Value::Int(n)) => {
            let count = (*n).max(0) as usize;
            Ok(Value::string(x.repeat(count)))
        }
        _ => Err(RuntimeError::type_error(
            "string repetition needs an integer count",
        )),
    }
}

fn text_length(v: &Value) -> Result<i64, RuntimeError> {
    Ok(str_of(v).chars().count() as i64)
}

/// Indexing yields a one-character string; negative indices count from the
/// end.
fn text_get_item(v: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let Value::Int(i) = index else {
        return Err(RuntimeError::type_error(format!(
            "string index must be an integer, not {}",
            super::behavior(index).name
        )));
    };
    let chars: Vec<char> = str_of(v).chars().collect();
    let len = chars.len();
    let actual = if *i < 0 { *i + len as i64 } else { *i };
    if actual < 0 || actual as usize >= len {
        return Err(RuntimeError::index_error(*i, len));
    }
    Ok(Value::string(chars[actual as usize].to_string()))
}

fn text_hash(v: &Value) -> Result<MapKey, RuntimeError> {
    Ok(MapKey::Str(str_of(v).to_string()))
}

pub static STRING_BEHAVIOR: Behavior = Behavior {
    name: "string",
    stringify: text_stringify,
    represent: text_represent,
    truthy: text_truthy,
    equals: Some(text_equals),
    compare: Some(text_compare),
    add: Some(text_add),
    mul: Some(text_mul),
    length: Some(text_length),
    get_item: Some(text_get_item),
    hash_key: Some(text_hash),
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{arith, get_item, ArithOp};

    #[test]
    fn concatenation() {
        let result = arith(ArithOp::Add, &Value::string("ab"), &Value::string("cd")).unwrap();
        assert_eq!(result, Value::string("abcd"));
    }

    #[test]
    fn negative_index() {
        let s = Value::string("abc");
        assert_eq!(get_item(&s, &Value::Int(-1)).unwrap(), Value::string("c"));
    }

    #[test]
    fn out_of_range_index() {
        let s = Value::string("abc");
        assert!(get_item(&s, &Value::Int(3)).is_err());
    }

    #[test]
    fn represent_escapes() {
        assert_eq!(text_represent(&Value::string("a\"b\n")), "\"a\\\"b\\n\"");
    }
}

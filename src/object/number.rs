//! Numeric behavior: host-machine integers and floats with the usual
//! cross-kind coercion. One table serves both kinds.

use std::cmp::Ordering;

use crate::error::RuntimeError;

use super::{Behavior, MapKey, Value};

fn as_pair(a: &Value, b: &Value) -> Option<NumPair> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(NumPair::Ints(*x, *y)),
        (Value::Int(x), Value::Float(y)) => Some(NumPair::Floats(*x as f64, *y)),
        (Value::Float(x), Value::Int(y)) => Some(NumPair::Floats(*x, *y as f64)),
        (Value::Float(x), Value::Float(y)) => Some(NumPair::Floats(*x, *y)),
        _ => None,
    }
}

enum NumPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

fn type_mismatch(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for '{}': {} and {}",
        op,
        super::behavior(a).name,
        super::behavior(b).name
    ))
}

fn num_stringify(v: &Value) -> String {
    match v {
        Value::Int(x) => x.to_string(),
        Value::Float(x) => {
            if x.is_finite() {
                ryu::Buffer::new().format(*x).to_string()
            } else {
                x.to_string()
            }
        }
        _ => String::new(),
    }
}

fn num_truthy(v: &Value) -> bool {
    match v {
        Value::Int(x) => *x != 0,
        Value::Float(x) => *x != 0.0,
        _ => false,
    }
}

fn num_equals(a: &Value, b: &Value) -> bool {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => x == y,
        Some(NumPair::Floats(x, y)) => x == y,
        None => false,
    }
}

fn num_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match as_pair(a, b)? {
        NumPair::Ints(x, y) => Some(x.cmp(&y)),
        NumPair::Floats(x, y) => x.partial_cmp(&y),
    }
}

fn num_add(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => Ok(Value::Int(x.wrapping_add(y))),
        Some(NumPair::Floats(x, y)) => Ok(Value::Float(x + y)),
        None => Err(type_mismatch("+", a, b)),
    }
}

fn num_sub(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => Ok(Value::Int(x.wrapping_sub(y))),
        Some(NumPair::Floats(x, y)) => Ok(Value::Float(x - y)),
        None => Err(type_mismatch("-", a, b)),
    }
}

fn num_mul(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => Ok(Value::Int(x.wrapping_mul(y))),
        Some(NumPair::Floats(x, y)) => Ok(Value::Float(x * y)),
        None => Err(type_mismatch("*", a, b)),
    }
}

/// Division always produces a float; a zero divisor raises, for floats too.
fn num_div(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let (x, y) = match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => (x as f64, y as f64),
        Some(NumPair::Floats(x, y)) => (x, y),
        None => return Err(type_mismatch("/", a, b)),
    };
    if y == 0.0 {
        return Err(RuntimeError::zero_division());
    }
    Ok(Value::Float(x / y))
}

fn num_rem(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) => {
            if y == 0 {
                Err(RuntimeError::zero_division())
            } else {
                Ok(Value::Int(x.rem_euclid(y)))
            }
        }
        Some(NumPair::Floats(x, y)) => {
            if y == 0.0 {
                Err(RuntimeError::zero_division())
            } else {
                Ok(Value::Float(x.rem_euclid(y)))
            }
        }
        None => Err(type_mismatch("%", a, b)),
    }
}

/// Integer bases with non-negative integer exponents stay integral;
/// everything else goes through float exponentiation.
fn num_pow(a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    match as_pair(a, b) {
        Some(NumPair::Ints(x, y)) if y >= 0 => {
            let exp = u32::try_from(y).unwrap_or(u32::MAX);
            Ok(Value::Int(x.wrapping_pow(exp)))
        }
        Some(NumPair::Ints(x, y)) => Ok(Value::Float((x as f64).powf(y as f64))),
        Some(NumPair::Floats(x, y)) => Ok(Value::Float(x.powf(y))),
        None => Err(type_mismatch("^", a, b)),
    }
}

fn num_negate(v: &Value) -> Result<Value, RuntimeError> {
    match v {
        Value::Int(x) => Ok(Value::Int(x.wrapping_neg())),
        Value::Float(x) => Ok(Value::Float(-x)),
        _ => Err(RuntimeError::type_error("bad operand for unary '-'")),
    }
}

fn num_hash(v: &Value) -> Result<MapKey, RuntimeError> {
    match v {
        Value::Int(x) => Ok(MapKey::Int(*x)),
        _ => Err(RuntimeError::unhashable("float")),
    }
}

pub static NUMBER_BEHAVIOR: Behavior = Behavior {
    name: "number",
    stringify: num_stringify,
    represent: num_stringify,
    truthy: num_truthy,
    equals: Some(num_equals),
    compare: Some(num_compare),
    add: Some(num_add),
    sub: Some(num_sub),
    mul: Some(num_mul),
    div: Some(num_div),
    rem: Some(num_rem),
    pow: Some(num_pow),
    negate: Some(num_negate),
    hash_key: Some(num_hash),
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::{arith, ArithOp};

    #[test]
    fn int_float_coercion() {
        let result = arith(ArithOp::Add, &Value::Int(1), &Value::Float(0.5)).unwrap();
        assert_eq!(result, Value::Float(1.5));
    }

    #[test]
    fn division_produces_floats() {
        let result = arith(ArithOp::Div, &Value::Int(5), &Value::Int(2)).unwrap();
        assert_eq!(result, Value::Float(2.5));
    }

    #[test]
    fn division_by_zero_raises_for_ints_and_floats() {
        let err = arith(ArithOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroDivision);
        let err = arith(ArithOp::Div, &Value::Float(1.0), &Value::Float(0.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroDivision);
    }

    #[test]
    fn integer_power() {
        let result = arith(ArithOp::Pow, &Value::Int(2), &Value::Int(10)).unwrap();
        assert_eq!(result, Value::Int(1024));
    }

    #[test]
    fn float_stringify_keeps_fraction_marker() {
        assert_eq!(num_stringify(&Value::Float(1.0)), "1.0");
    }
}

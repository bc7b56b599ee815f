//! Runtime values and the capability-slot dispatch layer.
//!
//! Every value kind supplies one static [`Behavior`] table of named
//! capability slots (stringify, compare, get-item, get-attribute, length,
//! ...). The VM never matches on a value's concrete kind for an operator:
//! it always looks the operator's slot up on the operand and invokes it
//! through the generic helpers below. New kinds plug into arithmetic,
//! comparison, subscripting and calling by providing a table.

pub mod foreign;
pub mod function;
pub mod mapping;
pub mod number;
pub mod sequence;
pub mod structs;
pub mod text;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::RuntimeError;

pub use foreign::{ForeignFn, ForeignFunction};
pub use function::{Callee, FunctionObj};
pub use structs::{StructInstance, StructType};

/// A shared mutable name → value mapping. Frames own one for their locals;
/// closures alias the defining frame's mapping by reference, so a write
/// through one closure is visible through every sibling that captured the
/// same scope.
pub type ScopeRef = Rc<RefCell<HashMap<String, Value>>>;

pub fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(HashMap::new()))
}

/// A runtime value. The set of kinds is closed; behavior is open through
/// the per-kind capability tables.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<BTreeMap<MapKey, Value>>>),
    StructType(Rc<StructType>),
    Instance(Rc<StructInstance>),
    Function(Rc<FunctionObj>),
    Foreign(Rc<ForeignFunction>),
    /// A raised error delivered to a catch clause (or rethrown).
    Error(Rc<RuntimeError>),
    /// VM-internal unwind marker consumed by END_FINALLY. Never visible to
    /// user code.
    Signal(Rc<Signal>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(Rc::from(s.into().as_str()))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn kind_name(&self) -> &'static str {
        behavior(self).name
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&stringify(self))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        equals(self, other)
    }
}

/// A hashable map key. Floats are deliberately not hashable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Null => Value::Null,
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(v) => Value::Int(*v),
            MapKey::Str(s) => Value::string(s.clone()),
        }
    }
}

/// Unwind reason held on the operand stack while a finally body runs.
/// `Continue` carries its jump target (the loop's continue point).
#[derive(Debug, Clone)]
pub enum Signal {
    Normal,
    Break,
    Continue(usize),
    Return(Value),
    Raised(RuntimeError),
}

type UnarySlot = fn(&Value) -> Result<Value, RuntimeError>;
type BinarySlot = fn(&Value, &Value) -> Result<Value, RuntimeError>;

/// The capability slots of one value kind. A `None` slot means the kind
/// does not support the operation and the generic helpers raise the
/// appropriate error kind.
pub struct Behavior {
    pub name: &'static str,
    pub stringify: fn(&Value) -> String,
    pub represent: fn(&Value) -> String,
    pub truthy: fn(&Value) -> bool,
    pub equals: Option<fn(&Value, &Value) -> bool>,
    pub compare: Option<fn(&Value, &Value) -> Option<Ordering>>,
    pub add: Option<BinarySlot>,
    pub sub: Option<BinarySlot>,
    pub mul: Option<BinarySlot>,
    pub div: Option<BinarySlot>,
    pub rem: Option<BinarySlot>,
    pub pow: Option<BinarySlot>,
    pub negate: Option<UnarySlot>,
    pub length: Option<fn(&Value) -> Result<i64, RuntimeError>>,
    pub get_item: Option<BinarySlot>,
    pub set_item: Option<fn(&Value, &Value, Value) -> Result<(), RuntimeError>>,
    pub get_attr: Option<fn(&Value, &str) -> Result<Value, RuntimeError>>,
    pub set_attr: Option<fn(&Value, &str, Value) -> Result<(), RuntimeError>>,
    pub hash_key: Option<fn(&Value) -> Result<MapKey, RuntimeError>>,
}

fn base_stringify(_v: &Value) -> String {
    "<object>".to_string()
}

fn base_truthy(_v: &Value) -> bool {
    true
}

impl Behavior {
    /// All-absent slot table; kinds override the slots they support.
    pub const BASE: Behavior = Behavior {
        name: "object",
        stringify: base_stringify,
        represent: base_stringify,
        truthy: base_truthy,
        equals: None,
        compare: None,
        add: None,
        sub: None,
        mul: None,
        div: None,
        rem: None,
        pow: None,
        negate: None,
        length: None,
        get_item: None,
        set_item: None,
        get_attr: None,
        set_attr: None,
        hash_key: None,
    };
}

/// Look up the behavior table for a value.
pub fn behavior(v: &Value) -> &'static Behavior {
    match v {
        Value::Null => &NULL_BEHAVIOR,
        Value::Bool(_) => &BOOL_BEHAVIOR,
        Value::Int(_) | Value::Float(_) => &number::NUMBER_BEHAVIOR,
        Value::Str(_) => &text::STRING_BEHAVIOR,
        Value::Array(_) => &sequence::ARRAY_BEHAVIOR,
        Value::Map(_) => &mapping::MAP_BEHAVIOR,
        Value::StructType(_) => &structs::STRUCT_TYPE_BEHAVIOR,
        Value::Instance(_) => &structs::INSTANCE_BEHAVIOR,
        Value::Function(_) => &function::FUNCTION_BEHAVIOR,
        Value::Foreign(_) => &foreign::FOREIGN_BEHAVIOR,
        Value::Error(_) => &ERROR_BEHAVIOR,
        Value::Signal(_) => &SIGNAL_BEHAVIOR,
    }
}

// ===== Generic dispatch helpers =====

/// The arithmetic operations routed through binary slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
            ArithOp::Pow => "^",
        }
    }
}

pub fn stringify(v: &Value) -> String {
    (behavior(v).stringify)(v)
}

pub fn represent(v: &Value) -> String {
    (behavior(v).represent)(v)
}

pub fn truthy(v: &Value) -> bool {
    (behavior(v).truthy)(v)
}

/// Equality: the left operand's slot decides; kinds without a slot compare
/// as never-equal (except trivial null/null).
pub fn equals(a: &Value, b: &Value) -> bool {
    match behavior(a).equals {
        Some(slot) => slot(a, b),
        None => false,
    }
}

pub fn arith(op: ArithOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let table = behavior(a);
    let slot = match op {
        ArithOp::Add => table.add,
        ArithOp::Sub => table.sub,
        ArithOp::Mul => table.mul,
        ArithOp::Div => table.div,
        ArithOp::Rem => table.rem,
        ArithOp::Pow => table.pow,
    };
    match slot {
        Some(f) => f(a, b),
        None => Err(RuntimeError::type_error(format!(
            "unsupported operand type(s) for '{}': {} and {}",
            op.symbol(),
            table.name,
            behavior(b).name
        ))),
    }
}

pub fn negate(v: &Value) -> Result<Value, RuntimeError> {
    match behavior(v).negate {
        Some(f) => f(v),
        None => Err(RuntimeError::type_error(format!(
            "bad operand type for unary '-': {}",
            behavior(v).name
        ))),
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`.
pub fn order(symbol: &str, a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    if let Some(slot) = behavior(a).compare {
        if let Some(ordering) = slot(a, b) {
            return Ok(ordering);
        }
    }
    Err(RuntimeError::type_error(format!(
        "'{}' not supported between {} and {}",
        symbol,
        behavior(a).name,
        behavior(b).name
    )))
}

pub fn get_item(obj: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match behavior(obj).get_item {
        Some(f) => f(obj, index),
        None => Err(RuntimeError::type_error(format!(
            "{} object is not subscriptable",
            behavior(obj).name
        ))),
    }
}

pub fn set_item(obj: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match behavior(obj).set_item {
        Some(f) => f(obj, index, value),
        None => Err(RuntimeError::type_error(format!(
            "{} object does not support item assignment",
            behavior(obj).name
        ))),
    }
}

pub fn get_attr(obj: &Value, name: &str) -> Result<Value, RuntimeError> {
    match behavior(obj).get_attr {
        Some(f) => f(obj, name),
        None => Err(RuntimeError::attribute_error(behavior(obj).name, name)),
    }
}

pub fn set_attr(obj: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    match behavior(obj).set_attr {
        Some(f) => f(obj, name, value),
        None => Err(RuntimeError::type_error(format!(
            "{} object does not support attribute assignment",
            behavior(obj).name
        ))),
    }
}

pub fn length(v: &Value) -> Result<i64, RuntimeError> {
    match behavior(v).length {
        Some(f) => f(v),
        None => Err(RuntimeError::type_error(format!(
            "{} object has no length",
            behavior(v).name
        ))),
    }
}

pub fn hash_key(v: &Value) -> Result<MapKey, RuntimeError> {
    match behavior(v).hash_key {
        Some(f) => f(v),
        None => Err(RuntimeError::unhashable(behavior(v).name)),
    }
}

// ===== Atom behaviors (null, bool) and internal kinds =====

fn null_stringify(_v: &Value) -> String {
    "null".to_string()
}

fn null_truthy(_v: &Value) -> bool {
    false
}

fn null_equals(_a: &Value, b: &Value) -> bool {
    matches!(b, Value::Null)
}

fn null_hash(_v: &Value) -> Result<MapKey, RuntimeError> {
    Ok(MapKey::Null)
}

pub static NULL_BEHAVIOR: Behavior = Behavior {
    name: "null",
    stringify: null_stringify,
    represent: null_stringify,
    truthy: null_truthy,
    equals: Some(null_equals),
    hash_key: Some(null_hash),
    ..Behavior::BASE
};

fn bool_stringify(v: &Value) -> String {
    match v {
        Value::Bool(true) => "true".to_string(),
        _ => "false".to_string(),
    }
}

fn bool_truthy(v: &Value) -> bool {
    matches!(v, Value::Bool(true))
}

fn bool_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

fn bool_hash(v: &Value) -> Result<MapKey, RuntimeError> {
    match v {
        Value::Bool(b) => Ok(MapKey::Bool(*b)),
        _ => Err(RuntimeError::unhashable("bool")),
    }
}

pub static BOOL_BEHAVIOR: Behavior = Behavior {
    name: "bool",
    stringify: bool_stringify,
    represent: bool_stringify,
    truthy: bool_truthy,
    equals: Some(bool_equals),
    hash_key: Some(bool_hash),
    ..Behavior::BASE
};

fn error_stringify(v: &Value) -> String {
    match v {
        Value::Error(err) => format!("{}: {}", err.kind, err.message),
        _ => String::new(),
    }
}

fn error_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Error(x), Value::Error(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

fn error_get_attr(v: &Value, name: &str) -> Result<Value, RuntimeError> {
    let Value::Error(err) = v else {
        return Err(RuntimeError::attribute_error("error", name));
    };
    match name {
        "kind" => Ok(Value::string(err.kind.as_str())),
        "message" => Ok(Value::string(err.message.clone())),
        "line" => Ok(Value::Int(
            err.trace.last().map(|t| t.line as i64).unwrap_or(0),
        )),
        "value" => Ok(err.value.clone().unwrap_or(Value::Null)),
        _ => Err(RuntimeError::attribute_error("error", name)),
    }
}

pub static ERROR_BEHAVIOR: Behavior = Behavior {
    name: "error",
    stringify: error_stringify,
    represent: error_stringify,
    equals: Some(error_equals),
    get_attr: Some(error_get_attr),
    ..Behavior::BASE
};

fn signal_stringify(_v: &Value) -> String {
    "<signal>".to_string()
}

pub static SIGNAL_BEHAVIOR: Behavior = Behavior {
    name: "signal",
    stringify: signal_stringify,
    represent: signal_stringify,
    ..Behavior::BASE
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&Value::Bool(false)));
        assert!(!truthy(&Value::Int(0)));
        assert!(truthy(&Value::Int(3)));
        assert!(!truthy(&Value::string("")));
        assert!(truthy(&Value::string("x")));
        assert!(!truthy(&Value::array(vec![])));
    }

    #[test]
    fn cross_kind_arith_is_a_type_error() {
        let err = arith(ArithOp::Add, &Value::Int(1), &Value::Null).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::TypeMismatch);
    }

    #[test]
    fn missing_subscript_slot() {
        let err = get_item(&Value::Int(1), &Value::Int(0)).unwrap_err();
        assert!(err.message.contains("not subscriptable"));
    }

    #[test]
    fn float_keys_are_unhashable() {
        let err = hash_key(&Value::Float(1.5)).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Unhashable);
    }
}

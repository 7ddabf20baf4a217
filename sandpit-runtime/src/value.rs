//! Value model of the executed language
//!
//! Composite values share identity through `Rc`, so a value may contain
//! itself. Anything that walks a value must guard against cycles.

use crate::abi::Location;
use crate::format::format_value;
use crate::promise::Promise;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<Vec<(Value, Value)>>>;
pub type ObjectRef = Rc<RefCell<ObjectValue>>;

/// A runtime value
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    /// Symbol with its optional description
    Symbol(Option<String>),
    Function(Rc<FunctionValue>),
    Error(Rc<ErrorValue>),
    /// `None` is an invalid date
    Date(Option<DateTime<Utc>>),
    RegExp(Rc<RegExpValue>),
    Promise(Promise),
    Array(ArrayRef),
    Set(ArrayRef),
    Map(MapRef),
    TypedArray(Rc<TypedArrayValue>),
    Object(ObjectRef),
    Host(Rc<dyn HostObject>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionValue {
    pub name: String,
}

/// A fault object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub location: Option<Location>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            location: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.location = Some(Location::new(line, column));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExpValue {
    pub source: String,
    pub flags: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl TypedArrayKind {
    pub fn name(&self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedArrayValue {
    pub kind: TypedArrayKind,
    pub elements: Vec<f64>,
}

/// A keyed record, optionally carrying the name of its constructor
#[derive(Clone, Default)]
pub struct ObjectValue {
    pub class_name: Option<String>,
    pub entries: Vec<(String, Value)>,
}

impl ObjectValue {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or overwrite a property, keeping insertion order
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// An opaque value owned by the embedding, such as a DOM node
///
/// The formatter knows nothing about these beyond a structured
/// serialization and a default string form.
pub trait HostObject {
    fn type_name(&self) -> &str;

    /// Structured form used by the formatter's fallback tier
    fn to_json(&self) -> Result<serde_json::Value, String>;

    fn default_string(&self) -> String {
        format!("[object {}]", self.type_name())
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn symbol(description: impl Into<String>) -> Self {
        Value::Symbol(Some(description.into()))
    }

    pub fn function(name: impl Into<String>) -> Self {
        Value::Function(Rc::new(FunctionValue { name: name.into() }))
    }

    /// A plain `Error` fault with the given message
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Rc::new(ErrorValue::new("Error", message)))
    }

    pub fn fault(error: ErrorValue) -> Self {
        Value::Error(Rc::new(error))
    }

    pub fn date(at: DateTime<Utc>) -> Self {
        Value::Date(Some(at))
    }

    pub fn invalid_date() -> Self {
        Value::Date(None)
    }

    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp(Rc::new(RegExpValue {
            source: source.into(),
            flags: flags.into(),
        }))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn set(items: Vec<Value>) -> Self {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn typed_array(kind: TypedArrayKind, elements: Vec<f64>) -> Self {
        Value::TypedArray(Rc::new(TypedArrayValue { kind, elements }))
    }

    /// A plain record from key/value pairs
    pub fn object<K: Into<String>>(entries: Vec<(K, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectValue {
            class_name: None,
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })))
    }

    /// A record created by a named constructor
    pub fn instance<K: Into<String>>(class_name: impl Into<String>, entries: Vec<(K, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(ObjectValue {
            class_name: Some(class_name.into()),
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })))
    }

    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(Rc::new(object))
    }

    /// Set a property on a record; returns false for non-records
    pub fn set_property(&self, key: impl Into<String>, value: Value) -> bool {
        match self {
            Value::Object(obj) => match obj.try_borrow_mut() {
                Ok(mut obj) => {
                    obj.set(key, value);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Append to an array or set; returns false for anything else
    pub fn push(&self, value: Value) -> bool {
        match self {
            Value::Array(items) | Value::Set(items) => match items.try_borrow_mut() {
                Ok(mut items) => {
                    items.push(value);
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Identity of reference-typed values, used for cycle detection
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(rc) | Value::Set(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Promise(p) => Some(p.address()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Function(_) => "function",
            Value::Error(_) => "error",
            Value::Date(_) => "date",
            Value::RegExp(_) => "regexp",
            Value::Promise(_) => "promise",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::TypedArray(_) => "typedarray",
            Value::Object(_) => "object",
            Value::Host(_) => "host",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Promise> for Value {
    fn from(p: Promise) -> Self {
        Value::Promise(p)
    }
}

// Debug goes through the formatter so cyclic values print safely.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

//! Dynamic values flowing through the resolution.
//!
//! A [Value] is either a literal (null, scalars, strings, lists) that can be embedded in the text
//! of an invocation plan, or an [Object]: a type-erased service instance tagged with its class.
//! Objects compare by identity, which is what the resolved-instance cache preserves.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Type-erased instance of a catalog class
#[derive(Clone)]
pub struct Object {
    class: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(class: &str, instance: T) -> Self {
        Self {
            class: class.into(),
            inner: Arc::new(instance),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Identity comparison: both handles point to the same instance.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.class, Arc::as_ptr(&self.inner))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    #[serde(skip)]
    Object(Object),
}

impl Value {
    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Items of a list value, consumed for spreading into variadic slots.
    pub fn into_items(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// True when the value holds no object and can be written into plan text.
    pub fn is_literal(&self) -> bool {
        match self {
            Value::Object(_) => false,
            Value::List(items) => items.iter().all(Value::is_literal),
            _ => true,
        }
    }

    /// Short name of the value shape, used in diagnostics.
    pub fn kind(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(o) => o.class(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

/// Shared mutable storage standing for a by-reference slot.
///
/// Clones alias the same storage: a write through one handle is visible through all of them.
#[derive(Clone, Default)]
pub struct ValueCell(Arc<Mutex<Value>>);

impl ValueCell {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Arc::new(Mutex::new(value.into())))
    }

    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    pub fn set(&self, value: impl Into<Value>) {
        *self.0.lock() = value.into();
    }

    pub fn replace(&self, value: impl Into<Value>) -> Value {
        std::mem::replace(&mut *self.0.lock(), value.into())
    }

    pub fn ptr_eq(&self, other: &ValueCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueCell").field(&*self.0.lock()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::new("Probe", Probe);
        let b = Object::new("Probe", Probe);
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a.clone()), Value::from(b));
        assert!(a.downcast::<Probe>().is_some());
        assert!(a.downcast::<String>().is_none());
    }

    #[test]
    fn literal_detection_is_recursive() {
        let nested = Value::list([Value::from("a"), Value::list([1, 2])]);
        assert!(nested.is_literal());
        let with_object = Value::list([Value::from(Object::new("Probe", Probe))]);
        assert!(!with_object.is_literal());
    }

    #[test]
    fn cells_alias_their_storage() {
        let cell = ValueCell::new("before");
        let alias = cell.clone();
        alias.set("after");
        assert_eq!(cell.get(), Value::from("after"));
        assert!(cell.ptr_eq(&alias));
        assert!(!cell.ptr_eq(&ValueCell::new("after")));
    }

    #[test]
    fn literals_survive_serialization() {
        let value = Value::list([Value::from("q"), Value::from(3), Value::Null]);
        let text = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
        assert!(serde_json::to_string(&Value::from(Object::new("Probe", Probe))).is_err());
    }
}

//! Callables and the argument lists handed to them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{AutowireError, Object, Parameter, Result, Signature, Value, ValueCell};

/// A Callable exposes its parameter descriptors and can be called with resolved arguments.
pub trait Callable: Send + Sync {
    fn signature(&self) -> &Signature;

    fn call(&self, args: &Arguments) -> Result<Value>;
}

type Body = Arc<dyn Fn(&Arguments) -> Result<Value> + Send + Sync>;

/// Closure-backed [Callable]
#[derive(Clone)]
pub struct Function {
    signature: Signature,
    body: Body,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            signature: Signature::new(name, parameters),
            body: Arc::new(body),
        }
    }
}

impl Callable for Function {
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn call(&self, args: &Arguments) -> Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Something `call` and `compile` know how to invoke
#[derive(Clone)]
pub enum Target {
    /// An ad-hoc callable.
    Callable(Arc<dyn Callable>),
    /// An invokable registry entry, or else a named catalog function.
    Named(String),
    /// A method looked up on a class name or on the class of a registry entry.
    Method(String, String),
    /// A method of an already instantiated object. Such targets cannot be compiled.
    Bound(Object, String),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Callable(c) => write!(f, "Callable({})", c.signature().name()),
            Target::Named(name) => write!(f, "Named({name})"),
            Target::Method(id, method) => write!(f, "Method({id}::{method})"),
            Target::Bound(object, method) => write!(f, "Bound({}->{method})", object.class()),
        }
    }
}

impl From<Function> for Target {
    fn from(f: Function) -> Self {
        Target::Callable(Arc::new(f))
    }
}

impl From<Arc<dyn Callable>> for Target {
    fn from(c: Arc<dyn Callable>) -> Self {
        Target::Callable(c)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Named(name.to_string())
    }
}

impl From<(&str, &str)> for Target {
    fn from((id, method): (&str, &str)) -> Self {
        Target::Method(id.to_string(), method.to_string())
    }
}

impl From<(Object, &str)> for Target {
    fn from((object, method): (Object, &str)) -> Self {
        Target::Bound(object, method.to_string())
    }
}

/// A resolved argument slot
#[derive(Clone, Debug)]
pub enum Argument {
    Value(Value),
    /// Storage shared with whoever supplied it; writes are visible after the call.
    Reference(ValueCell),
}

impl Argument {
    /// Current value of the slot.
    pub fn value(&self) -> Value {
        match self {
            Argument::Value(v) => v.clone(),
            Argument::Reference(cell) => cell.get(),
        }
    }

    pub fn cell(&self) -> Option<&ValueCell> {
        match self {
            Argument::Reference(cell) => Some(cell),
            Argument::Value(_) => None,
        }
    }
}

/// Ordered arguments for one invocation.
///
/// The list is shorter than the parameter list when trailing optional parameters without a
/// default value were left out.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    slots: Vec<Argument>,
    write_back: Vec<(ValueCell, Vec<ValueCell>)>,
}

impl Arguments {
    pub fn new(slots: Vec<Argument>) -> Self {
        Self {
            slots,
            write_back: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Argument> {
        self.slots.iter()
    }

    /// Value at `index`, `None` when the slot was omitted.
    pub fn value(&self, index: usize) -> Option<Value> {
        self.slots.get(index).map(Argument::value)
    }

    /// Values of all slots starting at `index`, as seen by a variadic parameter.
    pub fn rest(&self, index: usize) -> Vec<Value> {
        self.slots
            .iter()
            .skip(index)
            .map(Argument::value)
            .collect()
    }

    /// Cells of all by-reference slots starting at `index`.
    pub fn rest_cells(&self, index: usize) -> Vec<&ValueCell> {
        self.slots
            .iter()
            .skip(index)
            .filter_map(Argument::cell)
            .collect()
    }

    pub fn cell(&self, index: usize) -> Result<&ValueCell> {
        self.slot(index)?
            .cell()
            .ok_or_else(|| mismatch(index, "a reference", "a value"))
    }

    pub fn str(&self, index: usize) -> Result<String> {
        match self.slot(index)?.value() {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(index, "string", other.kind())),
        }
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        match self.slot(index)?.value() {
            Value::Int(i) => Ok(i),
            other => Err(mismatch(index, "int", other.kind())),
        }
    }

    pub fn list(&self, index: usize) -> Result<Vec<Value>> {
        match self.slot(index)?.value() {
            Value::List(items) => Ok(items),
            other => Err(mismatch(index, "list", other.kind())),
        }
    }

    pub fn object<T: std::any::Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let value = self.slot(index)?.value();
        value
            .as_object()
            .and_then(Object::downcast::<T>)
            .ok_or_else(|| mismatch(index, std::any::type_name::<T>(), value.kind()))
    }

    fn slot(&self, index: usize) -> Result<&Argument> {
        self.slots
            .get(index)
            .ok_or_else(|| AutowireError::InvalidArgument(format!("missing argument #{index}")))
    }

    pub(crate) fn push(&mut self, argument: Argument) {
        self.slots.push(argument);
    }

    pub(crate) fn link_list(&mut self, target: ValueCell, items: Vec<ValueCell>) {
        self.write_back.push((target, items));
    }

    /// Copy the element cells of spread by-reference lists back into the caller's list cell.
    pub(crate) fn write_back(&self) {
        for (target, items) in &self.write_back {
            target.set(Value::List(items.iter().map(ValueCell::get).collect()));
        }
    }
}

fn mismatch(index: usize, expected: &str, found: &str) -> AutowireError {
    AutowireError::InvalidArgument(format!(
        "argument #{index}: expected {expected}, found {found}"
    ))
}

/// A named input supplied by the caller
#[derive(Clone, Debug)]
pub enum Input {
    Value(Value),
    Reference(ValueCell),
    /// Ordered cells for a variadic by-reference parameter.
    References(Vec<ValueCell>),
}

impl Input {
    pub fn value(&self) -> Value {
        match self {
            Input::Value(v) => v.clone(),
            Input::Reference(cell) => cell.get(),
            Input::References(cells) => Value::List(cells.iter().map(ValueCell::get).collect()),
        }
    }
}

/// Named inputs of a call, keyed by parameter name
#[derive(Clone, Debug, Default)]
pub struct Inputs(HashMap<String, Input>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, Input::Value(value.into()));
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, cell: &ValueCell) -> Self {
        self.insert(name, Input::Reference(cell.clone()));
        self
    }

    pub fn with_references(mut self, name: impl Into<String>, cells: Vec<ValueCell>) -> Self {
        self.insert(name, Input::References(cells));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, input: Input) -> Option<Input> {
        self.0.insert(name.into(), input)
    }

    pub fn get(&self, name: &str) -> Option<&Input> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Compile-time replacements for parameter defaults, keyed by parameter name
pub type Overrides = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_report_mismatch() {
        let args = Arguments::new(vec![
            Argument::Value("abc".into()),
            Argument::Reference(ValueCell::new(3)),
        ]);
        assert_eq!(args.str(0).unwrap(), "abc");
        assert_eq!(args.int(1).unwrap(), 3);
        assert!(matches!(args.int(0), Err(AutowireError::InvalidArgument(_))));
        assert!(matches!(args.cell(0), Err(AutowireError::InvalidArgument(_))));
        assert!(matches!(args.str(2), Err(AutowireError::InvalidArgument(_))));
    }

    #[test]
    fn write_back_rebuilds_list() {
        let target = ValueCell::new(Value::list(["c", "b"]));
        let items = vec![ValueCell::new("c"), ValueCell::new("b")];
        let mut args = Arguments::default();
        for cell in &items {
            args.push(Argument::Reference(cell.clone()));
        }
        args.link_list(target.clone(), items);
        for (i, cell) in args.rest_cells(0).into_iter().enumerate() {
            cell.set(i as i64 + 1);
        }
        args.write_back();
        assert_eq!(target.get(), Value::list([1, 2]));
    }

    #[test]
    fn function_exposes_signature() {
        let f = Function::new("upper", vec![Parameter::new("name").default("abc")], |args| {
            Ok(args.str(0)?.to_uppercase().into())
        });
        assert_eq!(f.signature().name(), "upper");
        let out = f.call(&Arguments::new(vec![Argument::Value("x".into())]));
        assert_eq!(out.unwrap(), Value::from("X"));
    }
}

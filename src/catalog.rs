//! Known classes, interfaces and named functions.
//!
//! The catalog is the introspection side of autowiring: it tells which ids are constructible,
//! what their constructors and methods expect, and lets plan text refer to targets by name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Arguments, AutowireError, Callable, Object, Parameter, Result, Signature, Value};

type StaticBody = Arc<dyn Fn(&Arguments) -> Result<Value> + Send + Sync>;
type InstanceBody = Arc<dyn Fn(&Object, &Arguments) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum MethodBody {
    Static(StaticBody),
    Instance(InstanceBody),
}

/// A method of a catalog class
#[derive(Clone)]
pub struct Method {
    signature: Signature,
    body: MethodBody,
}

impl Method {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_static(&self) -> bool {
        matches!(self.body, MethodBody::Static(_))
    }

    /// Invoke the method. Instance methods need a receiver.
    pub fn invoke(&self, receiver: Option<&Value>, args: &Arguments) -> Result<Value> {
        match &self.body {
            MethodBody::Static(f) => f(args),
            MethodBody::Instance(f) => {
                let object = receiver.and_then(Value::as_object).ok_or_else(|| {
                    AutowireError::InvalidArgument(format!(
                        "'{}' needs an object receiver",
                        self.signature.name()
                    ))
                })?;
                f(object, args)
            }
        }
    }
}

/// A constructible (or abstract) type
#[derive(Clone)]
pub struct Class {
    name: String,
    interface: bool,
    constructor: Option<Method>,
    invoke: Option<Method>,
    methods: HashMap<String, Method>,
}

impl Class {
    /// Declare a concrete class whose constructor builds a `T` from its resolved arguments.
    pub fn new<T, F>(name: impl Into<String>, parameters: Vec<Parameter>, constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Arguments) -> Result<T> + Send + Sync + 'static,
    {
        let name = name.into();
        let class = name.clone();
        let body: StaticBody = Arc::new(move |args: &Arguments| {
            Ok(Value::Object(Object::new(&class, constructor(args)?)))
        });
        Self {
            constructor: Some(Method {
                signature: Signature::new(format!("{name}::new"), parameters),
                body: MethodBody::Static(body),
            }),
            name,
            interface: false,
            invoke: None,
            methods: HashMap::new(),
        }
    }

    /// Declare an abstract type: known, but never constructed.
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interface: true,
            constructor: None,
            invoke: None,
            methods: HashMap::new(),
        }
    }

    /// Add an instance method operating on the `T` built by the constructor.
    pub fn method<T, F>(mut self, name: &str, parameters: Vec<Parameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        let method = self.instance_method(name, parameters, body);
        self.methods.insert(name.to_string(), method);
        self
    }

    pub fn static_method<F>(mut self, name: &str, parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        let method = Method {
            signature: Signature::new(format!("{}::{name}", self.name), parameters),
            body: MethodBody::Static(Arc::new(body)),
        };
        self.methods.insert(name.to_string(), method);
        self
    }

    /// Make instances of the class invokable.
    pub fn invokable<T, F>(mut self, parameters: Vec<Parameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        self.invoke = Some(self.instance_method("invoke", parameters, body));
        self
    }

    fn instance_method<T, F>(&self, name: &str, parameters: Vec<Parameter>, body: F) -> Method
    where
        T: Any + Send + Sync,
        F: Fn(&T, &Arguments) -> Result<Value> + Send + Sync + 'static,
    {
        let signature = Signature::new(format!("{}::{name}", self.name), parameters);
        let qualified = signature.name().to_string();
        let body: InstanceBody = Arc::new(move |object: &Object, args: &Arguments| {
            let this = object.downcast_ref::<T>().ok_or_else(|| {
                AutowireError::InvalidArgument(format!(
                    "'{qualified}' called on an instance of '{}'",
                    object.class()
                ))
            })?;
            body(this, args)
        });
        Method {
            signature,
            body: MethodBody::Instance(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interface(&self) -> bool {
        self.interface
    }

    pub fn constructor(&self) -> Option<&Method> {
        self.constructor.as_ref()
    }

    pub fn invoke_method(&self) -> Option<&Method> {
        self.invoke.as_ref()
    }

    pub fn get_method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("interface", &self.interface)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The set of classes and functions known to an autowiring engine
#[derive(Clone, Default)]
pub struct Catalog {
    classes: HashMap<String, Arc<Class>>,
    functions: HashMap<String, Arc<dyn Callable>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: Class) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_function(mut self, function: impl Callable + 'static) -> Self {
        self.add_function(Arc::new(function));
        self
    }

    pub fn add_class(&mut self, class: Class) {
        self.classes.insert(class.name.clone(), Arc::new(class));
    }

    pub fn add_function(&mut self, function: Arc<dyn Callable>) {
        self.functions
            .insert(function.signature().name().to_string(), function);
    }

    /// Any known class, including interfaces.
    pub fn class(&self, name: &str) -> Option<&Arc<Class>> {
        self.classes.get(name)
    }

    /// A class that can be instantiated.
    pub fn concrete(&self, name: &str) -> Option<&Arc<Class>> {
        self.classes.get(name).filter(|c| !c.interface)
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.classes.get(name).is_some_and(|c| c.interface)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn Callable>> {
        self.functions.get(name)
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Argument;

    struct Greeter {
        greeting: String,
    }

    fn greeter() -> Class {
        Class::new("Greeter", vec![Parameter::new("greeting").default("hi")], |args| {
            Ok(Greeter {
                greeting: args.str(0)?,
            })
        })
        .method("greet", vec![Parameter::new("name")], |g: &Greeter, args| {
            Ok(format!("{} {}", g.greeting, args.str(0)?).into())
        })
    }

    #[test]
    fn constructor_builds_tagged_object() {
        let class = greeter();
        let args = Arguments::new(vec![Argument::Value("hello".into())]);
        let ctor = class.constructor().unwrap();
        assert_eq!(ctor.signature().name(), "Greeter::new");
        let object = ctor.invoke(None, &args).unwrap();
        assert_eq!(object.as_object().unwrap().class(), "Greeter");

        let greet = class.get_method("greet").unwrap();
        assert!(!greet.is_static());
        let out = greet
            .invoke(
                Some(&object),
                &Arguments::new(vec![Argument::Value("bob".into())]),
            )
            .unwrap();
        assert_eq!(out, Value::from("hello bob"));
        assert!(matches!(
            greet.invoke(None, &Arguments::default()),
            Err(AutowireError::InvalidArgument(_))
        ));
    }

    #[test]
    fn interfaces_are_not_concrete() {
        let catalog = Catalog::new()
            .with_class(greeter())
            .with_class(Class::interface("Greeting"));
        assert!(catalog.concrete("Greeter").is_some());
        assert!(catalog.concrete("Greeting").is_none());
        assert!(catalog.is_interface("Greeting"));
        assert!(!catalog.is_interface("Greeter"));
        assert!(catalog.class("Missing").is_none());
    }
}

use std::collections::hash_map::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::*;

/// How a registry id is resolved
#[derive(Clone)]
pub enum Definition {
    /// Autowire an instance of a catalog class.
    Class(String),
    /// Call a factory, autowiring its parameters.
    Factory(Arc<dyn Callable>),
    /// Anything else. Accepted when set, rejected when resolved.
    Raw(Value),
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Class(class) => write!(f, "Class({class})"),
            Definition::Factory(c) => write!(f, "Factory({})", c.signature().name()),
            Definition::Raw(v) => write!(f, "Raw({v:?})"),
        }
    }
}

impl From<&str> for Definition {
    fn from(class: &str) -> Self {
        Definition::Class(class.to_string())
    }
}

impl From<Function> for Definition {
    fn from(f: Function) -> Self {
        Definition::Factory(Arc::new(f))
    }
}

impl From<Value> for Definition {
    fn from(value: Value) -> Self {
        match value {
            Value::Str(class) => Definition::Class(class),
            other => Definition::Raw(other),
        }
    }
}

/// Handle to a shared [Container], resolvable under [Container::REGISTRY_ID].
///
/// Holds a weak reference so the cached handle does not keep its own container alive.
#[derive(Clone, Debug)]
pub struct RegistryHandle(Weak<Container>);

impl RegistryHandle {
    pub fn upgrade(&self) -> Result<Arc<Container>> {
        self.0
            .upgrade()
            .ok_or_else(|| AutowireError::NotFound(Container::REGISTRY_ID.to_string()))
    }
}

/// Default [Registry]: definitions plus a cache of resolved values.
///
/// Each id is resolved at most once; later lookups return the cached value.
/// Ids without a definition are treated as class names and autowired.
pub struct Container {
    autowire: Arc<Autowire>,
    definitions: RwLock<HashMap<String, Definition>>,
    resolved: Mutex<HashMap<String, Value>>,
}

impl Container {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_autowire(Arc::new(Autowire::new(catalog)))
    }

    pub fn with_autowire(autowire: Arc<Autowire>) -> Self {
        Self {
            autowire,
            definitions: RwLock::default(),
            resolved: Mutex::default(),
        }
    }

    /// Id under which a shared container provides a [RegistryHandle] to itself.
    pub const REGISTRY_ID: &'static str = "Registry";

    /// Shared container. Factories may depend on it with a parameter typed [Self::REGISTRY_ID].
    pub fn shared(catalog: Catalog) -> Arc<Self> {
        Self::shared_with(Arc::new(Autowire::new(catalog)))
    }

    pub fn shared_with(autowire: Arc<Autowire>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Container>| {
            let container = Self::with_autowire(autowire);
            let handle = Object::new(Self::REGISTRY_ID, RegistryHandle(this.clone()));
            container
                .resolved
                .lock()
                .insert(Self::REGISTRY_ID.to_string(), handle.into());
            container
        })
    }

    pub fn autowire(&self) -> &Arc<Autowire> {
        &self.autowire
    }

    pub fn is_resolved(&self, id: &str) -> bool {
        self.resolved.lock().contains_key(id)
    }

    /// Call a target, resolving its parameters against this container.
    pub fn call(&self, target: impl Into<Target>, inputs: &Inputs) -> Result<Value> {
        self.autowire.call(self, target, inputs)
    }

    pub fn construct(&self, class: &str, inputs: &Inputs) -> Result<Value> {
        self.autowire.construct(self, class, inputs)
    }

    pub fn compile(
        &self,
        target: impl Into<Target>,
        overrides: &Overrides,
        runtime_inputs: bool,
    ) -> Result<InvocationPlan> {
        self.autowire.compile(self, target, overrides, runtime_inputs)
    }

    pub fn compile_construct(
        &self,
        class: &str,
        overrides: &Overrides,
        runtime_inputs: bool,
    ) -> Result<InvocationPlan> {
        self.autowire
            .compile_construct(self, class, overrides, runtime_inputs)
    }

    pub fn can_autowire(&self, id: &str, inputs: &Inputs) -> Result<bool> {
        self.autowire.can_autowire(self, id, inputs)
    }

    pub fn set_reference_tracker(&self, tracker: Arc<dyn ReferenceTracker>) {
        self.autowire.set_reference_tracker(tracker);
    }

    fn resolve(&self, id: &str, definition: Definition) -> Result<Value> {
        match definition {
            Definition::Class(class) => self.autowire.construct(self, &class, &Inputs::new()),
            Definition::Factory(factory) => {
                let _guard = self.autowire.enter(id)?;
                self.autowire
                    .call(self, Target::Callable(factory), &Inputs::new())
            }
            Definition::Raw(value) => Err(AutowireError::InvalidDefinition {
                id: id.to_string(),
                definition: format!("{value:?}"),
            }),
        }
    }
}

impl Registry for Container {
    fn has(&self, id: &str) -> Result<bool> {
        if self.definitions.read().contains_key(id) || self.is_resolved(id) {
            return Ok(true);
        }
        self.autowire.can_autowire(self, id, &Inputs::new())
    }

    fn get(&self, id: &str) -> Result<Value> {
        if let Some(value) = self.resolved.lock().get(id) {
            return Ok(value.clone());
        }
        let definition = self
            .definitions
            .read()
            .get(id)
            .cloned()
            .unwrap_or_else(|| Definition::Class(id.to_string()));
        let value = self.resolve(id, definition)?;
        debug!(id, kind = value.kind(), "resolved");
        // Keep the first value if a concurrent lookup won the race
        let mut resolved = self.resolved.lock();
        Ok(resolved.entry(id.to_string()).or_insert(value).clone())
    }

    fn set(&self, id: &str, definition: Definition) {
        debug!(id, ?definition, "define");
        self.definitions.write().insert(id.to_string(), definition);
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &*self.definitions.read())
            .field("resolved", &self.resolved.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counter;

    fn counting_factory(calls: Arc<AtomicUsize>) -> Function {
        Function::new("make_counter", vec![], move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Object::new("Counter", Counter).into())
        })
    }

    #[test]
    fn factory_runs_once() -> Result<(), AutowireError> {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new(Catalog::new());
        container.set("counter", counting_factory(calls.clone()).into());

        let first = container.get("counter")?;
        let second = container.get("counter")?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(container.is_resolved("counter"));
        Ok(())
    }

    #[test]
    fn set_does_not_reset_cache() -> Result<(), AutowireError> {
        let calls = Arc::new(AtomicUsize::new(0));
        let container = Container::new(Catalog::new());
        container.set("counter", counting_factory(calls.clone()).into());
        let first = container.get("counter")?;

        container.set("counter", Definition::Raw(Value::Null));
        assert_eq!(container.get("counter")?, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn raw_definitions_are_invalid() {
        let container = Container::new(Catalog::new());
        container.set("broken", Value::list(["testing"]).into());
        assert!(container.has("broken").unwrap());
        assert!(matches!(
            container.get("broken"),
            Err(AutowireError::InvalidDefinition { id, .. }) if id == "broken"
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let container = Container::new(Catalog::new());
        assert!(!container.has("nothing").unwrap());
        assert!(matches!(
            container.get("nothing"),
            Err(AutowireError::NotFound(id)) if id == "nothing"
        ));
    }

    fn registry_param() -> Vec<Parameter> {
        vec![Parameter::new("registry").typed(Container::REGISTRY_ID)]
    }

    #[test]
    fn shared_container_provides_itself() -> Result<(), AutowireError> {
        let container = Container::shared(Catalog::new());
        assert!(container.has(Container::REGISTRY_ID)?);
        container.set(
            "counter",
            Function::new("make_counter", vec![], |_: &Arguments| {
                Ok(Object::new("Counter", Counter).into())
            })
            .into(),
        );
        container.set(
            "via_registry",
            Function::new("via_registry", registry_param(), |args: &Arguments| {
                args.object::<RegistryHandle>(0)?.upgrade()?.get("counter")
            })
            .into(),
        );
        assert_eq!(container.get("via_registry")?, container.get("counter")?);

        let handle = container.get(Container::REGISTRY_ID)?;
        let handle = handle.as_object().and_then(Object::downcast::<RegistryHandle>).unwrap();
        assert!(Arc::ptr_eq(&handle.upgrade()?, &container));
        Ok(())
    }

    #[test]
    fn plain_container_has_no_registry_entry() {
        let container = Container::new(Catalog::new());
        assert!(!container.has(Container::REGISTRY_ID).unwrap());
    }

    #[test]
    fn dropped_container_handle_is_not_found() {
        let container = Container::shared(Catalog::new());
        let handle = container.get(Container::REGISTRY_ID).unwrap();
        drop(container);
        let handle = handle.as_object().and_then(Object::downcast::<RegistryHandle>).unwrap();
        assert!(matches!(handle.upgrade(), Err(AutowireError::NotFound(_))));
    }

    #[test]
    fn self_referencing_factory_is_circular() {
        let container = Container::shared(Catalog::new());
        container.set(
            "loop",
            Function::new("make_loop", registry_param(), |args: &Arguments| {
                args.object::<RegistryHandle>(0)?.upgrade()?.get("loop")
            })
            .into(),
        );
        match container.get("loop") {
            Err(AutowireError::CircularDependency(chain)) => assert_eq!(chain, vec!["loop", "loop"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(container.autowire().construction_chain().is_empty());
    }
}

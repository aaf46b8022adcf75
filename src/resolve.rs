//! Argument resolution and direct invocation.
//!
//! Each parameter is filled by the first rule that applies:
//!
//! * a named input with the parameter's name,
//! * the first declared type the [Registry] has,
//! * the declared default value.
//!
//! When none applies to an optional parameter, the failure is deferred: it is raised as soon as a
//! later parameter resolves, chained below the failure of a later required parameter, or dropped
//! (omitting the trailing parameters) when nothing after it resolves.
//!
//! The [Autowire] engine also owns the construction session guarding recursive construction.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::session::{ConstructionSession, SessionGuard};
use crate::{
    Argument, Arguments, AutowireConfig, AutowireError, Catalog, Class, Definition, Input, Inputs,
    Parameter, Result, Signature, Target, Value, ValueCell,
};

/// Id-based service lookup consulted while resolving parameters.
pub trait Registry: Send + Sync {
    /// True if `id` has a definition or can currently be autowired.
    ///
    /// Circular constructions discovered while probing are reported as errors.
    fn has(&self, id: &str) -> Result<bool>;

    /// Obtain the value for `id`, resolving and caching it on first use.
    fn get(&self, id: &str) -> Result<Value>;

    /// Register or replace the definition of `id`. Already cached values are kept.
    fn set(&self, id: &str, definition: Definition);
}

/// Observer of the registry ids consulted during resolution
pub trait ReferenceTracker: Send + Sync {
    fn track_reference(&self, id: &str);
}

/// Autowiring engine: resolves arguments, calls targets and constructs catalog classes
pub struct Autowire {
    catalog: Arc<Catalog>,
    config: AutowireConfig,
    tracker: RwLock<Option<Arc<dyn ReferenceTracker>>>,
    session: ConstructionSession,
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Invoke,
    /// Check resolvability without fetching registry values.
    Probe,
}

impl Autowire {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_config(catalog, AutowireConfig::default())
    }

    pub fn with_config(catalog: Catalog, config: AutowireConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            session: ConstructionSession::new(config.max_depth),
            config,
            tracker: RwLock::new(None),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &AutowireConfig {
        &self.config
    }

    /// Report every registry id consulted by subsequent type-based resolutions.
    pub fn set_reference_tracker(&self, tracker: Arc<dyn ReferenceTracker>) {
        *self.tracker.write() = Some(tracker);
    }

    pub(crate) fn track_reference(&self, id: &str) {
        if let Some(tracker) = self.tracker.read().as_ref() {
            tracker.track_reference(id);
        }
    }

    /// Ids currently being constructed, in entry order.
    pub fn construction_chain(&self) -> Vec<String> {
        self.session.chain()
    }

    pub(crate) fn enter(&self, id: &str) -> Result<SessionGuard<'_>> {
        self.session.enter(id)
    }

    /// Resolve one argument per parameter of `signature`.
    ///
    /// `owner` names the class the callable belongs to in error messages.
    pub fn resolve_arguments(
        &self,
        registry: &dyn Registry,
        signature: &Signature,
        inputs: &Inputs,
        owner: &str,
    ) -> Result<Arguments> {
        self.create_arguments(registry, signature, inputs, owner, Mode::Invoke)
    }

    fn create_arguments(
        &self,
        registry: &dyn Registry,
        signature: &Signature,
        inputs: &Inputs,
        owner: &str,
        mode: Mode,
    ) -> Result<Arguments> {
        let mut collector = Collector::new(owner);
        for param in signature.parameters() {
            let name = param.name();
            if let Some(input) = inputs.get(name) {
                trace!(callable = signature.name(), parameter = name, "named input");
                collector.push_input(param, input)?;
                continue;
            }

            if let Some(ty) = registered_type(registry, param)? {
                trace!(callable = signature.name(), parameter = name, ty, "registry");
                collector.ready()?;
                let value = match mode {
                    Mode::Probe => Value::Null,
                    Mode::Invoke => {
                        self.track_reference(ty);
                        registry.get(ty)?
                    }
                };
                collector.push_resolved(param, value)?;
                continue;
            }

            if let Some(default) = param.default_value() {
                trace!(callable = signature.name(), parameter = name, "default value");
                collector.push_literal(param, default.clone())?;
                continue;
            }

            let argument = signature.describe(param);
            if param.is_optional() {
                trace!(callable = signature.name(), parameter = name, "deferred");
                collector.defer(argument);
            } else {
                return Err(collector.fail(argument));
            }
        }
        Ok(collector.finish())
    }

    /// Resolve the arguments of a target and invoke it.
    pub fn call(
        &self,
        registry: &dyn Registry,
        target: impl Into<Target>,
        inputs: &Inputs,
    ) -> Result<Value> {
        let target = target.into();
        debug!(?target, "call");
        match target {
            Target::Callable(callable) => {
                let args = self.resolve_arguments(registry, callable.signature(), inputs, "")?;
                invoke_with(args, |args| callable.call(args))
            }
            Target::Method(id, method) => {
                let (class, instance) = self.locate(registry, &id)?;
                let m = class.get_method(&method).ok_or_else(|| missing_method(&class, &method))?;
                let args = self.resolve_arguments(registry, m.signature(), inputs, class.name())?;
                let receiver = match (m.is_static(), instance) {
                    (true, _) => None,
                    (false, Some(instance)) => Some(instance),
                    (false, None) => Some(registry.get(class.name())?),
                };
                invoke_with(args, |args| m.invoke(receiver.as_ref(), args))
            }
            Target::Named(name) => {
                if registry.has(&name)? {
                    let instance = registry.get(&name)?;
                    let class = self.class_of(&instance)?;
                    let m = class.invoke_method().ok_or_else(|| {
                        AutowireError::InvalidArgument(format!(
                            "'{name}' is not callable (missing invoke)"
                        ))
                    })?;
                    let args = self.resolve_arguments(registry, m.signature(), inputs, "")?;
                    return invoke_with(args, |args| m.invoke(Some(&instance), args));
                }
                let Some(callable) = self.catalog.function(&name).cloned() else {
                    return Err(AutowireError::InvalidArgument(format!(
                        "Cannot invoke callback '{name}'"
                    )));
                };
                let args = self.resolve_arguments(registry, callable.signature(), inputs, "")?;
                invoke_with(args, |args| callable.call(args))
            }
            Target::Bound(object, method) => {
                let instance = Value::Object(object);
                let class = self.class_of(&instance)?;
                let m = class.get_method(&method).ok_or_else(|| missing_method(&class, &method))?;
                let args = self.resolve_arguments(registry, m.signature(), inputs, class.name())?;
                invoke_with(args, |args| m.invoke(Some(&instance), args))
            }
        }
    }

    /// Construct an instance of a catalog class, resolving its constructor parameters.
    pub fn construct(&self, registry: &dyn Registry, class: &str, inputs: &Inputs) -> Result<Value> {
        let definition = self
            .catalog
            .concrete(class)
            .cloned()
            .ok_or_else(|| AutowireError::NotFound(class.to_string()))?;
        let _guard = self.session.enter(class)?;
        debug!(class, "construct");
        let Some(constructor) = definition.constructor() else {
            return Err(AutowireError::NotFound(class.to_string()));
        };
        let args = self.resolve_arguments(registry, constructor.signature(), inputs, class)?;
        invoke_with(args, |args| constructor.invoke(None, args))
    }

    /// Tell whether `id` could be constructed right now, without instantiating anything.
    ///
    /// Circular constructions are always reported as errors. Usage errors are reported when
    /// [AutowireConfig::probe_surfaces_usage_errors] is set; other failures answer `false`.
    pub fn can_autowire(&self, registry: &dyn Registry, id: &str, inputs: &Inputs) -> Result<bool> {
        let Some(class) = self.catalog.concrete(id).cloned() else {
            return Ok(false);
        };
        let outcome = self.session.enter(id).and_then(|_guard| match class.constructor() {
            Some(constructor) => self
                .create_arguments(registry, constructor.signature(), inputs, id, Mode::Probe)
                .map(|_| ()),
            None => Ok(()),
        });
        match outcome {
            Ok(()) => Ok(true),
            Err(e @ (AutowireError::CircularDependency(_) | AutowireError::DepthExceeded(_))) => {
                Err(e)
            }
            Err(e @ AutowireError::InvalidArgument(_))
                if self.config.probe_surfaces_usage_errors =>
            {
                Err(e)
            }
            Err(e) => {
                warn!(id, error = %e, "cannot autowire");
                Ok(false)
            }
        }
    }

    /// Find the class for a method target: a class name, or the class of a registry entry.
    pub(crate) fn locate(
        &self,
        registry: &dyn Registry,
        id: &str,
    ) -> Result<(Arc<Class>, Option<Value>)> {
        if let Some(class) = self.catalog.concrete(id) {
            return Ok((class.clone(), None));
        }
        let instance = registry.get(id)?;
        let class = self.class_of(&instance)?;
        Ok((class, Some(instance)))
    }

    pub(crate) fn class_of(&self, instance: &Value) -> Result<Arc<Class>> {
        instance
            .as_object()
            .and_then(|o| self.catalog.class(o.class()))
            .cloned()
            .ok_or_else(|| {
                AutowireError::InvalidArgument(format!(
                    "'{}' is not an instance of a known class",
                    instance.kind()
                ))
            })
    }
}

impl std::fmt::Debug for Autowire {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autowire")
            .field("catalog", &self.catalog)
            .field("config", &self.config)
            .field("constructing", &self.session.chain())
            .finish_non_exhaustive()
    }
}

pub(crate) fn missing_method(class: &Class, method: &str) -> AutowireError {
    AutowireError::InvalidArgument(format!(
        "Cannot invoke callback: '{}::{method}' does not exist",
        class.name()
    ))
}

/// First declared type of `param` that the registry can provide.
fn registered_type<'p>(registry: &dyn Registry, param: &'p Parameter) -> Result<Option<&'p str>> {
    for ty in param.types() {
        if registry.has(ty)? {
            return Ok(Some(ty));
        }
    }
    Ok(None)
}

/// Invoke with resolved arguments, then publish spread by-reference lists back to the caller.
pub(crate) fn invoke_with(
    args: Arguments,
    f: impl FnOnce(&Arguments) -> Result<Value>,
) -> Result<Value> {
    let out = f(&args);
    args.write_back();
    out
}

/// Accumulates arguments in parameter order and carries the deferred error.
pub(crate) struct Collector {
    owner: String,
    args: Arguments,
    deferred: Option<AutowireError>,
}

impl Collector {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            args: Arguments::default(),
            deferred: None,
        }
    }

    /// Raise the deferred error: a later parameter is about to be resolved.
    pub(crate) fn ready(&mut self) -> Result<()> {
        match self.deferred.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn defer(&mut self, argument: String) {
        self.deferred = Some(self.error(argument));
    }

    pub(crate) fn fail(&mut self, argument: String) -> AutowireError {
        self.error(argument)
    }

    fn error(&mut self, argument: String) -> AutowireError {
        AutowireError::DefaultValue {
            id: self.owner.clone(),
            argument,
            previous: self.deferred.take().map(Box::new),
        }
    }

    /// Bind a named input, aliasing the caller's storage for by-reference parameters.
    pub(crate) fn push_input(&mut self, param: &Parameter, input: &Input) -> Result<()> {
        self.ready()?;
        match (param.is_by_reference(), param.is_variadic(), input) {
            (true, true, Input::References(cells)) => {
                for cell in cells {
                    self.args.push(Argument::Reference(cell.clone()));
                }
            }
            (true, true, Input::Reference(list)) => {
                let cells: Vec<ValueCell> = spread(param, list.get())?
                    .into_iter()
                    .map(ValueCell::new)
                    .collect();
                for cell in &cells {
                    self.args.push(Argument::Reference(cell.clone()));
                }
                self.args.link_list(list.clone(), cells);
            }
            (true, true, Input::Value(v)) => {
                for item in spread(param, v.clone())? {
                    self.args.push(Argument::Reference(ValueCell::new(item)));
                }
            }
            (true, false, Input::Reference(cell)) => self.args.push(Argument::Reference(cell.clone())),
            (true, false, input) => self.args.push(Argument::Reference(ValueCell::new(input.value()))),
            (false, true, input) => {
                for item in spread(param, input.value())? {
                    self.args.push(Argument::Value(item));
                }
            }
            (false, false, input) => self.args.push(Argument::Value(input.value())),
        }
        Ok(())
    }

    /// Bind a registry value to a single slot.
    pub(crate) fn push_resolved(&mut self, param: &Parameter, value: Value) -> Result<()> {
        self.ready()?;
        self.args.push(slot(param, value));
        Ok(())
    }

    /// Bind a default or compiled literal; variadic parameters spread it.
    pub(crate) fn push_literal(&mut self, param: &Parameter, value: Value) -> Result<()> {
        self.ready()?;
        if param.is_variadic() {
            for item in spread(param, value)? {
                self.args.push(slot(param, item));
            }
        } else {
            self.args.push(slot(param, value));
        }
        Ok(())
    }

    /// Complete the list. A deferred error with nothing resolved after it is dropped.
    pub(crate) fn finish(self) -> Arguments {
        if let Some(e) = self.deferred {
            trace!(error = %e, "omitting trailing optional parameters");
        }
        self.args
    }
}

/// A fresh cell for by-reference parameters: the caller does not observe writes.
fn slot(param: &Parameter, value: Value) -> Argument {
    if param.is_by_reference() {
        Argument::Reference(ValueCell::new(value))
    } else {
        Argument::Value(value)
    }
}

fn spread(param: &Parameter, value: Value) -> Result<Vec<Value>> {
    let kind = value.kind().to_string();
    value.into_items().ok_or_else(|| {
        AutowireError::InvalidArgument(format!(
            "variadic parameter '{}' expects a list, found {kind}",
            param.name()
        ))
    })
}

//! Invocation plans: resolution decisions taken once, replayed on every invocation.
//!
//! A plan is described by a [PlanSource], a serializable document whose JSON text is the
//! portable form of the plan. On first invocation the source is materialized into one closure
//! per argument plus a target invoker; the materialized form is cached and reused afterwards.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resolve::{invoke_with, Collector};
use crate::{
    Arguments, AutowireError, Callable, Catalog, Inputs, Method, Parameter, Registry, Result, Value,
};

/// Portable description of a compiled invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanSource {
    pub target: TargetSource,
    /// Class named in resolution errors, empty for free functions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    pub arguments: Vec<ArgumentSource>,
}

/// What a plan invokes once its arguments are resolved
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSource {
    Construct { class: String },
    Function { name: String },
    Static { class: String, method: String },
    /// Instance method called on `registry.get(id)`.
    Method { id: String, class: String, method: String },
    /// Invokable instance obtained with `registry.get(id)`.
    Invoke { id: String, class: String },
}

/// Compiled decision for one parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSource {
    pub name: String,
    /// Let a same-named runtime input take precedence over `source`.
    #[serde(default)]
    pub runtime: bool,
    #[serde(default)]
    pub by_reference: bool,
    #[serde(default)]
    pub variadic: bool,
    pub source: Expr,
}

impl ArgumentSource {
    fn parameter(&self) -> Parameter {
        let mut param = Parameter::new(self.name.as_str());
        if self.by_reference {
            param = param.by_reference();
        }
        if self.variadic {
            param = param.variadic();
        }
        param
    }
}

/// Expression computing an argument at invocation time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Literal { value: Value },
    Lookup { id: String },
    /// Registry value if the registry has `id` at invocation time, else `default`.
    LookupOr { id: String, default: Value },
    /// Required parameter without any source.
    Fail { argument: String },
    /// Optional parameter without default: deferred like in direct resolution.
    Absent { argument: String },
}

type Thunk = Box<dyn Fn(&dyn Registry, &Inputs, &mut Collector) -> Result<()> + Send + Sync>;
type Invoker = Box<dyn Fn(&dyn Registry, &Arguments) -> Result<Value> + Send + Sync>;

struct Materialized {
    arguments: Vec<Thunk>,
    target: Invoker,
}

/// Reusable, specialized invocation of one callable shape
pub struct InvocationPlan {
    source: PlanSource,
    catalog: Arc<Catalog>,
    function: Option<Arc<dyn Callable>>,
    materialized: OnceCell<Materialized>,
}

impl InvocationPlan {
    /// Wrap a plan source. Targets are bound against `catalog` when materialized.
    pub fn new(source: PlanSource, catalog: Arc<Catalog>) -> Self {
        Self {
            source,
            catalog,
            function: None,
            materialized: OnceCell::new(),
        }
    }

    /// Plan for an ad-hoc function that may be missing from the catalog.
    pub(crate) fn with_function(mut self, function: Arc<dyn Callable>) -> Self {
        self.function = Some(function);
        self
    }

    /// Rebuild a plan from its stored text.
    pub fn load(text: &str, catalog: Arc<Catalog>) -> Result<Self> {
        let source: PlanSource = serde_json::from_str(text)?;
        Ok(Self::new(source, catalog))
    }

    pub fn plan_source(&self) -> &PlanSource {
        &self.source
    }

    /// Portable text of the plan, suitable for [InvocationPlan::load].
    pub fn source(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.source)?)
    }

    pub fn is_materialized(&self) -> bool {
        self.materialized.get().is_some()
    }

    /// Resolve the arguments against `registry` and `inputs` and invoke the target.
    pub fn invoke(&self, registry: &dyn Registry, inputs: &Inputs) -> Result<Value> {
        let plan = self.materialized.get_or_try_init(|| self.materialize())?;
        let mut collector = Collector::new(self.source.owner.as_str());
        for argument in &plan.arguments {
            argument(registry, inputs, &mut collector)?;
        }
        invoke_with(collector.finish(), |args| (plan.target)(registry, args))
    }

    fn materialize(&self) -> Result<Materialized> {
        debug!(plan = ?self.source.target, "materialize plan");
        Ok(Materialized {
            arguments: self.source.arguments.iter().map(materialize_argument).collect(),
            target: self.materialize_target()?,
        })
    }

    fn materialize_target(&self) -> Result<Invoker> {
        let invoker: Invoker = match &self.source.target {
            TargetSource::Construct { class } => {
                let constructor = self
                    .catalog
                    .concrete(class)
                    .and_then(|c| c.constructor().cloned())
                    .ok_or_else(|| AutowireError::NotFound(class.clone()))?;
                Box::new(move |_: &dyn Registry, args: &Arguments| constructor.invoke(None, args))
            }
            TargetSource::Function { name } => {
                let function = self
                    .function
                    .clone()
                    .or_else(|| self.catalog.function(name).cloned())
                    .ok_or_else(|| AutowireError::NotFound(name.clone()))?;
                Box::new(move |_: &dyn Registry, args: &Arguments| function.call(args))
            }
            TargetSource::Static { class, method } => {
                let method = self.method(class, Some(method.as_str()))?;
                Box::new(move |_: &dyn Registry, args: &Arguments| method.invoke(None, args))
            }
            TargetSource::Method { id, class, method } => {
                let method = self.method(class, Some(method.as_str()))?;
                let id = id.clone();
                Box::new(move |registry: &dyn Registry, args: &Arguments| {
                    let receiver = registry.get(&id)?;
                    method.invoke(Some(&receiver), args)
                })
            }
            TargetSource::Invoke { id, class } => {
                let method = self.method(class, None)?;
                let id = id.clone();
                Box::new(move |registry: &dyn Registry, args: &Arguments| {
                    let receiver = registry.get(&id)?;
                    method.invoke(Some(&receiver), args)
                })
            }
        };
        Ok(invoker)
    }

    /// Named method of `class`, or its invoke method.
    fn method(&self, class: &str, name: Option<&str>) -> Result<Method> {
        let definition = self
            .catalog
            .class(class)
            .ok_or_else(|| AutowireError::NotFound(class.to_string()))?;
        let method = match name {
            Some(name) => definition.get_method(name),
            None => definition.invoke_method(),
        };
        method.cloned().ok_or_else(|| {
            AutowireError::NotFound(format!("{class}::{}", name.unwrap_or("invoke")))
        })
    }
}

fn materialize_argument(argument: &ArgumentSource) -> Thunk {
    let param = argument.parameter();
    let compiled: Thunk = match argument.source.clone() {
        Expr::Literal { value } => {
            Box::new(move |_: &dyn Registry, _: &Inputs, c: &mut Collector| {
                c.push_literal(&param, value.clone())
            })
        }
        Expr::Lookup { id } => Box::new(move |registry: &dyn Registry, _: &Inputs, c: &mut Collector| {
            c.ready()?;
            let value = registry.get(&id)?;
            c.push_resolved(&param, value)
        }),
        Expr::LookupOr { id, default } => {
            Box::new(move |registry: &dyn Registry, _: &Inputs, c: &mut Collector| {
                c.ready()?;
                if registry.has(&id)? {
                    let value = registry.get(&id)?;
                    c.push_resolved(&param, value)
                } else {
                    c.push_literal(&param, default.clone())
                }
            })
        }
        Expr::Fail { argument } => Box::new(move |_: &dyn Registry, _: &Inputs, c: &mut Collector| {
            Err(c.fail(argument.clone()))
        }),
        Expr::Absent { argument } => {
            Box::new(move |_: &dyn Registry, _: &Inputs, c: &mut Collector| {
                c.defer(argument.clone());
                Ok(())
            })
        }
    };
    // By-reference parameters always alias a caller-supplied cell
    if !argument.runtime && !argument.by_reference {
        return compiled;
    }

    let param = argument.parameter();
    Box::new(move |registry: &dyn Registry, inputs: &Inputs, c: &mut Collector| {
        match inputs.get(param.name()) {
            Some(input) => c.push_input(&param, input),
            None => compiled(registry, inputs, c),
        }
    })
}

impl fmt::Debug for InvocationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationPlan")
            .field("source", &self.source)
            .field("materialized", &self.is_materialized())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for InvocationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.source().map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Container, Function};

    fn upper() -> Function {
        Function::new("upper", vec![Parameter::new("name").default("abc")], |args| {
            Ok(args.str(0)?.to_uppercase().into())
        })
    }

    #[test]
    fn plan_text_round_trips_through_catalog() {
        let catalog = Arc::new(Catalog::new().with_function(upper()));
        let source = PlanSource {
            target: TargetSource::Function {
                name: "upper".into(),
            },
            owner: String::new(),
            arguments: vec![ArgumentSource {
                name: "name".into(),
                runtime: true,
                by_reference: false,
                variadic: false,
                source: Expr::Literal {
                    value: "abc".into(),
                },
            }],
        };
        let text = InvocationPlan::new(source.clone(), catalog.clone())
            .source()
            .unwrap();
        let plan = InvocationPlan::load(&text, catalog).unwrap();
        assert_eq!(plan.plan_source(), &source);

        let container = Container::new(Catalog::new());
        assert!(!plan.is_materialized());
        assert_eq!(
            plan.invoke(&container, &Inputs::new()).unwrap(),
            Value::from("ABC")
        );
        assert!(plan.is_materialized());
        assert_eq!(
            plan.invoke(&container, &Inputs::new().with("name", "cba"))
                .unwrap(),
            Value::from("CBA")
        );
    }

    #[test]
    fn unknown_function_fails_on_materialization() {
        let source = PlanSource {
            target: TargetSource::Function {
                name: "missing".into(),
            },
            owner: String::new(),
            arguments: vec![],
        };
        let plan = InvocationPlan::new(source, Arc::new(Catalog::new()));
        let container = Container::new(Catalog::new());
        assert!(matches!(
            plan.invoke(&container, &Inputs::new()),
            Err(AutowireError::NotFound(name)) if name == "missing"
        ));
        assert!(!plan.is_materialized());
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert!(matches!(
            InvocationPlan::load("{\"target\": 3}", Arc::new(Catalog::new())),
            Err(AutowireError::MalformedPlan(_))
        ));
    }
}

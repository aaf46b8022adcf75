//! Plan generation: the resolution rules applied once, at compile time.
//!
//! Overrides and declared defaults become literals, registry-resolvable types become lookups
//! deferred to invocation time, and parameters with no source become deferred or immediate
//! failures. With runtime inputs enabled, a same-named input still wins at invocation time.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::plan::{ArgumentSource, Expr, PlanSource, TargetSource};
use crate::resolve::missing_method;
use crate::{
    Autowire, AutowireError, Callable, InvocationPlan, Overrides, Parameter, Registry, Result,
    Signature, Target, Value,
};

impl Autowire {
    /// Compile a target into a reusable plan.
    ///
    /// Already instantiated objects cannot be compiled.
    pub fn compile(
        &self,
        registry: &dyn Registry,
        target: impl Into<Target>,
        overrides: &Overrides,
        runtime_inputs: bool,
    ) -> Result<InvocationPlan> {
        let target = target.into();
        let mut function: Option<Arc<dyn Callable>> = None;
        let (target_source, signature, owner) = match target {
            Target::Bound(object, method) => {
                return Err(AutowireError::InvalidArgument(format!(
                    "Cannot compile instantiated object: {}->{method}()",
                    object.class()
                )));
            }
            Target::Callable(callable) => {
                let signature = callable.signature().clone();
                let name = signature.name().to_string();
                function = Some(callable);
                (TargetSource::Function { name }, signature, String::new())
            }
            Target::Method(id, method) => {
                let (class, _) = self.locate(registry, &id)?;
                let m = class.get_method(&method).ok_or_else(|| missing_method(&class, &method))?;
                let class_name = class.name().to_string();
                let source = if m.is_static() {
                    TargetSource::Static {
                        class: class_name.clone(),
                        method,
                    }
                } else {
                    TargetSource::Method {
                        id,
                        class: class_name.clone(),
                        method,
                    }
                };
                (source, m.signature().clone(), class_name)
            }
            Target::Named(name) => {
                if registry.has(&name)? {
                    let class = match self.catalog().concrete(&name) {
                        Some(class) => class.clone(),
                        None => self.class_of(&registry.get(&name)?)?,
                    };
                    let m = class.invoke_method().ok_or_else(|| {
                        AutowireError::InvalidArgument(format!(
                            "'{name}' is not callable (missing invoke)"
                        ))
                    })?;
                    let source = TargetSource::Invoke {
                        id: name,
                        class: class.name().to_string(),
                    };
                    (source, m.signature().clone(), String::new())
                } else if let Some(callable) = self.catalog().function(&name) {
                    let signature = callable.signature().clone();
                    (TargetSource::Function { name }, signature, String::new())
                } else {
                    return Err(AutowireError::InvalidArgument(format!(
                        "Cannot compile callback '{name}'"
                    )));
                }
            }
        };

        let arguments = self.compile_arguments(registry, &signature, overrides, runtime_inputs)?;
        debug!(plan = ?target_source, arguments = arguments.len(), "compiled");
        let source = PlanSource {
            target: target_source,
            owner,
            arguments,
        };
        let plan = InvocationPlan::new(source, self.catalog().clone());
        Ok(match function {
            Some(function) => plan.with_function(function),
            None => plan,
        })
    }

    /// Compile the construction of a catalog class into a reusable plan.
    pub fn compile_construct(
        &self,
        registry: &dyn Registry,
        class: &str,
        overrides: &Overrides,
        runtime_inputs: bool,
    ) -> Result<InvocationPlan> {
        let constructor = self
            .catalog()
            .concrete(class)
            .and_then(|c| c.constructor())
            .ok_or_else(|| AutowireError::NotFound(class.to_string()))?;
        let arguments =
            self.compile_arguments(registry, constructor.signature(), overrides, runtime_inputs)?;
        debug!(class, arguments = arguments.len(), "compiled construction");
        let source = PlanSource {
            target: TargetSource::Construct {
                class: class.to_string(),
            },
            owner: class.to_string(),
            arguments,
        };
        Ok(InvocationPlan::new(source, self.catalog().clone()))
    }

    /// Decide the source of every parameter of `signature`.
    pub fn compile_arguments(
        &self,
        registry: &dyn Registry,
        signature: &Signature,
        overrides: &Overrides,
        runtime_inputs: bool,
    ) -> Result<Vec<ArgumentSource>> {
        signature
            .parameters()
            .iter()
            .map(|param| {
                let source = self.compile_parameter(registry, signature, param, overrides)?;
                trace!(callable = signature.name(), parameter = param.name(), ?source, "compiled");
                Ok(ArgumentSource {
                    name: param.name().to_string(),
                    runtime: runtime_inputs,
                    by_reference: param.is_by_reference(),
                    variadic: param.is_variadic(),
                    source,
                })
            })
            .collect()
    }

    fn compile_parameter(
        &self,
        registry: &dyn Registry,
        signature: &Signature,
        param: &Parameter,
        overrides: &Overrides,
    ) -> Result<Expr> {
        if let Some(value) = overrides.get(param.name()) {
            return Ok(Expr::Literal {
                value: embed(param, value)?,
            });
        }

        let mut lookup = None;
        for ty in param.types() {
            if registry.has(ty)? {
                self.track_reference(ty);
                lookup = Some(ty);
                break;
            }
        }
        let lookup = lookup.or_else(|| {
            param
                .types()
                .iter()
                .find(|ty| self.catalog().is_interface(ty))
        });
        if let Some(id) = lookup {
            return Ok(match param.default_value() {
                Some(default) => Expr::LookupOr {
                    id: id.clone(),
                    default: embed(param, default)?,
                },
                None => Expr::Lookup { id: id.clone() },
            });
        }

        if let Some(default) = param.default_value() {
            return Ok(Expr::Literal {
                value: embed(param, default)?,
            });
        }

        let argument = signature.describe(param);
        Ok(if param.is_optional() {
            Expr::Absent { argument }
        } else {
            Expr::Fail { argument }
        })
    }
}

/// Only literals can be written into plan text.
fn embed(param: &Parameter, value: &Value) -> Result<Value> {
    if value.is_literal() {
        Ok(value.clone())
    } else {
        Err(AutowireError::InvalidArgument(format!(
            "cannot embed a '{}' value for parameter '{}' in a plan",
            value.kind(),
            param.name()
        )))
    }
}

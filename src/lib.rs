//! Runtime autowiring: fill the parameters of callables and constructors from named inputs,
//! a service registry and declared defaults.
//!
//! # Simple use case
//!
//! ```
//! # use autowire::*;
//! # fn main() -> Result<(), AutowireError> {
//! // Describe the classes the engine may construct
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! let catalog = Catalog::new().with_class(
//!     Class::new(
//!         "Greeter",
//!         vec![Parameter::new("greeting").default("Hello")],
//!         |args: &Arguments| Ok(Greeter { greeting: args.str(0)? }),
//!     )
//!     .method("greet", vec![Parameter::new("name")], |g: &Greeter, args: &Arguments| {
//!         Ok(format!("{} {}", g.greeting, args.str(0)?).into())
//!     }),
//! );
//!
//! // Resolve a method: the receiver is autowired, `name` comes from the inputs
//! let container = Container::new(catalog);
//! let out = container.call(("Greeter", "greet"), &Inputs::new().with("name", "world"))?;
//! assert_eq!(out, Value::from("Hello world"));
//!
//! // Compile the same call once, then replay it
//! let plan = container.compile(("Greeter", "greet"), &Overrides::new(), true)?;
//! let out = plan.invoke(&container, &Inputs::new().with("name", "plan"))?;
//! assert_eq!(out, Value::from("Hello plan"));
//! # Ok(())
//! # }
//! ```
//!
//! # Mechanism
//!
//! Every parameter is filled by the first applicable rule: a named input, then the first declared
//! type known to the [Registry], then the declared default. Optional parameters without any source
//! are deferred: the error surfaces only if a later parameter still needs a value.
//!
//! * The [Catalog] describes classes, interfaces and named functions with their [Signature]s.
//! * The [Registry] trait maps ids to values. [Container] is the default implementation,
//!   caching every resolved id and autowiring catalog classes without definition.
//! * The [Autowire] engine performs direct resolution and tracks the construction chain to report
//!   circular dependencies.
//! * [InvocationPlan]s take the resolution decisions once and replay them. Their JSON text can be
//!   stored and loaded again against the same catalog.

mod callable;
mod catalog;
mod compile;
mod config;
mod container;
mod descriptor;
mod error;
mod plan;
mod resolve;
mod session;
mod value;

pub use callable::{Argument, Arguments, Callable, Function, Input, Inputs, Overrides, Target};
pub use catalog::{Catalog, Class, Method};
pub use config::AutowireConfig;
pub use container::{Container, Definition, RegistryHandle};
pub use descriptor::{Parameter, Signature};
pub use error::{AutowireError, Result};
pub use plan::{ArgumentSource, Expr, InvocationPlan, PlanSource, TargetSource};
pub use resolve::{Autowire, ReferenceTracker, Registry};
pub use value::{Object, Value, ValueCell};

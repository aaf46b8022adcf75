use thiserror::Error;

/// Errors triggered during the autowiring process
#[derive(Error, Debug)]
pub enum AutowireError {
    /// The id has no definition and does not name a constructible class.
    #[error("'{0}' not found")]
    NotFound(String),

    /// A parameter could not be filled by a named input, the registry or a default value.
    ///
    /// An error deferred on an earlier optional parameter is kept as the source.
    #[error("[{id}] Argument: {argument} has no default value while resolving")]
    DefaultValue {
        id: String,
        argument: String,
        #[source]
        previous: Option<Box<AutowireError>>,
    },

    /// A construction chain came back to an id that is still being constructed.
    ///
    /// The chain lists the ids in entry order, ending with the repeated id.
    #[error("Circular dependency: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    #[error("Cannot resolve '{id}'. Invalid definition: '{definition}'")]
    InvalidDefinition { id: String, definition: String },

    /// The caller handed over something that cannot be invoked or compiled.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Construction depth limit of {0} exceeded")]
    DepthExceeded(usize),

    #[error("Malformed invocation plan: {0}")]
    MalformedPlan(#[from] serde_json::Error),

    /// Error raised by the body of an invoked callable.
    #[error(transparent)]
    Callee(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = AutowireError> = std::result::Result<T, E>;

impl AutowireError {
    /// Wrap an error raised by user code inside a callable.
    pub fn callee(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        AutowireError::Callee(error.into())
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, AutowireError::CircularDependency(_))
    }

    /// Walk the chain of deferred errors, starting with this one.
    pub fn chain(&self) -> impl Iterator<Item = &AutowireError> {
        std::iter::successors(Some(self), |e| match e {
            AutowireError::DefaultValue {
                previous: Some(p), ..
            } => Some(p.as_ref()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_value_message_and_chain() {
        let first = AutowireError::DefaultValue {
            id: String::new(),
            argument: "f(a)".into(),
            previous: None,
        };
        let second = AutowireError::DefaultValue {
            id: "Service".into(),
            argument: "f(string b)".into(),
            previous: Some(Box::new(first)),
        };
        assert_eq!(
            second.to_string(),
            "[Service] Argument: f(string b) has no default value while resolving"
        );
        let args: Vec<String> = second
            .chain()
            .map(|e| match e {
                AutowireError::DefaultValue { argument, .. } => argument.clone(),
                other => other.to_string(),
            })
            .collect();
        assert_eq!(args, vec!["f(string b)", "f(a)"]);
        assert!(std::error::Error::source(&second).is_some());
    }

    #[test]
    fn circular_message_lists_chain() {
        let e = AutowireError::CircularDependency(vec!["A".into(), "B".into(), "A".into()]);
        assert_eq!(e.to_string(), "Circular dependency: A -> B -> A");
        assert!(e.is_circular());
    }
}

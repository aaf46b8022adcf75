//! Parameter descriptors: the normalized view of a callable's parameters.

use crate::Value;

/// Description of one callable parameter
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    name: String,
    types: Vec<String>,
    optional: bool,
    variadic: bool,
    by_reference: bool,
    default: Option<Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            optional: false,
            variadic: false,
            by_reference: false,
            default: None,
        }
    }

    /// Add an accepted type. Union alternatives are tried in the order they are added.
    pub fn typed(mut self, ty: impl Into<String>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Declare a default value. A parameter with a default is optional.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self
    }

    /// Mark the parameter optional without giving it a default value (a nullable type).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Collect all trailing arguments. Variadic parameters are optional.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self.optional = true;
        self
    }

    pub fn by_reference(mut self) -> Self {
        self.by_reference = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn is_by_reference(&self) -> bool {
        self.by_reference
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Name and ordered parameters of a callable
#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    name: String,
    parameters: Vec<Parameter>,
}

impl Signature {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Human readable form of a parameter, e.g. `Service::new(Logger|Writer out)`.
    pub fn describe(&self, parameter: &Parameter) -> String {
        let types = parameter.types.join("|");
        let prefix = if parameter.by_reference { "&" } else { "" };
        let dots = if parameter.variadic { "..." } else { "" };
        if types.is_empty() {
            format!("{}({prefix}{dots}{})", self.name, parameter.name)
        } else {
            format!("{}({types} {prefix}{dots}{})", self.name, parameter.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_flags() {
        let p = Parameter::new("args").variadic().by_reference();
        assert!(p.is_optional() && p.is_variadic() && p.is_by_reference());
        assert!(p.default_value().is_none());

        let p = Parameter::new("name").default("abc");
        assert!(p.is_optional());
        assert_eq!(p.default_value(), Some(&Value::from("abc")));
    }

    #[test]
    fn describe_parameters() {
        let sig = Signature::new(
            "Service::new",
            vec![
                Parameter::new("out").typed("Logger").typed("Writer"),
                Parameter::new("rest").variadic().by_reference(),
            ],
        );
        assert_eq!(
            sig.describe(&sig.parameters()[0]),
            "Service::new(Logger|Writer out)"
        );
        assert_eq!(sig.describe(&sig.parameters()[1]), "Service::new(&...rest)");
    }
}

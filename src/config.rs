use serde::Deserialize;

/// Tuning knobs of an [Autowire](crate::Autowire) engine
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutowireConfig {
    /// Maximum number of ids simultaneously under construction.
    pub max_depth: usize,
    /// Let `can_autowire` report usage errors instead of answering `false`.
    pub probe_surfaces_usage_errors: bool,
}

impl Default for AutowireConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            probe_surfaces_usage_errors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: AutowireConfig = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.probe_surfaces_usage_errors);
    }
}

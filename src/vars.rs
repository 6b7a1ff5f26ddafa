//! Variable scope handed to role resolution
//!
//! Holds the variable state current at the moment a role include is
//! resolved. Full precedence and template rendering belong to the variable
//! engine that embeds this crate; this context only stores values and
//! applies later-write-wins layering when scopes are combined.

use serde_yaml::Value;
use std::collections::HashMap;

/// Variable storage for role resolution
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    variables: HashMap<String, Value>,
}

impl VariableContext {
    /// Create a new empty variable context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded from an existing map
    pub fn from_map(variables: HashMap<String, Value>) -> Self {
        Self { variables }
    }

    /// Set a variable value
    pub fn set(&mut self, key: String, value: Value) {
        self.variables.insert(key, value);
    }

    /// Get a variable value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Check if a variable exists
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Overlay another map on top of this context, later write wins
    pub fn layer(&mut self, overlay: &HashMap<String, Value>) {
        for (key, value) in overlay {
            self.variables.insert(key.clone(), value.clone());
        }
    }

    /// Number of stored variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the context holds no variables
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut ctx = VariableContext::new();
        ctx.set("name".to_string(), Value::String("alice".to_string()));
        ctx.set("age".to_string(), Value::Number(30.into()));

        assert_eq!(ctx.get("name"), Some(&Value::String("alice".to_string())));
        assert_eq!(ctx.get("age"), Some(&Value::Number(30.into())));
        assert_eq!(ctx.get("missing"), None);
        assert!(ctx.contains("name"));
        assert!(!ctx.contains("missing"));
    }

    #[test]
    fn test_layer_later_write_wins() {
        let mut ctx = VariableContext::new();
        ctx.set("port".to_string(), Value::Number(80.into()));
        ctx.set("user".to_string(), Value::String("deploy".to_string()));

        let mut overlay = HashMap::new();
        overlay.insert("port".to_string(), Value::Number(8080.into()));
        overlay.insert("debug".to_string(), Value::Bool(true));
        ctx.layer(&overlay);

        assert_eq!(ctx.get("port"), Some(&Value::Number(8080.into())));
        assert_eq!(ctx.get("user"), Some(&Value::String("deploy".to_string())));
        assert_eq!(ctx.get("debug"), Some(&Value::Bool(true)));
        assert_eq!(ctx.len(), 3);
    }
}

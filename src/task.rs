//! Generic task abstraction
//!
//! A task is one executable step inside a play or role. The compilation
//! layer only cares about the fields that affect resolution and scoping
//! (vars, loop, notify); the module action and any other keys stay in
//! `args` untouched and are interpreted by the executor.

use crate::error::{PlaybookError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

fn default_loop_var() -> String {
    "item".to_string()
}

/// A single executable step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Optional human-readable name for logs and reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Conditional expression gating execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,

    /// Variables declared at the task site
    #[serde(default)]
    pub vars: HashMap<String, Value>,

    /// Items to iterate over, one task copy per item
    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_items: Option<Vec<Value>>,

    /// Name the current loop item is bound to
    #[serde(default = "default_loop_var")]
    pub loop_var: String,

    /// Handlers to notify when this task reports a change
    #[serde(default)]
    pub notify: Vec<String>,

    /// Module action and any other keys, passed through untouched
    #[serde(flatten)]
    pub args: Mapping,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            name: None,
            when: None,
            vars: HashMap::new(),
            loop_items: None,
            loop_var: default_loop_var(),
            notify: Vec::new(),
            args: Mapping::new(),
        }
    }
}

impl Task {
    /// Build a task from a raw option map
    pub fn from_entry(entry: &Mapping) -> Result<Task> {
        serde_yaml::from_value(Value::Mapping(entry.clone()))
            .map_err(|e| PlaybookError::Parse(format!("invalid task entry: {}", e)))
    }

    /// Variables an include at this site passes down to included content
    ///
    /// Loop bindings count too: when the compiler clones a task per loop
    /// iteration it writes the bound item into `vars` under `loop_var`, so
    /// the binding is already part of the returned map.
    pub fn include_params(&self) -> HashMap<String, Value> {
        self.vars.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: Vec<(&str, Value)>) -> Mapping {
        let mut map = Mapping::new();
        for (key, value) in pairs {
            map.insert(Value::String(key.to_string()), value);
        }
        map
    }

    #[test]
    fn test_from_entry_generic_fields() {
        let entry = mapping(vec![
            ("name", Value::String("install nginx".to_string())),
            ("when", Value::String("use_nginx".to_string())),
            (
                "package",
                Value::Mapping(mapping(vec![(
                    "name",
                    Value::String("nginx".to_string()),
                )])),
            ),
        ]);

        let task = Task::from_entry(&entry).unwrap();
        assert_eq!(task.name.as_deref(), Some("install nginx"));
        assert_eq!(task.when.as_deref(), Some("use_nginx"));
        assert_eq!(task.loop_var, "item");
        assert!(task.vars.is_empty());
        // Unrecognized keys stay in args for the executor.
        assert!(task
            .args
            .contains_key(Value::String("package".to_string())));
    }

    #[test]
    fn test_include_params_are_task_vars() {
        let mut task = Task::default();
        task.vars
            .insert("port".to_string(), Value::Number(8080.into()));
        task.vars
            .insert("item".to_string(), Value::String("web1".to_string()));

        let params = task.include_params();
        assert_eq!(params.get("port"), Some(&Value::Number(8080.into())));
        assert_eq!(
            params.get("item"),
            Some(&Value::String("web1".to_string()))
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_from_entry_loop_fields() {
        let entry = mapping(vec![
            (
                "loop",
                Value::Sequence(vec![
                    Value::String("a".to_string()),
                    Value::String("b".to_string()),
                ]),
            ),
            ("loop_var", Value::String("pkg".to_string())),
        ]);

        let task = Task::from_entry(&entry).unwrap();
        assert_eq!(task.loop_items.as_ref().map(|i| i.len()), Some(2));
        assert_eq!(task.loop_var, "pkg");
    }
}

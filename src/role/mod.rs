//! Resolved role instances and their compilation into blocks

pub mod locator;

use crate::block::{parse_entry, Block, Parent, Step};
use crate::error::Result;
use crate::play::Play;
use crate::task::Task;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resolved, parameterized role ready for compilation
///
/// Built by the locator, owned by the include directive during expansion,
/// and discarded once its blocks are produced. Acyclicity of the role
/// graph is the locator's job; an instance only carries its own
/// parent-role link for parameter inheritance.
#[derive(Debug)]
pub struct RoleInstance {
    role_name: String,
    source: PathBuf,
    defaults: HashMap<String, Value>,
    role_vars: HashMap<String, Value>,
    include_vars: HashMap<String, Value>,
    parent_role: Option<Arc<RoleInstance>>,
    task_defs: Vec<Mapping>,
    handler_defs: Vec<Task>,
}

impl RoleInstance {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        role_name: String,
        source: PathBuf,
        defaults: HashMap<String, Value>,
        role_vars: HashMap<String, Value>,
        include_vars: HashMap<String, Value>,
        parent_role: Option<Arc<RoleInstance>>,
        task_defs: Vec<Mapping>,
        handler_defs: Vec<Task>,
    ) -> RoleInstance {
        RoleInstance {
            role_name,
            source,
            defaults,
            role_vars,
            include_vars,
            parent_role,
            task_defs,
            handler_defs,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(name: &str, role_vars: HashMap<String, Value>) -> RoleInstance {
        RoleInstance::new(
            name.to_string(),
            PathBuf::new(),
            HashMap::new(),
            role_vars,
            HashMap::new(),
            None,
            Vec::new(),
            Vec::new(),
        )
    }

    /// Name of the resolved role
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Directory the role definition was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Role this instance inherits parameters from, if nested
    pub fn parent_role(&self) -> Option<&Arc<RoleInstance>> {
        self.parent_role.as_ref()
    }

    /// Resolved parameters: defaults, then role vars, then include-site
    /// vars, later layer wins
    pub fn params(&self) -> HashMap<String, Value> {
        let mut params = self.defaults.clone();
        for (key, value) in &self.role_vars {
            params.insert(key.clone(), value.clone());
        }
        for (key, value) in &self.include_vars {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    /// Expand the role's task definitions into an ordered block sequence
    ///
    /// Each top-level entry of the tasks file becomes one block; plain
    /// tasks get a wrapping block of their own. Nested `include_role`
    /// entries become directives whose parent role is this instance.
    /// Re-runs parse the definitions fresh, so repeated compilation never
    /// shares blocks.
    pub fn compile(self: &Arc<Self>, play: &Arc<Play>) -> Result<Vec<Arc<Block>>> {
        let mut blocks = Vec::with_capacity(self.task_defs.len());
        for entry in &self.task_defs {
            let step = parse_entry(entry, Some(self))?;
            let block = match step {
                Step::Block(block) => block,
                step => Block::new(vec![step], Vec::new()),
            };
            block.set_parent(Some(Parent::play(play)));
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Handler blocks declared by this role, in declaration order
    pub fn handler_blocks(&self, play: &Arc<Play>) -> Vec<Arc<Block>> {
        self.handler_defs
            .iter()
            .map(|handler| {
                let block = Block::new(vec![Step::Task(handler.clone())], Vec::new());
                block.set_parent(Some(Parent::play(play)));
                block
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: Vec<(&str, Value)>) -> Mapping {
        let mut map = Mapping::new();
        for (key, value) in pairs {
            map.insert(Value::String(key.to_string()), value);
        }
        map
    }

    fn instance_with_tasks(task_defs: Vec<Mapping>) -> Arc<RoleInstance> {
        Arc::new(RoleInstance::new(
            "web".to_string(),
            PathBuf::from("/roles/web"),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            task_defs,
            vec![Task::default()],
        ))
    }

    #[test]
    fn test_params_layering() {
        let mut defaults = HashMap::new();
        defaults.insert("port".to_string(), Value::Number(80.into()));
        defaults.insert("root".to_string(), Value::String("/srv".to_string()));
        let mut role_vars = HashMap::new();
        role_vars.insert("port".to_string(), Value::Number(8080.into()));
        let mut include_vars = HashMap::new();
        include_vars.insert("port".to_string(), Value::Number(9090.into()));

        let role = RoleInstance::new(
            "web".to_string(),
            PathBuf::new(),
            defaults,
            role_vars,
            include_vars,
            None,
            Vec::new(),
            Vec::new(),
        );

        let params = role.params();
        assert_eq!(params.get("port"), Some(&Value::Number(9090.into())));
        assert_eq!(params.get("root"), Some(&Value::String("/srv".to_string())));
    }

    #[test]
    fn test_compile_one_block_per_entry() {
        let role = instance_with_tasks(vec![
            entry(vec![("name", Value::String("first".to_string()))]),
            entry(vec![(
                "block",
                Value::Sequence(vec![Value::Mapping(entry(vec![(
                    "name",
                    Value::String("nested".to_string()),
                )]))]),
            )]),
        ]);
        let play = Play::new("test", ".");

        let blocks = role.compile(&play).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].task_count(), 1);
        assert_eq!(blocks[1].task_count(), 1);
    }

    #[test]
    fn test_compile_is_not_cached() {
        let role =
            instance_with_tasks(vec![entry(vec![("name", Value::String("t".to_string()))])]);
        let play = Play::new("test", ".");

        let first = role.compile(&play).unwrap();
        let second = role.compile(&play).unwrap();
        assert!(!Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn test_handler_blocks_in_order() {
        let mut restart = Task::default();
        restart.name = Some("restart".to_string());
        let mut reload = Task::default();
        reload.name = Some("reload".to_string());

        let role = Arc::new(RoleInstance::new(
            "web".to_string(),
            PathBuf::new(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            None,
            Vec::new(),
            vec![restart, reload],
        ));
        let play = Play::new("test", ".");

        let handlers = role.handler_blocks(&play);
        assert_eq!(handlers.len(), 2);
        match &handlers[0].steps()[0] {
            Step::Task(task) => assert_eq!(task.name.as_deref(), Some("restart")),
            other => panic!("expected task step, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_include_gets_parent_role() {
        let role = instance_with_tasks(vec![entry(vec![(
            "include_role",
            Value::Mapping(entry(vec![(
                "name",
                Value::String("common".to_string()),
            )])),
        )])]);
        let play = Play::new("test", ".");

        let blocks = role.compile(&play).unwrap();
        match &blocks[0].steps()[0] {
            Step::IncludeRole(directive) => {
                assert!(Arc::ptr_eq(directive.parent_role().unwrap(), &role));
            }
            other => panic!("expected include step, got {:?}", other),
        }
    }
}

//! Role-include directive
//!
//! An `include_role` entry in a task list resolves a named role and
//! expands it into blocks, either at compile time (static) or when the
//! executor reaches it (dynamic). The directive embeds a generic task for
//! the shared fields (when, vars, loop) and adds the include-specific
//! options on top.
//!
//! **YAML Format:**
//! ```yaml
//! - name: set up the web tier
//!   include_role:
//!     name: webserver
//!     tasks_from: install.yml
//!     static: false
//!   vars:
//!     port: 8080
//! ```

use crate::block::{Block, Parent};
use crate::error::{PlaybookError, Result};
use crate::play::Play;
use crate::role::locator::{self, RoleLoader};
use crate::role::RoleInstance;
use crate::task::Task;
use crate::vars::VariableContext;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Role file categories that accept a `<category>_from` override
const FROM_CATEGORIES: [&str; 3] = ["tasks", "vars", "defaults"];

/// A single include-role instruction
#[derive(Debug)]
pub struct IncludeRole {
    task: Task,
    role_name: String,
    // Flipped by the static/dynamic decision pass, not by the directive.
    statically_loaded: AtomicBool,
    from_files: HashMap<String, String>,
    static_flag: Option<bool>,
    private_flag: Option<bool>,
    parent_role: Option<Arc<RoleInstance>>,
    parent: RwLock<Option<Parent>>,
}

impl IncludeRole {
    /// Build a validated directive from a raw option map
    ///
    /// Only the fixed include options are consumed here; everything else
    /// belongs to the embedded generic task and is never promoted onto
    /// directive fields.
    pub fn load(
        options: &Mapping,
        task: Task,
        parent: Option<Parent>,
        parent_role: Option<Arc<RoleInstance>>,
    ) -> Result<IncludeRole> {
        let role_name = match options.get(Value::String("name".to_string())) {
            Some(Value::String(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(PlaybookError::Parse(
                    "name is a required field".to_string(),
                ))
            }
        };

        let mut from_files = HashMap::new();
        for category in FROM_CATEGORIES {
            let from_key = format!("{}_from", category);
            if let Some(Value::String(path)) = options.get(Value::String(from_key)) {
                // Keep only the final path segment so overrides cannot
                // escape the role's own directory.
                if let Some(basename) =
                    Path::new(path).file_name().and_then(|n| n.to_str())
                {
                    from_files.insert(category.to_string(), basename.to_string());
                }
            }
        }

        let static_flag = match options.get(Value::String("static".to_string())) {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        };
        let private_flag = match options.get(Value::String("private".to_string())) {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        };

        Ok(IncludeRole {
            task,
            role_name,
            statically_loaded: AtomicBool::new(false),
            from_files,
            static_flag,
            private_flag,
            parent_role,
            parent: RwLock::new(parent),
        })
    }

    /// Name of the role to include
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Embedded generic task
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Mutable access to the embedded task, used for loop bindings
    pub fn task_mut(&mut self) -> &mut Task {
        &mut self.task
    }

    /// Role file overrides, category to basename
    pub fn from_files(&self) -> &HashMap<String, String> {
        &self.from_files
    }

    /// Explicit `static` option, `None` when the engine default applies
    pub fn static_flag(&self) -> Option<bool> {
        self.static_flag
    }

    /// Explicit `private` option, `None` when the engine default applies
    pub fn private_flag(&self) -> Option<bool> {
        self.private_flag
    }

    /// Resolve the private flag against the engine default
    ///
    /// What visibility `private` restricts is decided by the variable
    /// engine; this layer only records the requested value.
    pub fn is_private(&self, engine_default: bool) -> bool {
        self.private_flag.unwrap_or(engine_default)
    }

    /// Whether the decision pass expanded this directive at compile time
    pub fn statically_loaded(&self) -> bool {
        self.statically_loaded.load(Ordering::Relaxed)
    }

    /// Record the static/dynamic decision
    pub fn set_statically_loaded(&self, value: bool) {
        self.statically_loaded.store(value, Ordering::Relaxed);
    }

    /// Enclosing role instance, if this include sits inside a role
    pub fn parent_role(&self) -> Option<&Arc<RoleInstance>> {
        self.parent_role.as_ref()
    }

    /// Current lexical parent link
    pub fn parent(&self) -> Option<Parent> {
        self.parent.read().unwrap().clone()
    }

    /// Rewrite the lexical parent link
    pub fn set_parent(&self, parent: Option<Parent>) {
        *self.parent.write().unwrap() = parent;
    }

    /// Resolve the role and expand it into ordered blocks
    ///
    /// The play may be passed explicitly (the compiler does); a dynamic
    /// include at any nesting depth instead walks its parent chain up to
    /// the play so handlers land in the right place. Expansion is never
    /// cached: every call re-resolves against the variable state it is
    /// given, which is what lets dynamic includes observe execution-time
    /// values.
    pub fn get_block_list(
        self: &Arc<Self>,
        play: Option<&Arc<Play>>,
        variables: &VariableContext,
        loader: &dyn RoleLoader,
    ) -> Result<Vec<Arc<Block>>> {
        let myplay = match play {
            Some(play) => Arc::clone(play),
            None => self
                .parent()
                .and_then(|parent| parent.find_play())
                .ok_or_else(|| {
                    PlaybookError::Scope(format!(
                        "no play reachable for include of role '{}'",
                        self.role_name
                    ))
                })?,
        };

        let mut reference =
            locator::resolve_role(&self.role_name, &myplay, variables, loader)?;
        // Include-site vars ride along on the resolution request.
        for (key, value) in &self.task.vars {
            reference.vars.insert(key.clone(), value.clone());
        }

        let role = locator::load_role_instance(
            reference,
            &myplay,
            self.parent_role.clone(),
            &self.from_files,
            loader,
        )?;

        let blocks = role.compile(&myplay)?;

        // Graft the expansion under this directive so traversal and scope
        // lookup cross the include boundary.
        for block in &blocks {
            block.set_parent(Some(Parent::include(self)));
        }

        // Handler registration is the only shared mutation and runs last:
        // a failure in any earlier step leaves the play untouched.
        myplay.append_handlers(role.handler_blocks(&myplay));

        debug!(
            role = %self.role_name,
            blocks = blocks.len(),
            "expanded role include"
        );
        Ok(blocks)
    }

    /// Independent clone for tree duplication
    ///
    /// The override map is duplicated so mutating the clone never affects
    /// the original; the parent-role link stays shared because cloning
    /// never re-resolves the parent.
    pub fn copy(&self) -> IncludeRole {
        IncludeRole {
            task: self.task.clone(),
            role_name: self.role_name.clone(),
            statically_loaded: AtomicBool::new(self.statically_loaded()),
            from_files: self.from_files.clone(),
            static_flag: self.static_flag,
            private_flag: self.private_flag,
            parent_role: self.parent_role.clone(),
            parent: RwLock::new(self.parent()),
        }
    }

    /// Variables visible to the included role's tasks
    ///
    /// Starts from the generic include parameters and overlays the parent
    /// role's declared parameters on top, so on key collisions the parent
    /// role wins.
    pub fn get_include_params(&self) -> HashMap<String, Value> {
        let mut params = self.task.include_params();
        if let Some(parent_role) = &self.parent_role {
            for (key, value) in parent_role.params() {
                params.insert(key, value);
            }
        }
        params
    }
}

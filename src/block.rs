//! Block tree for compiled play content
//!
//! A block is an ordered container of steps: plain tasks, nested blocks,
//! or role-include directives awaiting expansion. Parent links point
//! upward only and are rewritable, so expanding an include can graft its
//! blocks into the tree without deep copies.

use crate::error::{PlaybookError, Result};
use crate::include_role::IncludeRole;
use crate::role::RoleInstance;
use crate::task::Task;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

/// Upward link from a node to its lexical parent
///
/// Play and block parents are weak: the tree owns its children, never the
/// other way around. The include variant is strong because an expanded
/// directive is removed from the tree yet must stay reachable — scope
/// lookups from its blocks cross the include boundary through this link.
#[derive(Clone)]
pub enum Parent {
    Play(Weak<crate::play::Play>),
    Block(Weak<Block>),
    Include(Arc<IncludeRole>),
}

impl Parent {
    /// Link to a play
    pub fn play(play: &Arc<crate::play::Play>) -> Parent {
        Parent::Play(Arc::downgrade(play))
    }

    /// Link to a containing block
    pub fn block(block: &Arc<Block>) -> Parent {
        Parent::Block(Arc::downgrade(block))
    }

    /// Link to the include directive that produced this node
    pub fn include(directive: &Arc<IncludeRole>) -> Parent {
        Parent::Include(Arc::clone(directive))
    }

    /// Walk the parent chain upward until a play is reached
    pub fn find_play(&self) -> Option<Arc<crate::play::Play>> {
        match self {
            Parent::Play(play) => play.upgrade(),
            Parent::Block(block) => block
                .upgrade()
                .and_then(|b| b.parent())
                .and_then(|p| p.find_play()),
            Parent::Include(directive) => {
                directive.parent().and_then(|p| p.find_play())
            }
        }
    }
}

impl fmt::Debug for Parent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parent::Play(_) => f.write_str("Parent::Play"),
            Parent::Block(_) => f.write_str("Parent::Block"),
            Parent::Include(directive) => {
                write!(f, "Parent::Include({})", directive.role_name())
            }
        }
    }
}

/// One step inside a block
#[derive(Debug, Clone)]
pub enum Step {
    Task(Task),
    Block(Arc<Block>),
    IncludeRole(Arc<IncludeRole>),
}

/// Ordered container of executable steps plus optional handler steps
#[derive(Debug)]
pub struct Block {
    steps: Vec<Step>,
    handlers: Vec<Task>,
    parent: RwLock<Option<Parent>>,
}

impl Block {
    /// Create a block and parent its child steps to it
    ///
    /// A child block already parented to an include directive keeps that
    /// link — the directive is the logical parent of its expansion — and
    /// the directive itself is re-parented here instead, so scope lookups
    /// still cross the include boundary on their way up.
    pub fn new(steps: Vec<Step>, handlers: Vec<Task>) -> Arc<Block> {
        let block = Arc::new(Block {
            steps,
            handlers,
            parent: RwLock::new(None),
        });
        for step in &block.steps {
            match step {
                Step::Block(child) => match child.parent() {
                    Some(Parent::Include(directive)) => {
                        directive.set_parent(Some(Parent::block(&block)))
                    }
                    _ => child.set_parent(Some(Parent::block(&block))),
                },
                Step::IncludeRole(directive) => {
                    directive.set_parent(Some(Parent::block(&block)))
                }
                Step::Task(_) => {}
            }
        }
        block
    }

    /// Ordered steps of this block
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Handler steps attached to this block
    pub fn handlers(&self) -> &[Task] {
        &self.handlers
    }

    /// Current parent link
    pub fn parent(&self) -> Option<Parent> {
        self.parent.read().unwrap().clone()
    }

    /// Rewrite the parent link, grafting this block elsewhere in the tree
    pub fn set_parent(&self, parent: Option<Parent>) {
        *self.parent.write().unwrap() = parent;
    }

    /// Total number of plain tasks in this subtree
    pub fn task_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Task(_) => 1,
                Step::Block(child) => child.task_count(),
                Step::IncludeRole(_) => 0,
            })
            .sum()
    }
}

fn string_key(key: &str) -> Value {
    Value::String(key.to_string())
}

/// Turn a raw entry map into a step
///
/// Recognizes `block` entries (with optional `handlers`) and
/// `include_role` entries; anything else is a plain task. `parent_role`
/// links nested includes back to the role whose tasks file declared them,
/// which is what enables parameter inheritance and cycle detection for
/// roles including roles.
pub fn parse_entry(entry: &Mapping, parent_role: Option<&Arc<RoleInstance>>) -> Result<Step> {
    if let Some(Value::Sequence(children)) = entry.get(string_key("block")) {
        let mut steps = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Value::Mapping(map) => steps.push(parse_entry(map, parent_role)?),
                other => {
                    return Err(PlaybookError::Parse(format!(
                        "block entries must be mappings, got: {:?}",
                        other
                    )))
                }
            }
        }

        let mut handlers = Vec::new();
        if let Some(Value::Sequence(entries)) = entry.get(string_key("handlers")) {
            for handler in entries {
                match handler {
                    Value::Mapping(map) => handlers.push(Task::from_entry(map)?),
                    other => {
                        return Err(PlaybookError::Parse(format!(
                            "handler entries must be mappings, got: {:?}",
                            other
                        )))
                    }
                }
            }
        }

        return Ok(Step::Block(Block::new(steps, handlers)));
    }

    if let Some(Value::Mapping(options)) = entry.get(string_key("include_role")) {
        let mut generic = entry.clone();
        generic.remove(string_key("include_role"));
        let task = Task::from_entry(&generic)?;
        let directive = IncludeRole::load(options, task, None, parent_role.cloned())?;
        return Ok(Step::IncludeRole(Arc::new(directive)));
    }

    Ok(Step::Task(Task::from_entry(entry)?))
}

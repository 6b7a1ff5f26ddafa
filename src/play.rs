//! Play: the top-level grouping of hosts, tasks, and handlers
//!
//! The play is the root of the parent chain that role includes walk
//! upward, and it owns the one piece of shared mutable state in this
//! layer: the handler-block list that successful role expansions append
//! to.

use crate::block::{Block, Parent, Step};
use crate::error::Result;
use crate::task::Task;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Raw play document as parsed from a playbook file
#[derive(Debug, Deserialize)]
pub struct PlayDocument {
    /// Optional play name
    #[serde(default)]
    pub name: Option<String>,

    /// Host pattern the play targets
    #[serde(default)]
    pub hosts: Option<String>,

    /// Play-level variables
    #[serde(default)]
    pub vars: HashMap<String, Value>,

    /// Raw task entries, compiled later
    #[serde(default)]
    pub tasks: Vec<Mapping>,

    /// Raw handler entries declared directly on the play
    #[serde(default)]
    pub handlers: Vec<Mapping>,
}

/// A single orchestration run over a set of hosts
#[derive(Debug)]
pub struct Play {
    name: String,
    hosts: Option<String>,
    vars: HashMap<String, Value>,
    base_dir: PathBuf,
    entries: Vec<Mapping>,
    // Concurrent dynamic includes append here; the lock serializes them.
    handlers: Mutex<Vec<Arc<Block>>>,
}

impl Play {
    /// Create an empty play rooted at the given directory
    pub fn new(name: &str, base_dir: impl Into<PathBuf>) -> Arc<Play> {
        Arc::new(Play {
            name: name.to_string(),
            hosts: None,
            vars: HashMap::new(),
            base_dir: base_dir.into(),
            entries: Vec::new(),
            handlers: Mutex::new(Vec::new()),
        })
    }

    /// Build a play from a parsed document
    ///
    /// Handler entries declared on the play itself are turned into blocks
    /// up front, so role expansions append after them and their relative
    /// order is preserved.
    pub fn from_document(doc: PlayDocument, base_dir: impl Into<PathBuf>) -> Result<Arc<Play>> {
        let play = Arc::new(Play {
            name: doc.name.unwrap_or_else(|| "unnamed play".to_string()),
            hosts: doc.hosts,
            vars: doc.vars,
            base_dir: base_dir.into(),
            entries: doc.tasks,
            handlers: Mutex::new(Vec::new()),
        });

        let mut handler_blocks = Vec::with_capacity(doc.handlers.len());
        for entry in &doc.handlers {
            let task = Task::from_entry(entry)?;
            let block = Block::new(vec![Step::Task(task)], Vec::new());
            block.set_parent(Some(Parent::play(&play)));
            handler_blocks.push(block);
        }
        play.append_handlers(handler_blocks);

        Ok(play)
    }

    /// Play name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host pattern the play targets, if any
    pub fn hosts(&self) -> Option<&str> {
        self.hosts.as_deref()
    }

    /// Play-level variables
    pub fn vars(&self) -> &HashMap<String, Value> {
        &self.vars
    }

    /// Directory role lookups are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Raw task entries awaiting compilation
    pub fn entries(&self) -> &[Mapping] {
        &self.entries
    }

    /// Append handler blocks, preserving both prior and appended order
    pub fn append_handlers(&self, mut blocks: Vec<Arc<Block>>) {
        self.handlers.lock().unwrap().append(&mut blocks);
    }

    /// Snapshot of the current handler-block list
    pub fn handlers(&self) -> Vec<Arc<Block>> {
        self.handlers.lock().unwrap().clone()
    }

    /// Number of registered handler blocks
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }
}

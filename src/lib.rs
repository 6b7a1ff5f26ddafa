//! Playforge - role resolution and playbook compilation engine
//!
//! This crate takes declarative play documents, resolves the roles their
//! task lists include, and compiles everything into an ordered block tree
//! ready for an executor to walk. Static includes expand at compile time;
//! dynamic ones stay in the tree and expand when reached.

pub mod block;
pub mod compiler;
pub mod error;
pub mod include_role;
pub mod play;
pub mod role;
pub mod task;
pub mod vars;

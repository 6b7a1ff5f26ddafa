//! Play compilation: the static/dynamic decision pass
//!
//! Walks a play's entries, decides per include directive whether it
//! expands now (static) or stays in the tree for the executor (dynamic),
//! and splices static expansions in place. Loop includes are cloned once
//! per item before expansion.

use crate::block::{parse_entry, Block, Step};
use crate::error::Result;
use crate::include_role::IncludeRole;
use crate::play::Play;
use crate::role::locator::RoleLoader;
use crate::vars::VariableContext;
use serde_yaml::Value;
use std::sync::Arc;
use tracing::debug;

/// Knobs for the compilation pass
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Whether includes with no explicit `static` option expand at
    /// compile time
    pub static_by_default: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            static_by_default: false,
        }
    }
}

/// Compile a play's raw entries into its final step tree
///
/// Static role includes are expanded and replaced by their blocks;
/// dynamic ones remain as directives. Handler blocks from static
/// expansions are registered on the play as a side effect.
pub fn compile_play(
    play: &Arc<Play>,
    variables: &VariableContext,
    loader: &dyn RoleLoader,
    options: &CompileOptions,
) -> Result<Vec<Step>> {
    let mut steps = Vec::with_capacity(play.entries().len());
    for entry in play.entries() {
        let step = parse_entry(entry, None)?;
        match &step {
            Step::Block(block) => block.set_parent(Some(crate::block::Parent::play(play))),
            Step::IncludeRole(directive) => {
                directive.set_parent(Some(crate::block::Parent::play(play)))
            }
            Step::Task(_) => {}
        }
        steps.push(step);
    }
    expand_steps(steps, play, variables, loader, options)
}

fn expand_steps(
    steps: Vec<Step>,
    play: &Arc<Play>,
    variables: &VariableContext,
    loader: &dyn RoleLoader,
    options: &CompileOptions,
) -> Result<Vec<Step>> {
    let mut out = Vec::with_capacity(steps.len());
    for step in steps {
        match step {
            Step::IncludeRole(directive) => {
                let is_static = directive
                    .static_flag()
                    .unwrap_or(options.static_by_default);
                if !is_static {
                    debug!(role = %directive.role_name(), "keeping dynamic include");
                    out.push(Step::IncludeRole(directive));
                    continue;
                }

                for clone in iteration_clones(&directive) {
                    clone.set_statically_loaded(true);
                    let blocks = clone.get_block_list(Some(play), variables, loader)?;
                    for block in blocks {
                        let expanded =
                            expand_block(&block, play, variables, loader, options)?;
                        out.push(Step::Block(expanded));
                    }
                }
            }
            Step::Block(block) => {
                out.push(Step::Block(expand_block(
                    &block, play, variables, loader, options,
                )?));
            }
            step => out.push(step),
        }
    }
    Ok(out)
}

/// Clones of a directive for loop expansion, or the directive itself
///
/// Each clone gets the loop item bound into its vars under the task's
/// loop var, so the binding flows into the role's include parameters.
fn iteration_clones(directive: &Arc<IncludeRole>) -> Vec<Arc<IncludeRole>> {
    let Some(items) = directive.task().loop_items.clone() else {
        return vec![Arc::clone(directive)];
    };

    items
        .into_iter()
        .map(|item: Value| {
            let mut clone = directive.copy();
            let loop_var = clone.task().loop_var.clone();
            clone.task_mut().vars.insert(loop_var, item);
            Arc::new(clone)
        })
        .collect()
}

/// Rebuild a block with any nested static includes expanded
fn expand_block(
    block: &Arc<Block>,
    play: &Arc<Play>,
    variables: &VariableContext,
    loader: &dyn RoleLoader,
    options: &CompileOptions,
) -> Result<Arc<Block>> {
    let steps = expand_steps(
        block.steps().to_vec(),
        play,
        variables,
        loader,
        options,
    )?;
    let rebuilt = Block::new(steps, block.handlers().to_vec());
    rebuilt.set_parent(block.parent());
    Ok(rebuilt)
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use playforge::block::{parse_entry, Step};
use playforge::compiler::{compile_play, CompileOptions};
use playforge::play::{Play, PlayDocument};
use playforge::role::locator::FsRoleLoader;
use playforge::vars::VariableContext;

#[derive(Parser)]
#[command(name = "playforge")]
#[command(about = "Role resolution and playbook compilation engine for declarative task playbooks")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a play, expanding static role includes into the task tree
    Compile {
        /// Play file (YAML or JSON); roles are looked up next to it
        play_file: PathBuf,

        /// Expand includes statically unless they opt out
        #[arg(long)]
        static_by_default: bool,
    },
    /// Validate a play's entries and include directives without expansion
    Validate {
        /// Play file (YAML or JSON)
        play_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    match cli.command {
        Commands::Compile {
            play_file,
            static_by_default,
        } => {
            let play = load_play(&play_file)?;
            info!("Compiling play '{}'", play.name());

            let variables = VariableContext::from_map(play.vars().clone());
            let options = CompileOptions { static_by_default };
            let steps = compile_play(&play, &variables, &FsRoleLoader, &options)?;

            println!("Play: {}", play.name());
            if let Some(hosts) = play.hosts() {
                println!("Hosts: {}", hosts);
            }
            print_steps(&steps, 1);
            println!("Handlers registered: {}", play.handler_count());
        }
        Commands::Validate { play_file } => {
            let play = load_play(&play_file)?;
            for entry in play.entries() {
                parse_entry(entry, None)?;
            }
            println!(
                "Play '{}' validated: {} entries, {} handlers",
                play.name(),
                play.entries().len(),
                play.handler_count()
            );
        }
    }

    Ok(())
}

fn load_play(path: &Path) -> Result<Arc<Play>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read play file {}", path.display()))?;

    let doc: PlayDocument = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON play file {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML play file {}", path.display()))?,
    };

    let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    Ok(Play::from_document(doc, base_dir)?)
}

fn print_steps(steps: &[Step], depth: usize) {
    let pad = "  ".repeat(depth);
    for step in steps {
        match step {
            Step::Task(task) => {
                println!(
                    "{}- task: {}",
                    pad,
                    task.name.as_deref().unwrap_or("(unnamed)")
                );
            }
            Step::Block(block) => {
                println!("{}- block ({} tasks)", pad, block.task_count());
                print_steps(block.steps(), depth + 1);
            }
            Step::IncludeRole(directive) => {
                println!(
                    "{}- include_role: {} (dynamic)",
                    pad,
                    directive.role_name()
                );
            }
        }
    }
}

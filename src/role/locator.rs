//! Role lookup and instantiation
//!
//! Roles live in `roles/<name>/` under the play's base directory, with
//! `tasks/`, `handlers/`, `defaults/`, and `vars/` subdirectories each
//! holding a `main.yml` (or an override basename from the include
//! directive). The locator resolves a name to a role directory, loads the
//! definition files, and detects inclusion cycles by walking the
//! parent-role chain.

use crate::error::{PlaybookError, Result};
use crate::play::Play;
use crate::role::RoleInstance;
use crate::task::Task;
use crate::vars::VariableContext;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File access seam for role definitions
///
/// Production code uses [`FsRoleLoader`]; tests can substitute in-memory
/// trees without touching the disk.
pub trait RoleLoader: Send + Sync {
    fn is_dir(&self, path: &Path) -> bool;
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// Loader backed by the local filesystem
pub struct FsRoleLoader;

impl RoleLoader for FsRoleLoader {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// A located role, not yet loaded
#[derive(Debug)]
pub struct RoleReference {
    pub name: String,
    pub path: PathBuf,
    /// Vars merged into the resolution request, layered into the
    /// instance's parameters as the topmost layer
    pub vars: HashMap<String, Value>,
}

/// Resolve a role name to its on-disk definition
///
/// Searches `roles/` under the play's base directory first, then any
/// extra directories listed in the `roles_path` variable.
pub fn resolve_role(
    name: &str,
    play: &Play,
    variables: &VariableContext,
    loader: &dyn RoleLoader,
) -> Result<RoleReference> {
    let mut candidates = vec![play.base_dir().join("roles").join(name)];
    if let Some(Value::Sequence(extra)) = variables.get("roles_path") {
        for dir in extra {
            if let Value::String(dir) = dir {
                candidates.push(PathBuf::from(dir).join(name));
            }
        }
    }

    for candidate in &candidates {
        if loader.is_dir(candidate) {
            debug!(role = name, path = %candidate.display(), "resolved role");
            return Ok(RoleReference {
                name: name.to_string(),
                path: candidate.clone(),
                vars: HashMap::new(),
            });
        }
    }

    Err(PlaybookError::Resolution(format!(
        "role '{}' was not found in {}",
        name,
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Load a full role instance from a resolved reference
///
/// Fails with a cycle error if the reference names any role already on
/// the parent chain, which is how `a -> b -> a` inclusion loops are
/// caught before they recurse.
pub fn load_role_instance(
    reference: RoleReference,
    play: &Play,
    parent_role: Option<Arc<RoleInstance>>,
    from_files: &HashMap<String, String>,
    loader: &dyn RoleLoader,
) -> Result<Arc<RoleInstance>> {
    let mut visited = vec![reference.name.clone()];
    let mut ancestor = parent_role.clone();
    while let Some(role) = ancestor {
        visited.push(role.role_name().to_string());
        if role.role_name() == reference.name {
            visited.reverse();
            return Err(PlaybookError::Cycle(format!(
                "role '{}' is included by its own expansion ({})",
                reference.name,
                visited.join(" -> ")
            )));
        }
        ancestor = role.parent_role().cloned();
    }

    debug!(play = %play.name(), role = %reference.name, "loading role instance");

    let defaults = load_section_map(&reference.path, "defaults", from_files, loader)?;
    let role_vars = load_section_map(&reference.path, "vars", from_files, loader)?;
    let task_defs = load_section_entries(&reference.path, "tasks", from_files, loader)?;
    let handler_entries =
        load_section_entries(&reference.path, "handlers", from_files, loader)?;

    let mut handler_defs = Vec::with_capacity(handler_entries.len());
    for entry in &handler_entries {
        let task = Task::from_entry(entry).map_err(|e| {
            PlaybookError::Resolution(format!(
                "invalid handler in role '{}': {}",
                reference.name, e
            ))
        })?;
        handler_defs.push(task);
    }

    Ok(Arc::new(RoleInstance::new(
        reference.name,
        reference.path,
        defaults,
        role_vars,
        reference.vars,
        parent_role,
        task_defs,
        handler_defs,
    )))
}

/// Pick the definition file for one role section
///
/// An explicit override basename must exist; without one the standard
/// candidates are probed and a missing section is simply absent.
fn section_file(
    role_dir: &Path,
    section: &str,
    from_files: &HashMap<String, String>,
    loader: &dyn RoleLoader,
) -> Result<Option<PathBuf>> {
    if let Some(basename) = from_files.get(section) {
        let path = role_dir.join(section).join(basename);
        if !loader.exists(&path) {
            return Err(PlaybookError::Resolution(format!(
                "override file '{}' not found in {}",
                basename,
                role_dir.join(section).display()
            )));
        }
        return Ok(Some(path));
    }

    for candidate in ["main.yml", "main.yaml", "main.json"] {
        let path = role_dir.join(section).join(candidate);
        if loader.exists(&path) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn read_section(
    path: &Path,
    loader: &dyn RoleLoader,
) -> Result<String> {
    loader.read_to_string(path).map_err(|e| {
        PlaybookError::Resolution(format!("failed to read '{}': {}", path.display(), e))
    })
}

fn parse_document<T: serde::de::DeserializeOwned>(content: &str, path: &Path) -> Result<T> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| {
            PlaybookError::Resolution(format!(
                "failed to parse JSON role file '{}': {}",
                path.display(),
                e
            ))
        }),
        _ => serde_yaml::from_str(content).map_err(|e| {
            PlaybookError::Resolution(format!(
                "failed to parse YAML role file '{}': {}",
                path.display(),
                e
            ))
        }),
    }
}

fn load_section_map(
    role_dir: &Path,
    section: &str,
    from_files: &HashMap<String, String>,
    loader: &dyn RoleLoader,
) -> Result<HashMap<String, Value>> {
    let Some(path) = section_file(role_dir, section, from_files, loader)? else {
        return Ok(HashMap::new());
    };
    let content = read_section(&path, loader)?;
    let parsed: Option<HashMap<String, Value>> = parse_document(&content, &path)?;
    Ok(parsed.unwrap_or_default())
}

fn load_section_entries(
    role_dir: &Path,
    section: &str,
    from_files: &HashMap<String, String>,
    loader: &dyn RoleLoader,
) -> Result<Vec<Mapping>> {
    let Some(path) = section_file(role_dir, section, from_files, loader)? else {
        return Ok(Vec::new());
    };
    let content = read_section(&path, loader)?;
    let parsed: Option<Vec<Mapping>> = parse_document(&content, &path)?;
    Ok(parsed.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_role(dir: &Path, name: &str, section: &str, file: &str, content: &str) {
        let section_dir = dir.join("roles").join(name).join(section);
        fs::create_dir_all(&section_dir).unwrap();
        fs::write(section_dir.join(file), content).unwrap();
    }

    #[test]
    fn test_resolve_missing_role() {
        let tmp = tempfile::tempdir().unwrap();
        let play = Play::new("test", tmp.path());

        let err = resolve_role("ghost", &play, &VariableContext::new(), &FsRoleLoader)
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Resolution(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_resolve_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        write_role(tmp.path(), "web", "tasks", "main.yml", "- name: install\n");
        write_role(tmp.path(), "web", "defaults", "main.yml", "port: 80\n");
        let play = Play::new("test", tmp.path());

        let reference =
            resolve_role("web", &play, &VariableContext::new(), &FsRoleLoader).unwrap();
        assert_eq!(reference.name, "web");

        let role = load_role_instance(
            reference,
            &play,
            None,
            &HashMap::new(),
            &FsRoleLoader,
        )
        .unwrap();
        assert_eq!(role.role_name(), "web");
        assert_eq!(
            role.params().get("port"),
            Some(&Value::Number(80.into()))
        );
    }

    #[test]
    fn test_resolve_via_roles_path_variable() {
        let tmp = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        fs::create_dir_all(shared.path().join("common/tasks")).unwrap();
        let play = Play::new("test", tmp.path());

        let mut vars = VariableContext::new();
        vars.set(
            "roles_path".to_string(),
            Value::Sequence(vec![Value::String(
                shared.path().display().to_string(),
            )]),
        );

        let reference = resolve_role("common", &play, &vars, &FsRoleLoader).unwrap();
        assert_eq!(reference.path, shared.path().join("common"));
    }

    #[test]
    fn test_missing_override_is_resolution_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_role(tmp.path(), "web", "tasks", "main.yml", "- name: install\n");
        let play = Play::new("test", tmp.path());

        let reference =
            resolve_role("web", &play, &VariableContext::new(), &FsRoleLoader).unwrap();
        let mut from_files = HashMap::new();
        from_files.insert("tasks".to_string(), "install.yml".to_string());

        let err = load_role_instance(
            reference,
            &play,
            None,
            &from_files,
            &FsRoleLoader,
        )
        .unwrap_err();
        assert!(err.to_string().contains("install.yml"));
    }

    #[test]
    fn test_cycle_detected_via_parent_chain() {
        let tmp = tempfile::tempdir().unwrap();
        write_role(tmp.path(), "a", "tasks", "main.yml", "- name: in a\n");
        let play = Play::new("test", tmp.path());

        let reference_a =
            resolve_role("a", &play, &VariableContext::new(), &FsRoleLoader).unwrap();
        let instance_a = load_role_instance(
            reference_a,
            &play,
            None,
            &HashMap::new(),
            &FsRoleLoader,
        )
        .unwrap();

        // Loading "a" again with itself on the parent chain is a cycle.
        let reference =
            resolve_role("a", &play, &VariableContext::new(), &FsRoleLoader).unwrap();
        let err = load_role_instance(
            reference,
            &play,
            Some(instance_a),
            &HashMap::new(),
            &FsRoleLoader,
        )
        .unwrap_err();
        assert!(matches!(err, PlaybookError::Cycle(_)));
        assert!(err.to_string().contains("a -> a"));
    }
}

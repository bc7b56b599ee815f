//! Module import resolution.
//!
//! The machine only sees the [`ModuleResolver`] trait: resolve a path
//! relative to the importing file and hand back source text. Loaded
//! modules execute in a fresh global namespace which the importer merges;
//! namespaces are cached per machine by canonical id, and the cache entry
//! is visible during the module's own execution so import cycles
//! terminate.

use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, RuntimeError};
use crate::object::{new_scope, ScopeRef};
use crate::parser::parse_source;
use crate::vm::{Compiler, Completion, Machine};

pub trait ModuleResolver {
    /// Resolve `path` (as written in the import statement) relative to the
    /// importing file. Returns a canonical id plus the module source.
    fn load_source(&self, path: &str, importer: &str) -> Result<(String, String), String>;
}

/// Resolves imports against the file system: `path` and `path.rl`,
/// relative to the importing file's directory.
pub struct FileResolver;

impl ModuleResolver for FileResolver {
    fn load_source(&self, path: &str, importer: &str) -> Result<(String, String), String> {
        let base = Path::new(importer)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut candidates = vec![base.join(path)];
        if !path.ends_with(".rl") {
            candidates.push(base.join(format!("{}.rl", path)));
        }

        for candidate in candidates {
            if candidate.is_file() {
                let id = candidate.to_string_lossy().into_owned();
                return std::fs::read_to_string(&candidate)
                    .map(|source| (id, source))
                    .map_err(|err| format!("cannot read module '{}': {}", path, err));
            }
        }
        Err(format!("no module named '{}'", path))
    }
}

/// Load (or fetch from cache) the module named by `path`, returning its
/// namespace.
pub fn load_module(
    machine: &mut Machine,
    path: &str,
    importer: &str,
) -> Result<ScopeRef, RuntimeError> {
    let (id, source) = machine
        .resolver
        .load_source(path, importer)
        .map_err(|message| RuntimeError::new(ErrorKind::Import, message))?;

    if let Some(cached) = machine.modules.get(&id) {
        return Ok(cached.clone());
    }

    let program = parse_source(&source).map_err(|err| {
        RuntimeError::new(ErrorKind::Import, format!("in module '{}': {}", path, err))
    })?;
    let code = Compiler::compile(&program, &id).map_err(|err| {
        RuntimeError::new(ErrorKind::Import, format!("in module '{}': {}", path, err))
    })?;

    let namespace = new_scope();
    machine.modules.insert(id.clone(), namespace.clone());
    match machine.execute(code, Some(namespace.clone())) {
        Completion::Normal(_) => Ok(namespace),
        Completion::UnhandledError(err) | Completion::ErrorInHandling(err) => {
            machine.modules.remove(&id);
            Err(err)
        }
    }
}

use crate::config::{DEFAULT_SERVER_URL, WorkspaceConfig, load_config, save_config};
use keep_core::{KeepError, KeepResult};
use std::fs;
use std::path::{Path, PathBuf};

const KEEP_DIR: &str = ".keep";

/// Locations of everything the client keeps on disk for one workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub keep_dir: PathBuf,
    pub config_path: PathBuf,
    /// SQLite file backing the note cache and the session.
    pub state_db_path: PathBuf,
    pub logs_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkspaceInitResult {
    pub paths: WorkspacePaths,
    /// Directories and files this call created, in creation order.
    pub created: Vec<PathBuf>,
}

impl WorkspacePaths {
    pub fn from_root(root: PathBuf) -> Self {
        let keep_dir = root.join(KEEP_DIR);
        Self {
            config_path: keep_dir.join("config.toml"),
            state_db_path: keep_dir.join("state.db"),
            logs_dir: keep_dir.join("logs"),
            root,
            keep_dir,
        }
    }

    fn directories(&self) -> [&Path; 3] {
        [&self.root, &self.keep_dir, &self.logs_dir]
    }

    fn is_initialized(&self) -> bool {
        self.keep_dir.is_dir()
    }
}

/// Creates the workspace layout and a default config. Running it again on an
/// existing workspace validates the config and leaves it untouched.
pub fn init_workspace(
    target: Option<&Path>,
    server: Option<&str>,
) -> KeepResult<WorkspaceInitResult> {
    let paths = WorkspacePaths::from_root(workspace_root(target)?);
    let mut created = Vec::new();

    for dir in paths.directories() {
        if create_missing_dir(dir)? {
            created.push(dir.to_path_buf());
        }
    }

    if paths.config_path.exists() {
        load_config(&paths)?;
    } else {
        let server = server.unwrap_or(DEFAULT_SERVER_URL);
        save_config(&paths, &WorkspaceConfig::with_server(server))?;
        tracing::debug!(server, path = %paths.config_path.display(), "wrote workspace config");
        created.push(paths.config_path.clone());
    }

    Ok(WorkspaceInitResult { paths, created })
}

pub fn resolve_workspace(explicit: Option<&Path>) -> KeepResult<WorkspacePaths> {
    let paths = WorkspacePaths::from_root(workspace_root(explicit)?);
    if paths.is_initialized() {
        return Ok(paths);
    }

    let root = paths.root.display();
    Err(KeepError::usage(format!(
        "no notes workspace at '{root}'; run `keep init --workspace {root}` first"
    )))
}

/// The given path made absolute, or the current directory.
fn workspace_root(target: Option<&Path>) -> KeepResult<PathBuf> {
    let resolved = match target {
        Some(path) => std::path::absolute(path),
        None => std::env::current_dir(),
    };
    resolved.map_err(|err| KeepError::io(format!("cannot locate the workspace directory: {err}")))
}

/// Returns whether the directory had to be created.
fn create_missing_dir(dir: &Path) -> KeepResult<bool> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(false),
        Ok(_) => Err(KeepError::io(format!(
            "'{}' exists but is not a directory",
            dir.display()
        ))),
        Err(_) => {
            fs::create_dir_all(dir).map_err(|err| {
                KeepError::io(format!("cannot create '{}': {err}", dir.display()))
            })?;
            Ok(true)
        }
    }
}

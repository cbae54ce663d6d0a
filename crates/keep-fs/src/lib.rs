mod config;
mod workspace;

pub use config::{
    CONFIG_VERSION, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_URL, DEFAULT_SYNC_INTERVAL_SECS,
    WorkspaceConfig, load_config, save_config,
};
pub use workspace::{WorkspaceInitResult, WorkspacePaths, init_workspace, resolve_workspace};

use keep_core::{ExitCode, KeepResult};
use keep_fs::{init_workspace, load_config};
use serde::Serialize;

use crate::{GlobalOptions, print_result, workspace_target};

#[derive(Debug, Serialize)]
struct InitOutput {
    workspace: String,
    server: String,
    sync_interval_secs: u64,
    created: Vec<String>,
}

pub(crate) fn cmd_init(globals: &GlobalOptions) -> KeepResult<ExitCode> {
    let target = workspace_target(globals)?;
    let result = init_workspace(Some(&target), globals.server.as_deref())?;
    let config = load_config(&result.paths)?;

    let output = InitOutput {
        workspace: result.paths.root.display().to_string(),
        server: config.resolve_server(globals.server.as_deref()),
        sync_interval_secs: config.sync_interval().as_secs(),
        created: result
            .created
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    };

    if globals.json {
        print_result(&output)?;
    } else {
        println!("Workspace initialized: {}", output.workspace);
        println!("Server: {}", output.server);
        if output.created.is_empty() {
            println!("Created: none");
        } else {
            println!("Created:");
            for path in &output.created {
                println!("  - {path}");
            }
        }
    }

    Ok(ExitCode::Success)
}

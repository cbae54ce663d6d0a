mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use keep_api::KeepApi;
use keep_core::{ExitCode, KeepError, KeepResult};
use keep_fs::{WorkspaceConfig, WorkspacePaths, init_workspace, load_config, resolve_workspace};
use keep_store::{SessionStore, SqliteStore};
use keep_sync::NotesClient;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "keep",
    version,
    about = "Offline-first notes client",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH", env = "KEEP_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    Note {
        #[command(subcommand)]
        command: NoteCommand,
    },
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    Login {
        #[arg(long, env = "KEEP_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "KEEP_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Use an existing bearer token instead of email and password.
        #[arg(long, conflicts_with_all = ["email", "password"])]
        token: Option<String>,
    },
    Status,
    Logout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    Now,
    Status,
    Auto {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Keep syncing on the configured interval until the session ends.
    Watch {
        /// Stop after this many seconds.
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommand {
    Clear,
}

#[derive(Debug, Subcommand)]
enum NoteCommand {
    List {
        #[arg(long = "category")]
        categories: Vec<i64>,
        /// Read the local cache only.
        #[arg(long)]
        offline: bool,
    },
    Get {
        id: i64,
    },
    New {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long = "category")]
        categories: Vec<i64>,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long = "category")]
        categories: Vec<i64>,
        /// Remove every category from the note.
        #[arg(long, conflicts_with = "categories")]
        clear_categories: bool,
    },
    Delete {
        id: i64,
    },
    Search {
        query: String,
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    List {
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Debug, Clone)]
struct GlobalOptions {
    workspace: Option<PathBuf>,
    server: Option<String>,
    json: bool,
}

type Client = NotesClient<KeepApi, SqliteStore, SessionStore<SqliteStore>>;

struct AppContext {
    paths: WorkspacePaths,
    config: WorkspaceConfig,
    server: String,
    api: KeepApi,
    store: SqliteStore,
    sessions: SessionStore<SqliteStore>,
}

impl AppContext {
    fn notes_client(&self) -> Arc<Client> {
        Arc::new(NotesClient::new(
            self.api.clone(),
            self.store.clone(),
            self.sessions.clone(),
        ))
    }
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.debug, cli.json, cli.no_color);

    let globals = GlobalOptions {
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
    };

    let exit = match run_command(cli.command, &globals) {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

fn configure_logging(debug: bool, json: bool, no_color: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> KeepResult<ExitCode> {
    match command {
        Command::Init => commands::workspace::cmd_init(globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Sync { command } => commands::sync::cmd_sync(command, globals),
        Command::Cache { command } => commands::sync::cmd_cache(command, globals),
        Command::Note { command } => commands::note::cmd_note(command, globals),
        Command::Category { command } => commands::note::cmd_category(command, globals),
    }
}

/// Opens the workspace (initializing it on first use) and builds the API
/// client and stores for one command.
fn with_app_context<F>(globals: &GlobalOptions, run: F) -> KeepResult<ExitCode>
where
    F: FnOnce(AppContext) -> KeepResult<ExitCode>,
{
    let target = workspace_target(globals)?;
    if !target.join(".keep").is_dir() {
        init_workspace(Some(&target), globals.server.as_deref())?;
    }

    let paths = resolve_workspace(Some(&target))?;
    let config = load_config(&paths)?;
    let server = config.resolve_server(globals.server.as_deref());
    let api = KeepApi::with_timeout(&server, config.request_timeout())?;
    let store = SqliteStore::from_workspace(&paths)?;
    let sessions = SessionStore::new(store.clone());

    run(AppContext {
        paths,
        config,
        server,
        api,
        store,
        sessions,
    })
}

fn workspace_target(globals: &GlobalOptions) -> KeepResult<PathBuf> {
    if let Some(path) = &globals.workspace {
        if path.is_absolute() {
            return Ok(path.clone());
        }
        return Ok(current_dir()?.join(path));
    }

    current_dir()
}

fn current_dir() -> KeepResult<PathBuf> {
    std::env::current_dir().map_err(|err| {
        KeepError::io(format!(
            "failed to resolve current directory for workspace: {err}"
        ))
    })
}

fn render_error(error: &KeepError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": error,
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"io\",\"message\":\"failed to serialize error\"}}".to_string()
        });
        eprintln!("{serialized}");
    } else {
        eprintln!("error: {}", error.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> KeepResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| KeepError::io(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn print_result<T: Serialize>(value: &T) -> KeepResult<()> {
    print_json(&json!({"ok": true, "result": value}))
}

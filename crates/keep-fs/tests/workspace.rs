use keep_core::ExitCode;
use keep_fs::{
    DEFAULT_SERVER_URL, DEFAULT_SYNC_INTERVAL_SECS, init_workspace, load_config,
    resolve_workspace, save_config,
};

#[test]
fn init_workspace_creates_expected_layout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    let result =
        init_workspace(Some(&root), Some("https://notes.example.com/api")).expect("init workspace");

    assert!(result.paths.root.is_dir());
    assert!(result.paths.keep_dir.is_dir());
    assert!(result.paths.logs_dir.is_dir());
    assert!(result.paths.config_path.is_file());
    assert!(result.created.contains(&result.paths.config_path));

    let config = load_config(&result.paths).expect("load config");
    assert_eq!(config.server, "https://notes.example.com/api");
    assert_eq!(config.sync_interval_secs, DEFAULT_SYNC_INTERVAL_SECS);
}

#[test]
fn init_workspace_is_idempotent_and_keeps_existing_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    let first = init_workspace(Some(&root), None).expect("first init");
    let mut config = load_config(&first.paths).expect("load config");
    assert_eq!(config.server, DEFAULT_SERVER_URL);

    config.sync_interval_secs = 15;
    save_config(&first.paths, &config).expect("save config");

    let second = init_workspace(Some(&root), Some("https://ignored.example.com")).expect("re-init");
    assert!(second.created.is_empty());

    let reloaded = load_config(&second.paths).expect("reload config");
    assert_eq!(reloaded.server, DEFAULT_SERVER_URL);
    assert_eq!(reloaded.sync_interval_secs, 15);
}

#[test]
fn resolve_workspace_fails_when_uninitialized() {
    let temp = tempfile::tempdir().expect("tempdir");

    let error =
        resolve_workspace(Some(temp.path())).expect_err("workspace should not be initialized");

    assert_eq!(error.exit_code(), ExitCode::Usage);
}

#[test]
fn init_workspace_rejects_a_file_where_the_state_dir_belongs() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join(".keep"), "not a directory").expect("write blocker");

    let error = init_workspace(Some(temp.path()), None).expect_err("blocked layout");

    assert_eq!(error.exit_code(), ExitCode::Io);
    assert!(error.message.contains("not a directory"));
}

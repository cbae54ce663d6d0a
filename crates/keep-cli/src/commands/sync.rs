use keep_core::{ExitCode, KeepError, KeepResult};
use keep_sync::{AutoSync, SyncReport, SyncStatus};
use std::thread;
use std::time::{Duration, Instant};

use crate::{CacheCommand, GlobalOptions, SyncCommand, Toggle, print_result, with_app_context};

const WATCH_POLL: Duration = Duration::from_millis(250);

pub(crate) fn cmd_sync(command: SyncCommand, globals: &GlobalOptions) -> KeepResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        SyncCommand::Now => {
            let client = ctx.notes_client();
            let report = client.sync_all()?;
            render_report(&report, globals.json)?;
            Ok(ExitCode::Success)
        }
        SyncCommand::Status => {
            let status = ctx.notes_client().status();
            render_status(&status, globals.json)?;
            Ok(ExitCode::Success)
        }
        SyncCommand::Auto { state } => {
            let client = ctx.notes_client();
            let enabled = state == Toggle::On;
            let before = client.last_sync_time();

            // Enabling with a session runs one sync before the command returns.
            let auto_sync = AutoSync::new(client.clone(), ctx.config.sync_interval());
            auto_sync.set_auto_sync_enabled(enabled)?;
            auto_sync.stop();
            let synced = client.last_sync_time() != before;

            if globals.json {
                print_result(&serde_json::json!({
                    "auto_sync_enabled": enabled,
                    "synced": synced,
                }))?;
            } else {
                println!(
                    "Auto-sync {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                if synced {
                    println!("Synced now");
                }
            }
            Ok(ExitCode::Success)
        }
        SyncCommand::Watch { duration } => {
            let client = ctx.notes_client();
            if !client.is_authenticated() {
                return Err(KeepError::not_authenticated(
                    "no active session; run `keep auth login` first",
                ));
            }
            if !client.auto_sync_enabled() {
                return Err(KeepError::usage(
                    "auto-sync is disabled; run `keep sync auto on` first",
                ));
            }

            let auto_sync = AutoSync::new(client.clone(), ctx.config.sync_interval());
            let report = client.sync_all()?;
            render_report(&report, globals.json)?;
            auto_sync.start()?;

            let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
            let mut last_seen = client.last_sync_time();
            while auto_sync.is_running() {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    break;
                }
                thread::sleep(WATCH_POLL);

                let latest = client.last_sync_time();
                if latest != last_seen {
                    last_seen = latest;
                    render_status(&client.status(), globals.json)?;
                }
            }
            auto_sync.stop();

            if client.is_authenticated() {
                Ok(ExitCode::Success)
            } else {
                Err(KeepError::not_authenticated("session ended; auto-sync stopped"))
            }
        }
    })
}

pub(crate) fn cmd_cache(command: CacheCommand, globals: &GlobalOptions) -> KeepResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        CacheCommand::Clear => {
            let report = ctx.notes_client().clear_cache()?;
            render_report(&report, globals.json)?;
            Ok(ExitCode::Success)
        }
    })
}

fn render_report(report: &SyncReport, json: bool) -> KeepResult<()> {
    if json {
        return print_result(report);
    }
    println!(
        "Synced {} notes and {} categories at {}",
        report.notes,
        report.categories,
        report.completed_at.to_rfc3339()
    );
    Ok(())
}

fn render_status(status: &SyncStatus, json: bool) -> KeepResult<()> {
    if json {
        return print_result(status);
    }
    println!(
        "Authenticated: {}",
        if status.authenticated { "yes" } else { "no" }
    );
    println!(
        "Auto-sync: {}",
        if status.auto_sync_enabled { "on" } else { "off" }
    );
    match status.last_sync_time {
        Some(at) => println!("Last sync: {}", at.to_rfc3339()),
        None => println!("Last sync: never"),
    }
    println!("Cached notes: {}", status.cached_notes);
    println!("Cached categories: {}", status.cached_categories);
    println!("API calls: {}", status.api_calls);
    Ok(())
}

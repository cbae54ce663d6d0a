use keep_core::{ExitCode, KeepError, KeepResult};
use keep_store::StoredSession;
use serde_json::json;

use crate::{AppContext, AuthCommand, GlobalOptions, print_result, with_app_context};

pub(crate) fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> KeepResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        AuthCommand::Login {
            email,
            password,
            token,
        } => {
            let stored = match token {
                Some(token) => login_with_token(&ctx, &token)?,
                None => {
                    let (email, password) = email.zip(password).ok_or_else(|| {
                        KeepError::usage(
                            "missing credentials; pass --email and --password or set KEEP_EMAIL and KEEP_PASSWORD",
                        )
                    })?;
                    let login = ctx.api.login(&email, &password)?;
                    ctx.sessions.sign_in(&login.access_token, &login.user)?
                }
            };

            if globals.json {
                print_result(&session_view(&ctx, &stored))?;
            } else {
                println!("Authenticated with {}", ctx.server);
                if let Some(user) = &stored.user {
                    println!("User: {} <{}>", user.name, user.email);
                }
                if let Some(expires_at) = stored.expires_at {
                    println!("Session expires: {}", expires_at.to_rfc3339());
                }
                println!("Session saved: {}", ctx.paths.state_db_path.display());
            }
            Ok(ExitCode::Success)
        }
        AuthCommand::Status => {
            let Some(stored) = ctx.sessions.load()? else {
                if globals.json {
                    print_json_status_missing(&ctx)?;
                } else {
                    println!("Server: {}", ctx.server);
                    println!("Authenticated: no");
                }
                return Ok(ExitCode::Auth);
            };

            if globals.json {
                print_result(&session_view(&ctx, &stored))?;
            } else {
                println!("Server: {}", ctx.server);
                println!("Authenticated: yes");
                if let Some(user) = &stored.user {
                    println!("User: {} <{}>", user.name, user.email);
                }
                if let Some(expires_at) = stored.expires_at {
                    println!("Session expires: {}", expires_at.to_rfc3339());
                }
            }
            Ok(ExitCode::Success)
        }
        AuthCommand::Logout => {
            let had_session = ctx.sessions.load()?.is_some();
            ctx.sessions.sign_out()?;

            if globals.json {
                print_result(&json!({
                    "server": ctx.server,
                    "signed_out": had_session,
                }))?;
            } else if had_session {
                println!("Signed out of {}", ctx.server);
            } else {
                println!("No active session.");
            }
            Ok(ExitCode::Success)
        }
    })
}

fn login_with_token(ctx: &AppContext, token: &str) -> KeepResult<StoredSession> {
    let user = ctx.api.current_user(token)?;
    ctx.sessions.sign_in(token, &user)
}

fn session_view(ctx: &AppContext, stored: &StoredSession) -> serde_json::Value {
    json!({
        "server": ctx.server,
        "authenticated": true,
        "user": stored.user,
        "expires_at": stored.expires_at,
    })
}

fn print_json_status_missing(ctx: &AppContext) -> KeepResult<()> {
    crate::print_json(&json!({
        "ok": false,
        "result": {
            "server": ctx.server,
            "authenticated": false,
            "reason": "no stored session",
        }
    }))
}

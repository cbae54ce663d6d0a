use keep_api::{Category, Note};
use keep_core::{ExitCode, KeepError, KeepResult};

use crate::{
    CategoryCommand, Client, GlobalOptions, NoteCommand, print_result, with_app_context,
};

pub(crate) fn cmd_note(command: NoteCommand, globals: &GlobalOptions) -> KeepResult<ExitCode> {
    with_app_context(globals, |ctx| {
        let client = ctx.notes_client();
        match command {
            NoteCommand::List {
                categories,
                offline,
            } => {
                refresh_with_cache_fallback(&client, offline);
                let notes = client.filter_notes_by_categories(&categories);
                render_notes(&notes, globals.json)?;
                Ok(ExitCode::Success)
            }
            NoteCommand::Get { id } => {
                refresh_with_cache_fallback(&client, false);
                let note = client
                    .get_note(id)
                    .ok_or_else(|| KeepError::usage(format!("note {id} not found")))?;

                if globals.json {
                    print_result(&note)?;
                } else {
                    println!("# {}", note.title);
                    if !note.categories.is_empty() {
                        println!("Categories: {}", category_names(&note.categories));
                    }
                    if let Some(updated_at) = &note.updated_at {
                        println!("Updated: {updated_at}");
                    }
                    println!();
                    println!("{}", note.content);
                }
                Ok(ExitCode::Success)
            }
            NoteCommand::New {
                title,
                content,
                categories,
            } => {
                if title.trim().is_empty() {
                    return Err(KeepError::usage("note title cannot be empty"));
                }
                ensure_categories_loaded(&client)?;
                let note = client.create_note(&title, &content, &categories)?;
                render_saved("Created", &note, globals.json)?;
                Ok(ExitCode::Success)
            }
            NoteCommand::Edit {
                id,
                title,
                content,
                categories,
                clear_categories,
            } => {
                refresh_with_cache_fallback(&client, false);
                let existing = client.get_note(id);
                let missing = || {
                    KeepError::usage(format!(
                        "note {id} is not cached; pass --title and --content to overwrite it"
                    ))
                };

                let title = match title {
                    Some(title) => title,
                    None => existing.as_ref().ok_or_else(missing)?.title.clone(),
                };
                let content = match content {
                    Some(content) => content,
                    None => existing.as_ref().ok_or_else(missing)?.content.clone(),
                };
                let category_ids = if clear_categories {
                    Vec::new()
                } else if categories.is_empty() {
                    // The stored map also holds ids whose category is not loaded yet.
                    client.associations().get(&id).cloned().unwrap_or_else(|| {
                        existing.as_ref().map(Note::category_ids).unwrap_or_default()
                    })
                } else {
                    categories
                };

                let note = client.update_note(id, &title, &content, &category_ids)?;
                render_saved("Updated", &note, globals.json)?;
                Ok(ExitCode::Success)
            }
            NoteCommand::Delete { id } => {
                client.delete_note(id)?;
                if globals.json {
                    print_result(&serde_json::json!({"deleted": id}))?;
                } else {
                    println!("Deleted note {id}");
                }
                Ok(ExitCode::Success)
            }
            NoteCommand::Search { query, offline } => {
                refresh_with_cache_fallback(&client, offline);
                let notes = client.search_notes(&query);
                render_notes(&notes, globals.json)?;
                Ok(ExitCode::Success)
            }
        }
    })
}

pub(crate) fn cmd_category(
    command: CategoryCommand,
    globals: &GlobalOptions,
) -> KeepResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        CategoryCommand::List { offline } => {
            let client = ctx.notes_client();
            let categories = if offline {
                client.categories()
            } else {
                client.fetch_categories().unwrap_or_else(|err| {
                    tracing::warn!("showing cached categories: {}", err.message);
                    client.categories()
                })
            };

            if globals.json {
                print_result(&categories)?;
            } else if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in &categories {
                    println!("{} | {} | {}", category.id, category.name, category.color);
                }
            }
            Ok(ExitCode::Success)
        }
    })
}

/// Pulls fresh data when signed in; on failure the cached copy is shown.
fn refresh_with_cache_fallback(client: &Client, offline: bool) {
    if offline || !client.is_authenticated() {
        return;
    }
    if let Err(err) = client.sync_all() {
        tracing::warn!("showing cached notes: {}", err.message);
    }
}

/// Categories must be known before a write so the submitted ids resolve.
fn ensure_categories_loaded(client: &Client) -> KeepResult<()> {
    if client.categories().is_empty() {
        client.fetch_categories()?;
    }
    Ok(())
}

fn render_notes(notes: &[Note], json: bool) -> KeepResult<()> {
    if json {
        return print_result(&notes);
    }
    if notes.is_empty() {
        println!("No notes found.");
        return Ok(());
    }
    for note in notes {
        if note.categories.is_empty() {
            println!("{} | {}", note.id, note.title);
        } else {
            println!(
                "{} | {} [{}]",
                note.id,
                note.title,
                category_names(&note.categories)
            );
        }
    }
    Ok(())
}

fn render_saved(verb: &str, note: &Note, json: bool) -> KeepResult<()> {
    if json {
        return print_result(note);
    }
    println!("{verb} note {}: {}", note.id, note.title);
    Ok(())
}

fn category_names(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|category| category.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

//! Note command handlers
//!
//! Commands act on the active note unless a note is named by id, path or a
//! prefix of either.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use super::{resolve_note, Engine};
use crate::editor::{confirm, edit_text};
use crate::output::{short_id, Output};

/// Create a new note and make it active
pub fn create(
    engine: &mut Engine,
    name: Option<String>,
    body: Option<String>,
    output: &Output,
) -> Result<()> {
    let note = engine.create_note(name.as_deref().unwrap_or_default())?;
    if let Some(body) = body {
        engine.update_active_content(body)?;
    }

    let note = engine.notes().find(&note.note_ref()).cloned().unwrap_or(note);
    output.success(&format!("Created note {} - {}", short_id(&note.id), note.title));
    if output.is_quiet() {
        println!("{}", note.id);
    }
    Ok(())
}

pub fn list(engine: &Engine, output: &Output) -> Result<()> {
    output.print_notes(engine.notes(), engine.pending());
    Ok(())
}

pub fn show(engine: &Engine, id: Option<String>, output: &Output) -> Result<()> {
    let note = match id {
        Some(id) => {
            let note_ref = resolve_note(engine.notes(), &id)?;
            engine
                .notes()
                .find(&note_ref)
                .ok_or_else(|| anyhow::anyhow!("Note not found: {}", note_ref))?
        }
        None => engine.active(),
    };
    output.print_note(note);
    Ok(())
}

/// Make a note active
pub fn open(engine: &mut Engine, id: String, output: &Output) -> Result<()> {
    let note_ref = resolve_note(engine.notes(), &id)?;
    engine.select_note(&note_ref)?;
    output.success(&format!("Opened: {}", engine.active().title));
    Ok(())
}

/// Replace a note's body, from `--body` or the editor
pub fn edit(
    engine: &mut Engine,
    id: Option<String>,
    body: Option<String>,
    output: &Output,
) -> Result<()> {
    if let Some(id) = id {
        let note_ref = resolve_note(engine.notes(), &id)?;
        engine.select_note(&note_ref)?;
    }

    let current = engine.active().content.clone();
    let content = match body {
        Some(b) => b,
        None => edit_text(&current).context("Failed to edit note")?,
    };

    if content == current {
        output.message("No changes.");
        return Ok(());
    }

    engine.update_active_content(content)?;
    output.success(&format!("Saved: {}", engine.active().title));
    Ok(())
}

pub async fn delete(engine: &mut Engine, id: String, yes: bool, output: &Output) -> Result<()> {
    let note_ref = resolve_note(engine.notes(), &id)?;
    let (id, title) = engine
        .notes()
        .find(&note_ref)
        .map(|n| (n.id.clone(), n.title.clone()))
        .unwrap_or_default();

    if !yes {
        if !output.should_prompt() {
            bail!("Refusing to delete without confirmation. Pass --yes to confirm.");
        }
        println!("Delete note: {} - {}", short_id(&id), title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = engine.delete_note(&note_ref).await?;
    output.success(&format!("Deleted note: {}", removed.title));
    Ok(())
}

/// Import a Markdown or text file as a new note
pub fn import(engine: &mut Engine, file: PathBuf, output: &Output) -> Result<()> {
    let content = fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {:?}", file))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Imported".to_string());

    let note = engine.import_note(&file_name, content)?;
    output.success(&format!("Imported {} as '{}'", file.display(), note.title));
    Ok(())
}

/// Write a note's Markdown to a file, or stdout without `--output`
pub fn export(
    engine: &Engine,
    id: Option<String>,
    out: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let note = match id {
        Some(id) => {
            let note_ref = resolve_note(engine.notes(), &id)?;
            engine
                .notes()
                .find(&note_ref)
                .ok_or_else(|| anyhow::anyhow!("Note not found: {}", note_ref))?
        }
        None => engine.active(),
    };

    match out {
        Some(path) => {
            fs::write(&path, &note.content)
                .with_context(|| format!("Failed to write {:?}", path))?;
            output.success(&format!("Exported '{}' to {}", note.title, path.display()));
        }
        None => print!("{}", note.content),
    }
    Ok(())
}

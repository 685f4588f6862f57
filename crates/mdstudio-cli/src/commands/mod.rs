//! Command handlers

pub mod config;
pub mod mode;
pub mod note;
pub mod share;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};

use mdstudio_core::{
    Config, EngineOptions, GitHubConnector, KeyValueStore, LocalNoteStore, Note, NoteCollection,
    NoteRef, StorageError, SyncEngine,
};

/// The engine as wired for the command line
pub type Engine = SyncEngine<GitHubConnector>;

/// Open the note store and engine described by `config`
pub fn open_engine(config: &Config) -> Result<Engine> {
    let kv = KeyValueStore::open(config.store_dir()).map_err(|e| {
        storage_failure(e, format!("Failed to open note store in {:?}", config.store_dir()))
    })?;
    let engine = SyncEngine::open(
        GitHubConnector::from_config(config),
        LocalNoteStore::new(kv),
        EngineOptions::from_config(config),
    )?;
    Ok(engine)
}

/// Attach the store's recovery hint, if it has one
fn storage_failure(err: StorageError, what: String) -> anyhow::Error {
    match err.hint() {
        Some(hint) => anyhow::Error::new(err).context(format!("{}. {}", what, hint)),
        None => anyhow::Error::new(err).context(what),
    }
}

/// Resolve a path, id or unique prefix of either to a note
///
/// Cloud notes with identical bodies share an id, so those need their path.
pub fn resolve_note(notes: &NoteCollection, query: &str) -> Result<NoteRef> {
    if let Some(note) = notes.find_by_path(query) {
        return Ok(note.note_ref());
    }

    let exact: Vec<&Note> = notes.notes().iter().filter(|n| n.id == query).collect();
    let matches = if exact.is_empty() {
        notes
            .notes()
            .iter()
            .filter(|n| {
                n.id.starts_with(query)
                    || n.path.as_deref().is_some_and(|p| p.starts_with(query))
            })
            .collect()
    } else {
        exact
    };

    match matches.as_slice() {
        [] => bail!("No note found matching: {}", query),
        [note] => Ok(note.note_ref()),
        _ => {
            eprintln!("Multiple notes match '{}':", query);
            for note in &matches {
                eprintln!(
                    "  {} {} - {}",
                    note.id,
                    note.path.as_deref().unwrap_or("-"),
                    note.title
                );
            }
            bail!("Ambiguous note. Give more characters, or the note's path.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, title: &str) -> Note {
        Note {
            id: id.into(),
            path: None,
            title: title.into(),
            content: format!("# {}", title),
        }
    }

    fn cloud(id: &str, path: &str, title: &str) -> Note {
        Note {
            path: Some(path.into()),
            ..note(id, title)
        }
    }

    #[test]
    fn test_resolve_note_by_id() {
        let notes = NoteCollection::from_notes(
            vec![note("abc123", "One"), note("abd456", "Two"), note("ab", "Short")],
            None,
        )
        .unwrap();

        assert_eq!(resolve_note(&notes, "abc").unwrap(), NoteRef::Id("abc123".into()));
        // Exact match wins over prefix ambiguity
        assert_eq!(resolve_note(&notes, "ab").unwrap(), NoteRef::Id("ab".into()));
        assert!(resolve_note(&notes, "zzz").is_err());

        let ambiguous = NoteCollection::from_notes(
            vec![note("abc123", "One"), note("abd456", "Two")],
            None,
        )
        .unwrap();
        assert!(resolve_note(&ambiguous, "ab").is_err());
    }

    #[test]
    fn test_resolve_note_sharing_a_version() {
        let notes = NoteCollection::from_notes(
            vec![cloud("S", "2_b.md", "Same"), cloud("S", "1_a.md", "Same")],
            None,
        )
        .unwrap();

        assert!(resolve_note(&notes, "S").is_err());
        assert_eq!(
            resolve_note(&notes, "1_a.md").unwrap(),
            NoteRef::Path("1_a.md".into())
        );
        assert_eq!(resolve_note(&notes, "2_").unwrap(), NoteRef::Path("2_b.md".into()));
    }

    #[test]
    fn test_open_engine_creates_store() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        let engine = open_engine(&config).unwrap();
        assert_eq!(engine.notes().len(), 1);
        assert!(config.store_dir().exists());
    }
}

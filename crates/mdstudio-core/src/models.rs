//! Data models for Markdown Studio
//!
//! Defines the note entity, the ordered note collection with its active
//! pointer, and the persistence mode.
//!
//! A note's `id` is a version token: for cloud notes it is the blob SHA and it
//! changes on every remote write. The `path` is the stable identity once the
//! note has been written to the remote store, which is why lookups that must
//! survive a push go through [`NoteRef`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when the content has no usable heading
pub const UNTITLED: &str = "Untitled Note";

/// Maximum number of characters kept from a heading
pub const TITLE_MAX_CHARS: usize = 30;

pub const WELCOME_TITLE: &str = "Welcome to Markdown Studio";

pub const WELCOME_CONTENT: &str = "# Welcome to Markdown Studio\n\n\
A zero-backend Markdown workspace. A quick tour:\n\n\
## [Features]{#3b82f6}\n\n\
* **PDF export:** print any note straight to a vector PDF.\n\
* **Colors:** write `[Text]{red}` to color a phrase.\n\
* **Alignment:** start a line with `/center`, `/right`, `/left` or `/justify`.\n\
* **Cloud sync:** log in with a GitHub token and notes follow you everywhere.\n\
* **Sharing:** in cloud mode, share a note with an expiring link.\n\n\
```rust\nfn main() {\n    println!(\"Hello from Markdown Studio\");\n}\n```\n\n\
> Start typing, or create a new note from the notes list.";

/// A Markdown note
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    /// Version token (blob SHA for cloud notes, local UUID otherwise)
    pub id: String,
    /// Location in the remote store, assigned on the first cloud write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Display title derived from the content
    pub title: String,
    /// Raw Markdown body
    pub content: String,
}

impl Note {
    /// Create a local note; the title is derived from the content
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: new_local_id(),
            path: None,
            title: extract_title(&content),
            content,
        }
    }

    /// Create a local note with an explicit title
    pub fn with_title(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_local_id(),
            path: None,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Replace the body and re-derive the title
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.title = extract_title(&self.content);
    }

    /// Stable handle for this note
    pub fn note_ref(&self) -> NoteRef {
        match self.path {
            Some(ref path) => NoteRef::Path(path.clone()),
            None => NoteRef::Id(self.id.clone()),
        }
    }

    /// Whether the note has been written to the remote store
    pub fn is_remote(&self) -> bool {
        self.path.is_some()
    }

    pub fn matches(&self, note_ref: &NoteRef) -> bool {
        match note_ref {
            NoteRef::Path(path) => self.path.as_deref() == Some(path.as_str()),
            NoteRef::Id(id) => self.path.is_none() && self.id == *id,
        }
    }
}

/// Stable reference to a note across remote rewrites
///
/// Path once assigned, the local id before that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum NoteRef {
    Path(String),
    Id(String),
}

impl fmt::Display for NoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteRef::Path(p) => write!(f, "path:{}", p),
            NoteRef::Id(id) => write!(f, "id:{}", id),
        }
    }
}

/// Ordered notes plus the active pointer
///
/// Newest notes come first. The collection is never empty: deleting the last
/// note leaves an "Untitled Note" placeholder behind.
///
/// Notes are addressed by [`NoteRef`]. Two cloud notes with the same body
/// share a version token, so an id alone cannot tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredCollection", into = "StoredCollection")]
pub struct NoteCollection {
    notes: Vec<Note>,
    active: NoteRef,
}

/// On-disk shape: `activeNoteId` as written by older versions, plus the
/// active path when there is one
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCollection {
    notes: Vec<Note>,
    active_note_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_path: Option<String>,
}

impl From<StoredCollection> for NoteCollection {
    fn from(stored: StoredCollection) -> Self {
        let active = match stored.active_path {
            Some(path) => NoteRef::Path(path),
            None => stored
                .notes
                .iter()
                .find(|n| n.id == stored.active_note_id)
                .map(Note::note_ref)
                .unwrap_or(NoteRef::Id(stored.active_note_id)),
        };
        Self {
            notes: stored.notes,
            active,
        }
    }
}

impl From<NoteCollection> for StoredCollection {
    fn from(collection: NoteCollection) -> Self {
        let active = collection.active();
        Self {
            active_note_id: active.id.clone(),
            active_path: active.path.clone(),
            notes: collection.notes,
        }
    }
}

impl NoteCollection {
    /// Collection holding the welcome note
    pub fn with_welcome() -> Self {
        Self::single(Note::with_title(WELCOME_TITLE, WELCOME_CONTENT))
    }

    /// Collection holding one note, which becomes active
    pub fn single(note: Note) -> Self {
        Self {
            active: note.note_ref(),
            notes: vec![note],
        }
    }

    /// Build from a list of notes
    ///
    /// Returns `None` for an empty list. The active pointer falls back to the
    /// first note when `active` does not resolve.
    pub fn from_notes(notes: Vec<Note>, active: Option<&NoteRef>) -> Option<Self> {
        let first = notes.first()?.note_ref();
        let active = active
            .filter(|r| notes.iter().any(|n| n.matches(r)))
            .cloned()
            .unwrap_or(first);
        Some(Self { notes, active })
    }

    /// Restore the invariants after deserializing untrusted data
    pub fn repaired(self) -> Self {
        let active = self.active.clone();
        Self::from_notes(self.notes, Some(&active)).unwrap_or_else(Self::placeholder)
    }

    fn placeholder() -> Self {
        Self::single(placeholder_note())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Always false for a well-formed collection
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn active_ref(&self) -> &NoteRef {
        &self.active
    }

    /// Version token of the active note
    pub fn active_id(&self) -> &str {
        &self.active().id
    }

    pub fn is_active(&self, note: &Note) -> bool {
        note.matches(&self.active)
    }

    pub fn active(&self) -> &Note {
        self.find(&self.active).unwrap_or(&self.notes[0])
    }

    pub fn active_mut(&mut self) -> &mut Note {
        let idx = self.position(&self.active).unwrap_or(0);
        &mut self.notes[idx]
    }

    pub fn find(&self, note_ref: &NoteRef) -> Option<&Note> {
        self.notes.iter().find(|n| n.matches(note_ref))
    }

    pub fn find_mut(&mut self, note_ref: &NoteRef) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.matches(note_ref))
    }

    pub fn find_by_path(&self, path: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.path.as_deref() == Some(path))
    }

    fn position(&self, note_ref: &NoteRef) -> Option<usize> {
        self.notes.iter().position(|n| n.matches(note_ref))
    }

    /// Make a note active; returns false when the note is unknown
    pub fn select(&mut self, note_ref: &NoteRef) -> bool {
        if self.find(note_ref).is_some() {
            self.active = note_ref.clone();
            true
        } else {
            false
        }
    }

    /// Prepend a note and make it active
    pub fn prepend(&mut self, note: Note) -> &Note {
        self.active = note.note_ref();
        self.notes.insert(0, note);
        &self.notes[0]
    }

    /// Append a note at the end, leaving the active pointer alone
    pub fn append(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Create a note from a name, prepend it and make it active
    pub fn create(&mut self, name: &str) -> &Note {
        let name = name.trim();
        let name = if name.is_empty() { UNTITLED } else { name };
        let content = format!("# {}\n\nStart typing here...", name);
        self.prepend(Note::with_title(name, content))
    }

    /// Import a file's content as a new active note
    pub fn import(&mut self, file_name: &str, content: impl Into<String>) -> &Note {
        let title = file_name
            .strip_suffix(".md")
            .or_else(|| file_name.strip_suffix(".txt"))
            .unwrap_or(file_name);
        self.prepend(Note::with_title(title, content))
    }

    /// Delete a note
    ///
    /// When the active note is removed, its predecessor becomes active.
    /// Deleting the only note replaces it with a fresh placeholder.
    /// Returns the removed note.
    pub fn delete(&mut self, note_ref: &NoteRef) -> Option<Note> {
        let idx = self.position(note_ref)?;

        if self.notes.len() == 1 {
            let removed = self.notes.remove(0);
            *self = Self::placeholder();
            return Some(removed);
        }

        let was_active = self.notes[idx].matches(&self.active);
        let removed = self.notes.remove(idx);
        if was_active {
            self.active = self.notes[idx.saturating_sub(1)].note_ref();
        }
        Some(removed)
    }

    /// Record a remote write of a note: its path and new version token
    ///
    /// The active pointer follows the note when its ref changes. Returns
    /// the note's ref after the update.
    pub fn record_version(
        &mut self,
        target: &NoteRef,
        path: &str,
        version: &str,
    ) -> Option<NoteRef> {
        let was_active = self.find(target)?.matches(&self.active);
        let note = self.find_mut(target)?;
        note.path = Some(path.to_string());
        note.id = version.to_string();
        let updated = note.note_ref();
        if was_active {
            self.active = updated.clone();
        }
        Some(updated)
    }
}

/// Persistence mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Cloud,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            // "github" is what older installs persisted
            "cloud" | "github" => Ok(Mode::Cloud),
            other => Err(format!("unknown mode '{}', expected 'local' or 'cloud'", other)),
        }
    }
}

/// Derive the display title of a note
///
/// Uses the first Markdown heading, strips `[Text]{color}` markup and keeps
/// at most 30 characters (an ellipsis marks truncation). Falls back to
/// "Untitled Note".
pub fn extract_title(content: &str) -> String {
    title_from_heading(content).unwrap_or_else(|| UNTITLED.to_string())
}

/// Title from the first heading line, if there is one
pub fn title_from_heading(content: &str) -> Option<String> {
    let heading = first_heading(content)?;
    let text = strip_color_markup(heading);
    if text.is_empty() {
        return None;
    }
    Some(truncate_title(&text))
}

/// Text of the first `#`-prefixed heading line
fn first_heading(content: &str) -> Option<&str> {
    content.lines().find_map(|line| {
        let rest = line.trim_start_matches('#');
        if rest.len() == line.len() {
            return None;
        }
        // At least one whitespace character must separate the hashes
        let text = rest.strip_prefix([' ', '\t'])?;
        Some(text.trim_start_matches([' ', '\t']).trim_end())
    })
}

fn color_markup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\s*\{\s*[a-zA-Z0-9#]+\s*\}").expect("color markup pattern")
    })
}

/// Replace `[Text]{color}` with `Text`
pub fn strip_color_markup(text: &str) -> String {
    color_markup().replace_all(text, "$1").into_owned()
}

fn truncate_title(text: &str) -> String {
    if text.chars().count() > TITLE_MAX_CHARS {
        let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// File-name friendly slug: lowercase, every non-alphanumeric ASCII char becomes `_`
pub fn slugify(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

fn new_local_id() -> String {
    Uuid::new_v4().to_string()
}

fn placeholder_note() -> Note {
    Note::with_title(UNTITLED, format!("# {}\n", UNTITLED))
}

//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use mdstudio_core::{Note, NoteCollection, NoteRef};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single note with its body
    pub fn print_note(&self, note: &Note) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:    {}", note.id);
                println!("Title: {}", note.title);
                println!("Path:  {}", note.path.as_deref().unwrap_or("(not synced)"));
                println!("────────────────────────────────────────");
                println!("{}", note.content);
            }
            OutputFormat::Json => {
                println!("{}", serde_json::json!(note));
            }
            OutputFormat::Quiet => {
                println!("{}", note.id);
            }
        }
    }

    /// Print the note list, marking the active note and unpushed edits
    pub fn print_notes(&self, notes: &NoteCollection, pending: &[NoteRef]) {
        match self.format {
            OutputFormat::Human => {
                for note in notes.notes() {
                    let marker = if notes.is_active(note) { "*" } else { " " };
                    let sync = if pending.iter().any(|r| note.matches(r)) {
                        " (pending)"
                    } else {
                        ""
                    };
                    println!(
                        "{} {} | {}{} | {}",
                        marker,
                        short_id(&note.id),
                        truncate(&note.title, 35),
                        sync,
                        note.path.as_deref().unwrap_or("-")
                    );
                }
                println!("\n{} note(s)", notes.len());
            }
            OutputFormat::Json => {
                let json_notes: Vec<_> = notes
                    .notes()
                    .iter()
                    .map(|n| {
                        serde_json::json!({
                            "id": n.id,
                            "path": n.path,
                            "title": n.title,
                            "active": notes.is_active(n),
                            "pending": pending.iter().any(|r| n.matches(r)),
                        })
                    })
                    .collect();
                println!("{}", serde_json::Value::Array(json_notes));
            }
            OutputFormat::Quiet => {
                for note in notes.notes() {
                    println!("{}", note.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a value scripts care about (URLs, ids); shown even when quiet
    pub fn value(&self, key: &str, value: &str) {
        match self.format {
            OutputFormat::Human | OutputFormat::Quiet => println!("{}", value),
            OutputFormat::Json => {
                let mut object = serde_json::Map::new();
                object.insert(key.to_string(), serde_json::Value::from(value));
                println!("{}", serde_json::Value::Object(object));
            }
        }
    }

    /// Warnings go to stderr and are dropped in quiet mode
    pub fn warn(&self, message: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", message);
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate to `max_chars` characters, adding "..." if truncated
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        // Counts characters, not bytes
        assert_eq!(truncate("🖤🖤🖤🖤🖤🖤", 5), "🖤🖤...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("v1"), "v1");
    }
}

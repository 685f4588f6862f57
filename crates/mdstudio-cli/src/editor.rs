//! Interactive editing support
//!
//! Opens $EDITOR on a temporary Markdown file and asks y/N questions.

use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::Command;

/// Open `initial_content` in the user's editor and return the saved text
///
/// Editor values with arguments (`code --wait`) are supported.
pub fn edit_text(initial_content: &str) -> Result<String> {
    let editor = find_editor()?;
    let (program, args) = split_command(&editor)?;

    let mut file = tempfile::Builder::new()
        .prefix("mdstudio_")
        .suffix(".md")
        .tempfile()
        .context("Failed to create temp file")?;
    file.write_all(initial_content.as_bytes())
        .context("Failed to write temp file")?;
    file.flush()?;

    let status = Command::new(program)
        .args(args)
        .arg(file.path())
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;
    if !status.success() {
        bail!("Editor '{}' exited with {}", editor, status);
    }

    // Editors often replace the file, so read by path
    fs::read_to_string(file.path())
        .with_context(|| format!("Failed to read edited file: {:?}", file.path()))
}

fn split_command(command: &str) -> Result<(&str, Vec<&str>)> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some(program) => Ok((program, parts.collect())),
        None => bail!("Editor command is empty"),
    }
}

/// $EDITOR, then $VISUAL, then the first common editor on PATH
fn find_editor() -> Result<String> {
    let from_env = ["EDITOR", "VISUAL"]
        .into_iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty());
    if let Some(editor) = from_env {
        return Ok(editor);
    }

    ["nano", "vim", "vi", "notepad"]
        .into_iter()
        .find(|e| command_exists(e))
        .map(str::to_string)
        .context("No editor found. Set $EDITOR, e.g. export EDITOR=nano")
}

/// Check if a command exists in PATH
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Prompt for confirmation
///
/// Without a TTY on stdin the answer is always no.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(is_yes(&input))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_split_command() {
        let (program, args) = split_command("code --wait").unwrap();
        assert_eq!(program, "code");
        assert_eq!(args, vec!["--wait"]);
        assert!(split_command("   ").is_err());
    }

    #[test]
    fn test_command_exists() {
        #[cfg(unix)]
        assert!(command_exists("ls"));

        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }
}

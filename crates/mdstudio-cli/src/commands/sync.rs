//! Sync command handlers

use anyhow::{bail, Result};
use tracing::debug;

use mdstudio_core::Mode;

use super::Engine;
use crate::output::Output;

/// Pull the remote listing and push everything pending
pub async fn sync(engine: &mut Engine, output: &Output) -> Result<()> {
    if engine.mode() != Mode::Cloud {
        bail!(
            "Sync is only available in GitHub mode. Enable it with:\n  \
             mdstudio login <token>\n  \
             mdstudio mode cloud"
        );
    }

    output.message("Connecting to GitHub...");
    engine.connect().await?;

    let report = engine.refresh().await?;
    let pushed = engine.flush().await?;

    output.success(&format!(
        "Sync complete: {} new from GitHub, {} pushed",
        report.added, pushed
    ));
    output.message(&format!("  Status: {}", engine.state().label()));
    Ok(())
}

/// Connect before a command runs
///
/// Failures are reported but never abort the command. A rejected token
/// has switched the engine to local storage by then; otherwise it keeps
/// working from the cached copy.
pub async fn auto_connect(engine: &mut Engine, output: &Output) {
    if engine.mode() != Mode::Cloud {
        return;
    }
    if let Err(e) = engine.connect().await {
        output.warn(&connect_warning(engine.mode(), &e.to_string()));
    }
}

fn connect_warning(mode: Mode, error: &str) -> String {
    match mode {
        Mode::Local => format!("GitHub unavailable, switched to local storage: {}", error),
        Mode::Cloud => format!(
            "GitHub unreachable, working from the cached copy. Edits sync on the next connection: {}",
            error
        ),
    }
}

/// Push pending edits after a command ran
pub async fn auto_push(engine: &mut Engine, output: &Output) {
    if engine.mode() != Mode::Cloud || engine.pending().is_empty() {
        return;
    }
    match engine.flush().await {
        Ok(pushed) => debug!("Pushed {} note(s)", pushed),
        Err(e) => output.warn(&format!(
            "Auto-sync failed, changes are saved locally and will be pushed later: {}",
            e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_warning_names_where_edits_go() {
        assert!(connect_warning(Mode::Local, "401").contains("switched to local storage"));
        let offline = connect_warning(Mode::Cloud, "502 Bad Gateway");
        assert!(offline.contains("cached copy"));
        assert!(offline.ends_with("502 Bad Gateway"));
    }
}

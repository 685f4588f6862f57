//! Mode and credential handlers

use anyhow::{bail, Result};

use mdstudio_core::{Mode, SyncError};

use super::Engine;
use crate::output::Output;

/// Print the current mode
pub fn show(engine: &Engine, output: &Output) -> Result<()> {
    output.value("mode", engine.mode().as_str());
    Ok(())
}

/// Switch between local and cloud mode
pub async fn set(engine: &mut Engine, mode: &str, output: &Output) -> Result<()> {
    let mode: Mode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    match mode {
        Mode::Local => {
            engine.switch_to_local()?;
            output.success("Switched to local storage");
        }
        Mode::Cloud => match engine.switch_to_cloud().await {
            Ok(report) => output.success(&format!(
                "Switched to GitHub mode ({} notes, {} new from GitHub)",
                engine.notes().len(),
                report.added
            )),
            Err(SyncError::CredentialRequired) => {
                bail!("No GitHub token stored. Log in first:\n  mdstudio login <token>")
            }
            // Unreachable remote: still in GitHub mode, on the cached copy
            Err(e) if engine.mode() == Mode::Cloud => {
                output.warn(&format!("GitHub unreachable: {}", e));
                output.success("Switched to GitHub mode, working offline until GitHub is reachable");
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Could not switch to GitHub mode")),
        },
    }
    Ok(())
}

/// Store a GitHub token
pub async fn login(engine: &mut Engine, token: String, output: &Output) -> Result<()> {
    match engine.login(&token).await {
        Ok(()) => {}
        Err(e) if !e.is_auth() && engine.mode() == Mode::Cloud => {
            output.warn(&format!("Token saved, but GitHub is unreachable: {}", e));
            return Ok(());
        }
        Err(e) => return Err(anyhow::Error::new(e).context("GitHub rejected the login")),
    }

    if engine.mode() == Mode::Cloud {
        output.success("Logged in and connected to GitHub");
    } else {
        output.success("Token saved. Switch to GitHub mode with: mdstudio mode cloud");
    }
    Ok(())
}

pub fn logout(engine: &mut Engine, output: &Output) -> Result<()> {
    engine.logout()?;
    output.success("Logged out; notes are kept in local storage");
    Ok(())
}

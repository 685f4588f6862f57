//! Status command handler

use anyhow::Result;

use mdstudio_core::{Config, Mode};

use super::Engine;
use crate::output::{Output, OutputFormat};

/// Show mode, sync state and note counts
pub fn show(engine: &Engine, config: &Config, output: &Output) -> Result<()> {
    let has_credential = engine.store().credential()?.is_some();
    let state = engine.state();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "mode": engine.mode().as_str(),
                    "state": state,
                    "status": state.label(),
                    "connected": engine.is_connected(),
                    "logged_in": has_credential,
                    "repository": config.repo_name,
                    "data_dir": config.data_dir,
                    "notes": engine.notes().len(),
                    "pending": engine.pending().len(),
                    "active": {
                        "id": engine.active().id,
                        "title": engine.active().title,
                        "path": engine.active().path,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", state.label());
        }
        OutputFormat::Human => {
            println!("Markdown Studio Status");
            println!("======================");
            println!();
            println!("Mode:    {}", engine.mode());
            println!("Status:  {}", state.label());
            println!(
                "GitHub:  {}",
                match (has_credential, engine.is_connected()) {
                    (_, true) => "connected",
                    (true, false) => "token stored",
                    (false, false) => "not logged in",
                }
            );
            if engine.mode() == Mode::Cloud {
                println!("Repo:    {}", config.repo_name);
            }
            println!();
            println!("Notes:   {}", engine.notes().len());
            if !engine.pending().is_empty() {
                println!("Pending: {}", engine.pending().len());
            }
            println!("Active:  {}", engine.active().title);
            println!();
            println!("Storage: {}", config.store_dir().display());
        }
    }

    Ok(())
}

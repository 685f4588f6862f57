//! Share command handlers

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use mdstudio_core::share::fragment_link;
use mdstudio_core::{Config, KeyValueStore, ShareTokenService};

use super::Engine;
use crate::output::Output;

/// How the active note should be shared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    /// Expiring token link (GitHub mode)
    Token,
    /// Note embedded in the link itself
    Embed,
    /// Encrypted private paste (GitHub mode)
    Direct,
}

pub async fn share(
    engine: &mut Engine,
    config: &Config,
    kind: ShareKind,
    output: &Output,
) -> Result<()> {
    let url = match kind {
        ShareKind::Embed => fragment_link(config.editor_url(), &engine.active().content),
        ShareKind::Token => {
            // The note needs a path before a token can point at it
            engine.flush().await.context("Could not sync the note before sharing")?;
            let tokens = token_service(engine);
            engine.share_active(&tokens, &config.share_base_url)?
        }
        ShareKind::Direct => {
            let share = engine.share_direct().await?;
            share.url(&config.share_base_url)
        }
    };

    output.value("url", &url);
    if matches!(kind, ShareKind::Token) {
        output.message("Link expires in 24 hours.");
    }
    Ok(())
}

/// Print the note behind a share token or share URL
pub async fn open_shared(engine: &Engine, token: &str, output: &Output) -> Result<()> {
    let token = token_from_input(token);
    let tokens = token_service(engine);
    let note = engine.open_shared(&tokens, token).await?;
    output.print_note(&note);
    Ok(())
}

/// Save the note embedded in a link as a new active note
pub fn open_link(engine: &mut Engine, link: &str, output: &Output) -> Result<()> {
    let fragment = link.rsplit_once('#').map(|(_, f)| f).unwrap_or(link);
    let note = engine.import_shared_fragment(fragment)?;
    output.success(&format!("Shared document saved: {}", note.title));
    Ok(())
}

#[derive(Serialize)]
struct TokenRow<'a> {
    token: &'a str,
    path: Option<&'a str>,
    expires_at: DateTime<Utc>,
}

/// List unexpired share tokens
pub fn list_tokens(engine: &Engine, output: &Output) -> Result<()> {
    let tokens = token_service(engine).active_tokens()?;
    if output.is_json() {
        let rows: Vec<_> = tokens
            .iter()
            .map(|t| TokenRow {
                token: &t.token,
                path: t.path.as_deref(),
                expires_at: t.expires_at,
            })
            .collect();
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if tokens.is_empty() {
        output.message("No active share links.");
        return Ok(());
    }
    for t in &tokens {
        output.message(&format!(
            "{} | {} | expires {}",
            t.token,
            t.path.as_deref().unwrap_or("-"),
            t.expires_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
        ));
    }
    Ok(())
}

fn token_service(engine: &Engine) -> ShareTokenService {
    ShareTokenService::new(KeyValueStore::clone(engine.store().kv()))
}

/// Accept a bare token or a full `...?shared=<token>` URL
fn token_from_input(input: &str) -> &str {
    let input = input.trim();
    match input.split_once("shared=") {
        Some((_, rest)) => rest.split(['&', '#']).next().unwrap_or(rest),
        None => input,
    }
}

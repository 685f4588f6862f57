//! Markdown Studio CLI
//!
//! Command-line interface for Markdown Studio notes, stored locally or in a
//! private GitHub repository.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mdstudio_core::{Config, SyncEvent};

mod commands;
mod editor;
mod output;

use commands::share::ShareKind;
use commands::Engine;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "mdstudio")]
#[command(about = "Markdown Studio - notes on disk or in your GitHub repository")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show storage mode, sync status and notes
    Status,
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Show or switch storage mode (local, cloud)
    Mode {
        /// Mode to switch to
        mode: Option<String>,
    },
    /// Store a GitHub token and connect
    Login {
        /// Personal access token with repo scope
        token: String,
    },
    /// Forget the GitHub token and return to local storage
    Logout,
    /// Pull from GitHub and push pending edits
    Sync,
    /// Share the active note
    Share {
        /// Embed the note in the link (works offline)
        #[arg(long, conflicts_with = "direct")]
        embed: bool,
        /// Upload an encrypted copy as a private paste
        #[arg(long, conflicts_with = "embed")]
        direct: bool,
    },
    /// List active share links
    Links,
    /// Show the note behind a share token or link
    OpenShared {
        /// Token or share URL
        token: String,
    },
    /// Save the note embedded in a shared link
    OpenLink {
        /// Link (or just the part after '#')
        link: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Create a new note and make it active
    #[command(alias = "create")]
    New {
        /// Note name (defaults to "Untitled Note")
        name: Option<String>,
        /// Note body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// List all notes
    #[command(alias = "ls")]
    List,
    /// Print a note (the active one by default)
    Show {
        /// Note ID (full or prefix)
        id: Option<String>,
    },
    /// Make a note active
    Open {
        /// Note ID (full or prefix)
        id: String,
    },
    /// Edit a note (opens editor if no body is given)
    Edit {
        /// Note ID (full or prefix); the active note by default
        id: Option<String>,
        /// New body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID (full or prefix)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Import a Markdown or text file
    Import {
        /// File to import
        file: PathBuf,
    },
    /// Export a note's Markdown
    Export {
        /// Note ID (full or prefix); the active note by default
        id: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, api_url, repo_name, debounce_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the note store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())?;
    init_logging(&config);

    let mut engine = commands::open_engine(&config)?;
    let mut events = engine.take_events();

    // Mode and credential commands manage the connection themselves
    let manages_connection = matches!(
        &cli.command,
        Commands::Mode { .. } | Commands::Login { .. } | Commands::Logout | Commands::Sync
    );
    if !manages_connection {
        commands::sync::auto_connect(&mut engine, &output).await;
    }

    let is_write = matches!(
        &cli.command,
        Commands::Note {
            command: NoteCommands::New { .. }
                | NoteCommands::Edit { .. }
                | NoteCommands::Import { .. }
        } | Commands::OpenLink { .. }
            | Commands::Mode { mode: Some(_) }
            | Commands::Login { .. }
    );

    let result = run(cli.command, &mut engine, &config, &output).await;

    // Push changes right away instead of waiting out the debounce
    if is_write && result.is_ok() {
        commands::sync::auto_push(&mut engine, &output).await;
    }

    if let Some(events) = events.as_mut() {
        report_events(events, &output);
    }

    result
}

async fn run(command: Commands, engine: &mut Engine, config: &Config, output: &Output) -> Result<()> {
    match command {
        Commands::Status => commands::status::show(engine, config, output),
        Commands::Note { command } => handle_note_command(command, engine, output).await,
        Commands::Mode { mode: None } => commands::mode::show(engine, output),
        Commands::Mode { mode: Some(mode) } => commands::mode::set(engine, &mode, output).await,
        Commands::Login { token } => commands::mode::login(engine, token, output).await,
        Commands::Logout => commands::mode::logout(engine, output),
        Commands::Sync => commands::sync::sync(engine, output).await,
        Commands::Share { embed, direct } => {
            let kind = if embed {
                ShareKind::Embed
            } else if direct {
                ShareKind::Direct
            } else {
                ShareKind::Token
            };
            commands::share::share(engine, config, kind, output).await
        }
        Commands::Links => commands::share::list_tokens(engine, output),
        Commands::OpenShared { token } => {
            commands::share::open_shared(engine, &token, output).await
        }
        Commands::OpenLink { link } => commands::share::open_link(engine, &link, output),
        Commands::Config { .. } => unreachable!(), // Handled in main
    }
}

async fn handle_note_command(
    command: NoteCommands,
    engine: &mut Engine,
    output: &Output,
) -> Result<()> {
    match command {
        NoteCommands::New { name, body } => commands::note::create(engine, name, body, output),
        NoteCommands::List => commands::note::list(engine, output),
        NoteCommands::Show { id } => commands::note::show(engine, id, output),
        NoteCommands::Open { id } => commands::note::open(engine, id, output),
        NoteCommands::Edit { id, body } => commands::note::edit(engine, id, body, output),
        NoteCommands::Delete { id, yes } => commands::note::delete(engine, id, yes, output).await,
        NoteCommands::Import { file } => commands::note::import(engine, file, output),
        NoteCommands::Export { id, output: out } => {
            commands::note::export(engine, id, out, output)
        }
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Surface engine events that no command result already covers
fn report_events(events: &mut UnboundedReceiver<SyncEvent>, output: &Output) {
    while let Ok(event) = events.try_recv() {
        match event {
            SyncEvent::DeleteFailed(e) => {
                output.warn(&format!("Note removed locally but not from GitHub: {}", e))
            }
            SyncEvent::AuthRequired(e) => output.warn(&format!(
                "GitHub rejected the stored token ({}). Log in again with: mdstudio login <token>",
                e
            )),
            _ => {}
        }
    }
}

/// Initialize file logging when MDSTUDIO_LOG is set
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("MDSTUDIO_LOG") else {
        return;
    };

    let log_path = config.log_path();
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "mdstudio_core={},mdstudio_cli={}",
        log_level, log_level
    ));

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}

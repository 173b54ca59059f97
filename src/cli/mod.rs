use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{HttpClient, NotesApi};
use crate::config::ConfigLoader;
use crate::session::{SessionHandle, SessionStore};
use crate::store::{NoteStore, StoreError};

pub mod commands;

use self::commands::{
    AddArgs, CategoryArgs, EditArgs, ListArgs, LoginArgs, MoveArgs, NoteIdArgs, PublicArgs,
    RegisterArgs, Runtime, ThemeArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "notes",
    version,
    about = "Command-line client for a REST note service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTES_CLIENT_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the state directory holding the session (takes precedence over NOTES_CLIENT_STATE)
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and remember the session token
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Forget the stored session
    Logout,
    /// Print the logged-in user
    Whoami,
    /// List notes, pinned first (default)
    List(ListArgs),
    /// Print one note in full
    Show(NoteIdArgs),
    /// Create a note
    Add(AddArgs),
    /// Change fields of a note
    Edit(EditArgs),
    /// Move a note to the trash
    Trash(NoteIdArgs),
    /// Delete a note without going through the trash
    Delete(NoteIdArgs),
    /// List trashed notes with the time left before purge
    TrashList,
    /// Bring a note back from the trash
    Restore(NoteIdArgs),
    /// Permanently delete a trashed note
    Purge(NoteIdArgs),
    /// Permanently delete every trashed note
    EmptyTrash,
    /// Restore every trashed note
    RestoreAll,
    /// Pin or unpin a note
    Pin(NoteIdArgs),
    /// Move an unpinned note into another note's slot
    Move(MoveArgs),
    /// Create a public share link for a note
    Share(NoteIdArgs),
    /// Fetch a shared note without logging in
    Public(PublicArgs),
    /// Manage categories
    Category(CategoryArgs),
    /// Show tag usage counts
    Tags,
    /// Summarize notes by privacy, category and tag
    Stats,
    /// Show or change the color theme
    Theme(ThemeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NOTES_CLIENT_CONFIG", path);
    }
    if let Some(path) = &cli.state_dir {
        env::set_var("NOTES_CLIENT_STATE", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);

    let sessions = SessionStore::new(loader.paths());
    let session = sessions.load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable session file");
        None
    });
    let handle = SessionHandle::new(session);
    let api = HttpClient::new(&config.api, handle.clone()).context("building HTTP client")?;
    tracing::debug!(base_url = api.base_url(), "using note service");
    let store = NoteStore::new(api, handle, &config);
    let mut runtime = Runtime::new(config, sessions, store);

    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));
    let output = match dispatch(&mut runtime, command) {
        Ok(output) => output,
        Err(err) => {
            if is_session_expired(&err) {
                runtime.sessions.clear()?;
            }
            return Err(err);
        }
    };
    print!("{output}");
    Ok(())
}

fn dispatch<A: NotesApi>(rt: &mut Runtime<A>, command: Commands) -> Result<String> {
    match command {
        Commands::Login(args) => commands::login(rt, args),
        Commands::Register(args) => commands::register(rt, args),
        Commands::Logout => commands::logout(rt),
        Commands::Whoami => commands::whoami(rt),
        Commands::List(args) => commands::list_notes(rt, args),
        Commands::Show(args) => commands::show_note(rt, args),
        Commands::Add(args) => commands::add_note(rt, args),
        Commands::Edit(args) => commands::edit_note(rt, args),
        Commands::Trash(args) => commands::trash_note(rt, args),
        Commands::Delete(args) => commands::delete_note(rt, args),
        Commands::TrashList => commands::list_trash(rt),
        Commands::Restore(args) => commands::restore_note(rt, args),
        Commands::Purge(args) => commands::purge_note(rt, args),
        Commands::EmptyTrash => commands::empty_trash(rt),
        Commands::RestoreAll => commands::restore_all(rt),
        Commands::Pin(args) => commands::toggle_pin(rt, args),
        Commands::Move(args) => commands::move_note(rt, args),
        Commands::Share(args) => commands::share_note(rt, args),
        Commands::Public(args) => commands::public_note(rt, args),
        Commands::Category(args) => commands::handle_category_command(rt, args),
        Commands::Tags => commands::list_tags(rt),
        Commands::Stats => commands::show_stats(rt),
        Commands::Theme(args) => commands::handle_theme_command(rt, args),
    }
}

fn is_session_expired(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StoreError>(),
            Some(StoreError::SessionExpired)
        )
    })
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}

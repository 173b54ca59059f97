use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::api::{Category, Note, NoteDraft, NotePatch, NotesApi, TagCount};
use crate::auth::{self, LoginForm, RegisterForm};
use crate::config::{AppConfig, ThemeName};
use crate::session::SessionStore;
use crate::store::{NoteStats, NoteStore, TrashCountdown};

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    /// Username or email (prompted if omitted)
    #[arg()]
    pub username: Option<String>,
    /// Password (prompted if omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    /// Account name (prompted if omitted)
    #[arg()]
    pub username: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    /// Repeat of --password (prompted if omitted)
    #[arg(long)]
    pub confirm: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only show notes carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Only show notes in this category id
    #[arg(long)]
    pub category: Option<i64>,
    /// Server-side search over title, content and tags
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct NoteIdArgs {
    /// Note identifier
    pub id: i64,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub content: Option<String>,
    /// Tags, comma or space separated; may be repeated
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Category id
    #[arg(long)]
    pub category: Option<i64>,
    /// Hide the note from public sharing
    #[arg(long)]
    pub private: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    /// Replaces the tag list; may be repeated
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
    #[arg(long)]
    pub category: Option<i64>,
    /// Remove the note from its category
    #[arg(long, conflicts_with = "category")]
    pub no_category: bool,
    #[arg(long)]
    pub private: bool,
    #[arg(long, conflicts_with = "private")]
    pub public: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MoveArgs {
    /// Note being dragged
    pub id: i64,
    /// Note whose slot it takes
    #[arg(long)]
    pub onto: i64,
}

#[derive(Args, Debug, Clone)]
pub struct PublicArgs {
    /// Share identifier printed by `share`
    pub share_uuid: Uuid,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories
    List,
    /// Create a category
    Add(CategoryAddArgs),
    /// Rename or recolor a category
    Edit(CategoryEditArgs),
    /// Delete a category; its notes become uncategorized
    Delete(CategoryIdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommand,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryAddArgs {
    pub name: String,
    /// Hex color, `#rrggbb`
    #[arg(long, default_value = crate::api::models::DEFAULT_CATEGORY_COLOR)]
    pub color: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryEditArgs {
    /// Category identifier
    pub id: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryIdArgs {
    /// Category identifier
    pub id: i64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ThemeCommand {
    /// Print the active theme
    Show,
    /// Switch between light and dark
    Toggle,
    /// Pick a theme explicitly
    Set { theme: ThemeName },
}

#[derive(Args, Debug, Clone)]
pub struct ThemeArgs {
    #[command(subcommand)]
    pub command: ThemeCommand,
}

/// Everything a command needs: config, the on-disk session store and the note store.
pub struct Runtime<A> {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub store: NoteStore<A>,
}

impl<A: NotesApi> Runtime<A> {
    pub fn new(config: Arc<AppConfig>, sessions: SessionStore, store: NoteStore<A>) -> Self {
        Self {
            config,
            sessions,
            store,
        }
    }

    fn require_session(&self) -> Result<()> {
        if !self.store.session().is_active() {
            bail!("not logged in, run `notes login` first");
        }
        Ok(())
    }

    fn loaded(&mut self) -> Result<&mut NoteStore<A>> {
        self.require_session()?;
        self.store.reload().context("loading notes")?;
        Ok(&mut self.store)
    }

    fn loaded_trash(&mut self) -> Result<&mut NoteStore<A>> {
        self.require_session()?;
        self.store.reload_trash().context("loading trash")?;
        Ok(&mut self.store)
    }

    fn status(&self, fallback: &str) -> String {
        let message = self.store.status_message().unwrap_or(fallback);
        format!("{message}\n")
    }
}

pub fn login<A: NotesApi>(rt: &mut Runtime<A>, args: LoginArgs) -> Result<String> {
    let username = match args.username {
        Some(name) => name,
        None => prompt("Username")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt("Password")?,
    };
    let form = LoginForm { username, password };
    let session = auth::login(rt.store.api(), rt.store.session(), &form)?;
    rt.sessions.save(&session).context("saving session")?;
    let role = if session.is_admin { " (admin)" } else { "" };
    Ok(format!("Logged in as {}{role}\n", session.username))
}

pub fn register<A: NotesApi>(rt: &mut Runtime<A>, args: RegisterArgs) -> Result<String> {
    let form = RegisterForm {
        username: value_or_prompt(args.username, "Username")?,
        email: value_or_prompt(args.email, "Email")?,
        password: value_or_prompt(args.password, "Password")?,
        password_confirm: value_or_prompt(args.confirm, "Confirm password")?,
    };
    auth::register(rt.store.api(), &form)?;
    Ok(format!(
        "Registered {}, log in with `notes login {}`\n",
        form.username.trim(),
        form.username.trim()
    ))
}

pub fn logout<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    let previous = rt.store.session().end();
    rt.sessions.clear()?;
    Ok(match previous {
        Some(session) => format!("Logged out {}\n", session.username),
        None => "No active session\n".to_string(),
    })
}

pub fn whoami<A: NotesApi>(rt: &Runtime<A>) -> Result<String> {
    Ok(match rt.store.session().current() {
        Some(session) if session.is_admin => format!("{} (admin)\n", session.username),
        Some(session) => format!("{}\n", session.username),
        None => "Not logged in\n".to_string(),
    })
}

pub fn list_notes<A: NotesApi>(rt: &mut Runtime<A>, args: ListArgs) -> Result<String> {
    rt.require_session()?;
    let store = &mut rt.store;
    let searched = match args.search.as_deref() {
        Some(term) => {
            store.set_search_input(term, Instant::now());
            store.flush_search().context("searching notes")?
        }
        None => false,
    };
    if !searched {
        store.reload().context("loading notes")?;
    }
    if args.tag.is_some() {
        store.select_tag(args.tag.as_deref());
    }
    if args.category.is_some() {
        store.select_category(args.category)?;
    }
    Ok(format_note_list(&store.visible_notes(), store.categories()))
}

pub fn show_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    let store = rt.loaded()?;
    let Some(note) = store.note(args.id) else {
        bail!("note #{} not found", args.id);
    };
    Ok(format_note_detail(note, store.categories()))
}

pub fn add_note<A: NotesApi>(rt: &mut Runtime<A>, args: AddArgs) -> Result<String> {
    rt.require_session()?;
    let title = value_or_prompt(args.title, "Title")?;
    let content = match args.content {
        Some(content) => content,
        None => read_stdin()?.unwrap_or_default(),
    };
    let store = rt.loaded()?;
    let created = store.add_note(NoteDraft {
        title,
        content,
        is_private: args.private,
        tags: args.tags,
        category: args.category,
    })?;
    Ok(format!("Created note #{}  {}\n", created.id, created.title))
}

pub fn edit_note<A: NotesApi>(rt: &mut Runtime<A>, args: EditArgs) -> Result<String> {
    let patch = NotePatch {
        title: args.title,
        content: args.content,
        is_private: if args.private {
            Some(true)
        } else if args.public {
            Some(false)
        } else {
            None
        },
        tags: if args.clear_tags {
            Some(Vec::new())
        } else if args.tags.is_empty() {
            None
        } else {
            Some(args.tags)
        },
        category: if args.no_category {
            Some(None)
        } else {
            args.category.map(Some)
        },
    };
    let store = rt.loaded()?;
    store.update_note(args.id, patch)?;
    Ok(rt.status("note updated"))
}

pub fn trash_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    rt.loaded()?.trash_note(args.id)?;
    Ok(rt.status("note moved to trash"))
}

pub fn delete_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    rt.loaded()?.delete_note(args.id)?;
    Ok(rt.status("note deleted"))
}

pub fn toggle_pin<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    rt.loaded()?.toggle_pin(args.id)?;
    Ok(rt.status("pin toggled"))
}

pub fn move_note<A: NotesApi>(rt: &mut Runtime<A>, args: MoveArgs) -> Result<String> {
    let moved = rt.loaded()?.move_note(args.id, args.onto)?;
    if !moved {
        return Ok("Order unchanged\n".to_string());
    }
    Ok(rt.status("note order saved"))
}

pub fn share_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    let link = rt.loaded()?.share_note(args.id)?;
    let mut out = format!("Shared note #{}\n    uuid  {}\n", args.id, link.share_uuid);
    if let Some(url) = link.url {
        let _ = writeln!(&mut out, "    url   {url}");
    }
    Ok(out)
}

pub fn public_note<A: NotesApi>(rt: &Runtime<A>, args: PublicArgs) -> Result<String> {
    let note = rt
        .store
        .api()
        .public_note(args.share_uuid)
        .with_context(|| format!("fetching shared note {}", args.share_uuid))?;
    Ok(format_note_detail(&note, &[]))
}

pub fn list_trash<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    let store = rt.loaded_trash()?;
    let now = OffsetDateTime::now_utc();
    let rows: Vec<(&Note, Option<TrashCountdown>)> = store
        .trash()
        .iter()
        .map(|note| (note, store.trash_countdown(note, now)))
        .collect();
    Ok(format_trash(&rows))
}

pub fn restore_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    rt.loaded_trash()?.restore_note(args.id)?;
    Ok(rt.status("note restored"))
}

pub fn purge_note<A: NotesApi>(rt: &mut Runtime<A>, args: NoteIdArgs) -> Result<String> {
    rt.loaded_trash()?.purge_note(args.id)?;
    Ok(rt.status("note deleted permanently"))
}

pub fn empty_trash<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    rt.loaded_trash()?.empty_trash()?;
    Ok(rt.status("trash emptied"))
}

pub fn restore_all<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    rt.loaded_trash()?.restore_all()?;
    Ok(rt.status("trash restored"))
}

pub fn handle_category_command<A: NotesApi>(
    rt: &mut Runtime<A>,
    args: CategoryArgs,
) -> Result<String> {
    let store = rt.loaded()?;
    match args.command {
        CategoryCommand::List => Ok(format_categories(store.categories(), &store.stats())),
        CategoryCommand::Add(args) => {
            let created = store.create_category(&args.name, &args.color)?;
            Ok(format!("Created category #{}  {}\n", created.id, created.name))
        }
        CategoryCommand::Edit(args) => {
            let Some(existing) = store.category(args.id).cloned() else {
                bail!("category #{} not found", args.id);
            };
            let name = args.name.unwrap_or(existing.name);
            let color = args.color.unwrap_or(existing.color);
            store.update_category(args.id, &name, &color)?;
            Ok(rt.status("category updated"))
        }
        CategoryCommand::Delete(args) => {
            store.delete_category(args.id)?;
            Ok(rt.status("category deleted"))
        }
    }
}

pub fn list_tags<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    let store = rt.loaded()?;
    Ok(format_tags(store.tags()))
}

pub fn show_stats<A: NotesApi>(rt: &mut Runtime<A>) -> Result<String> {
    let store = rt.loaded()?;
    Ok(format_stats(&store.stats()))
}

pub fn handle_theme_command<A: NotesApi>(rt: &mut Runtime<A>, args: ThemeArgs) -> Result<String> {
    let mut preferences = rt.sessions.load_preferences()?;
    let current = preferences.effective_theme(rt.config.theme);
    let next = match args.command {
        ThemeCommand::Show => return Ok(format!("{current}\n")),
        ThemeCommand::Toggle => current.toggled(),
        ThemeCommand::Set { theme } => theme,
    };
    preferences.theme = Some(next);
    rt.sessions
        .save_preferences(&preferences)
        .context("saving preferences")?;
    tracing::debug!(from = %current, to = %next, "theme changed");
    Ok(format!("Theme set to {next}\n"))
}

fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_note_list(notes: &[&Note], categories: &[Category]) -> String {
    if notes.is_empty() {
        return "No notes.\n".to_string();
    }
    let mut out = String::new();
    for note in notes {
        let mut headline = format!("#{}  {}", note.id, note.title);
        if note.is_pinned {
            headline.push_str("  [PINNED]");
        }
        if note.is_private {
            headline.push_str("  [PRIVATE]");
        }
        let _ = writeln!(&mut out, "{headline}");
        if let Some(name) = category_name(note, categories) {
            let _ = writeln!(&mut out, "    category {name}");
        }
        if !note.tags.is_empty() {
            let _ = writeln!(&mut out, "    tags     {}", format_tag_list(&note.tags));
        }
    }
    out
}

fn format_note_detail(note: &Note, categories: &[Category]) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}", note.id, note.title);
    let _ = writeln!(&mut out, "    owner    {}", note.owner_label());
    let _ = writeln!(&mut out, "    created  {}", format_timestamp(note.created_at));
    if let Some(updated) = note.updated_at {
        let _ = writeln!(&mut out, "    updated  {}", format_timestamp(updated));
    }
    let visibility = if note.is_private { "private" } else { "public" };
    let _ = writeln!(&mut out, "    access   {visibility}");
    if note.is_pinned {
        let _ = writeln!(&mut out, "    pinned");
    }
    if let Some(name) = category_name(note, categories) {
        let _ = writeln!(&mut out, "    category {name}");
    }
    if !note.tags.is_empty() {
        let _ = writeln!(&mut out, "    tags     {}", format_tag_list(&note.tags));
    }
    if let Some(uuid) = note.share_uuid {
        let _ = writeln!(&mut out, "    shared   {uuid}");
    }
    if !note.content.is_empty() {
        out.push('\n');
        out.push_str(note.content.trim_end());
        out.push('\n');
    }
    out
}

fn format_trash(rows: &[(&Note, Option<TrashCountdown>)]) -> String {
    if rows.is_empty() {
        return "Trash is empty.\n".to_string();
    }
    let mut out = String::new();
    for (note, countdown) in rows {
        let label = countdown
            .as_ref()
            .map(|countdown| countdown.label.as_str())
            .unwrap_or("unknown");
        let _ = writeln!(&mut out, "#{}  {}  ({label})", note.id, note.title);
    }
    out
}

fn format_categories(categories: &[Category], stats: &NoteStats) -> String {
    if categories.is_empty() {
        return "No categories.\n".to_string();
    }
    let mut out = String::new();
    for category in categories {
        let count = stats
            .categories
            .get(&category.id)
            .map(|usage| usage.count)
            .unwrap_or(0);
        let _ = writeln!(
            &mut out,
            "#{}  {}  {}  ({count} note{})",
            category.id,
            category.name,
            category.color,
            if count == 1 { "" } else { "s" }
        );
    }
    out
}

fn format_tags(tags: &[TagCount]) -> String {
    if tags.is_empty() {
        return "No tags.\n".to_string();
    }
    let mut out = String::new();
    for tag in tags {
        let _ = writeln!(&mut out, "#{}  {}", tag.name, tag.count);
    }
    out
}

fn format_stats(stats: &NoteStats) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "notes    {}", stats.total);
    let _ = writeln!(&mut out, "private  {}", stats.private);
    let _ = writeln!(&mut out, "public   {}", stats.public);
    if !stats.categories.is_empty() {
        let _ = writeln!(&mut out, "categories");
        for usage in stats.categories.values() {
            let _ = writeln!(&mut out, "    {}  {}", usage.name, usage.count);
        }
    }
    if !stats.tags.is_empty() {
        let _ = writeln!(&mut out, "tags");
        for tag in &stats.tags {
            let _ = writeln!(&mut out, "    #{}  {}", tag.name, tag.count);
        }
    }
    out
}

fn category_name<'a>(note: &Note, categories: &'a [Category]) -> Option<&'a str> {
    let id = note.category_id()?;
    categories
        .iter()
        .find(|category| category.id == id)
        .map(|category| category.name.as_str())
}

fn format_tag_list(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

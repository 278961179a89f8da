use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::config::Config;
use crate::error::AppError;
use crate::models::*;
use crate::repo::json::JsonFileStore;
use crate::repo::{Registry, RepoError, StatusChange};
use crate::storage::{Camera, CommandCamera, FsImageStore, ImageStore};

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "lostfound")]
#[command(about = "Lost & Found item registry")]
pub struct Cli {
    /// Data file (overrides LOSTFOUND_DATA_FILE)
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,
    /// Image folder (overrides LOSTFOUND_IMAGE_DIR)
    #[arg(long, global = true)]
    pub image_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Record a lost or found item
    Add(AddArgs),
    /// Browse items, optionally filtered
    List(ListArgs),
    /// Show every detail of one item
    Show(ShowArgs),
    /// Mark an item as Claimed
    Claim(StatusArgs),
    /// Put a claimed item back to Open
    Reopen(StatusArgs),
    /// Permanently remove an item and its image
    Delete(DeleteArgs),
    /// Print registry totals
    Stats,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long = "type", value_name = "lost|found")]
    pub kind: Option<ItemType>,
    #[arg(long, default_value = "")]
    pub poster: String,
    #[arg(long, default_value = "")]
    pub contact: String,
    #[arg(long, default_value = "")]
    pub password: String,
    /// Copy this picture into the image folder
    #[arg(long, conflicts_with = "capture")]
    pub image: Option<PathBuf>,
    /// Take a photo with the configured capture command
    #[arg(long)]
    pub capture: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long, value_name = "open|claimed")]
    pub status: Option<ItemStatus>,
    #[arg(long = "type", value_name = "lost|found")]
    pub kind: Option<ItemType>,
    #[arg(long)]
    pub search: Option<String>,
    /// Print matching items as JSON (passwords omitted)
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ShowArgs {
    pub name: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    pub name: String,
    #[arg(long, default_value = "")]
    pub password: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    pub name: String,
    #[arg(long, default_value = "")]
    pub password: String,
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

pub struct AppState {
    pub registry: Registry,
    pub camera: Option<Box<dyn Camera>>,
}

impl AppState {
    pub fn new(registry: Registry, camera: Option<Box<dyn Camera>>) -> Self {
        Self { registry, camera }
    }

    /// Wire the file-backed registry, image folder and camera from `cfg`.
    pub fn open(cfg: &Config) -> Result<Self, RepoError> {
        let images: Arc<dyn ImageStore> = Arc::new(FsImageStore::new(&cfg.image_dir));
        let registry = Registry::open(Box::new(JsonFileStore::new(&cfg.data_file)), images)?;
        let camera = cfg
            .capture_command
            .as_deref()
            .and_then(|c| CommandCamera::parse(c, cfg.capture_timeout))
            .map(|c| Box::new(c) as Box<dyn Camera>);
        Ok(Self::new(registry, camera))
    }
}

/// Run one command. `confirm` is asked before destructive actions.
pub fn execute(
    state: &mut AppState,
    command: Command,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> Result<String, AppError> {
    match command {
        Command::Add(args) => add_item(state, args),
        Command::List(args) => list_items(state, &args),
        Command::Show(args) => show_item(state, &args),
        Command::Claim(args) => change_status(state, &args, ItemStatus::Claimed),
        Command::Reopen(args) => change_status(state, &args, ItemStatus::Open),
        Command::Delete(args) => delete_item(state, &args, confirm),
        Command::Stats => Ok(render_statistics(&state.registry.statistics())),
    }
}

enum ImageSource {
    File(PathBuf),
    Camera,
}

// Image problems never block the add; they become a notice in the output.
fn obtain_image(state: &AppState, source: ImageSource) -> Result<String, String> {
    let images = state.registry.image_store();
    let result = match source {
        ImageSource::File(path) => images.import(&path),
        ImageSource::Camera => match state.camera.as_deref() {
            Some(cam) => cam.capture().and_then(|(bytes, ext)| images.save_capture(&bytes, &ext)),
            None => return Err("no capture command configured (set LOSTFOUND_CAPTURE_CMD)".into()),
        },
    };
    result.map_err(|e| e.to_string())
}

pub fn add_item(state: &mut AppState, args: AddArgs) -> Result<String, AppError> {
    let mut candidate = NewItem {
        name: args.name,
        description: args.description,
        kind: args.kind,
        poster: args.poster,
        contact: args.contact,
        password: args.password,
        image_path: None,
    };
    candidate.validate()?;

    let mut out = String::new();
    let source = match (args.image, args.capture) {
        (Some(path), _) => Some(ImageSource::File(path)),
        (None, true) => Some(ImageSource::Camera),
        (None, false) => None,
    };
    if let Some(source) = source {
        match obtain_image(state, source) {
            Ok(path) => candidate.image_path = Some(path),
            Err(reason) => {
                warn!("continuing without image: {reason}");
                let _ = writeln!(out, "Image could not be added ({reason}); continuing without image.");
            }
        }
    }

    let item = state.registry.add(candidate)?;
    let _ = writeln!(out, "Item added successfully!");
    if let Some(id) = &item.id {
        let _ = writeln!(out, "Id: {id}");
    }
    if let Some(path) = &item.image_path {
        let _ = writeln!(out, "Image: {path}");
    }
    Ok(out)
}

pub fn list_items(state: &AppState, args: &ListArgs) -> Result<String, AppError> {
    let filter = ItemFilter { status: args.status, kind: args.kind, search: args.search.clone() };
    let matches: Vec<&Item> = state.registry.list(&filter).collect();
    if args.json {
        let view: Vec<PublicItem<'_>> = matches.into_iter().map(PublicItem::from).collect();
        let text = serde_json::to_string_pretty(&view)
            .map_err(|e| AppError::Storage(e.to_string()))?;
        return Ok(text + "\n");
    }
    if matches.is_empty() {
        return Ok("No items found matching your criteria\n".into());
    }
    let cards: Vec<String> = matches.into_iter().map(render_card).collect();
    Ok(cards.join("\n"))
}

pub fn show_item(state: &AppState, args: &ShowArgs) -> Result<String, AppError> {
    let item = state.registry.find_by_name(&args.name)?;
    let images = state.registry.image_store();
    Ok(render_details(item, |p| images.exists(p)))
}

pub fn change_status(state: &mut AppState, args: &StatusArgs, status: ItemStatus) -> Result<String, AppError> {
    let change = state.registry.set_status(&args.name, &args.password, status)?;
    let name = change.item().name.clone();
    Ok(match (change, status) {
        (StatusChange::Unchanged(_), _) => format!("{name} is already marked as {status}.\n"),
        (StatusChange::Changed(_), ItemStatus::Claimed) => format!("{name} marked as Claimed successfully!\n"),
        (StatusChange::Changed(_), ItemStatus::Open) => format!("{name} reopened successfully!\n"),
    })
}

pub fn delete_item(
    state: &mut AppState,
    args: &DeleteArgs,
    confirm: &mut dyn FnMut(&str) -> bool,
) -> Result<String, AppError> {
    let item = state.registry.authorize(&args.name, &args.password)?;
    let prompt = format!("Are you sure you want to delete '{}'? This action cannot be undone.", item.name);
    if !args.yes && !confirm(&prompt) {
        return Err(AppError::Cancelled);
    }
    let removed = state.registry.delete(&args.name, &args.password)?;
    Ok(format!("Item '{}' deleted successfully!\n", removed.name))
}

fn preview(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let head: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn kind_label(item: &Item) -> &'static str {
    item.kind.map(|k| k.as_str()).unwrap_or("N/A")
}

fn created_label(item: &Item) -> String {
    item.created_at
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".into())
}

pub fn render_card(item: &Item) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}  [{}]", item.name, kind_label(item));
    let _ = writeln!(out, "  Status: {}", item.status);
    let description = if item.description.is_empty() { "No description provided" } else { &item.description };
    let _ = writeln!(out, "  Description: {}", preview(description));
    let _ = writeln!(out, "  Posted by: {}", item.poster);
    if !item.contact.is_empty() {
        let _ = writeln!(out, "  Contact: {}", item.contact);
    }
    let _ = writeln!(out, "  Created: {}", created_label(item));
    out
}

pub fn render_details(item: &Item, image_exists: impl Fn(&str) -> bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Item Details: {}", item.name);
    if let Some(id) = &item.id {
        let _ = writeln!(out, "Id: {id}");
    }
    let _ = writeln!(out, "Type: {}", kind_label(item));
    let _ = writeln!(out, "Status: {}", item.status);
    let _ = writeln!(out, "Posted by: {}", item.poster);
    let contact = if item.contact.is_empty() { "N/A" } else { &item.contact };
    let _ = writeln!(out, "Contact: {contact}");
    let _ = writeln!(out, "Created: {}", created_label(item));
    if let Some(updated) = item.updated_at {
        let _ = writeln!(out, "Updated: {}", updated.format("%Y-%m-%dT%H:%M:%S"));
    }
    if !item.description.is_empty() {
        let _ = writeln!(out, "Description:\n{}", item.description);
    }
    match item.image() {
        Some(path) if image_exists(path) => { let _ = writeln!(out, "Image: {path}"); }
        Some(path) => { let _ = writeln!(out, "Image: {path} (file missing)"); }
        None => { let _ = writeln!(out, "Image: none"); }
    }
    out
}

pub fn render_statistics(s: &Statistics) -> String {
    format!(
        "{} Total | {} Open | {} Claimed | {} Lost | {} Found | {} With Images\n",
        s.total, s.open, s.claimed, s.lost, s.found, s.with_images
    )
}

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, SubsecRound};
use tracing::{debug, info, warn};

use crate::models::*;
use crate::storage::ImageStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("cannot access '{path}': {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("data file '{path}' is not valid item data: {source}")]
    Corrupt { path: PathBuf, #[source] source: serde_json::Error },
    #[error("record #{index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: &'static str },
    #[error("cannot encode items: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("validation failed: {0}")] Validation(String),
    #[error("not found")] NotFound,
    #[error("unauthorized")] Unauthorized,
    #[error("storage error: {0}")] Storage(#[from] StoreError),
}

pub type RepoResult<T> = Result<T, RepoError>;

pub const REQUIRED_FIELDS_MSG: &str = "Item Name, Posted By, and Password are required.";
pub const REQUIRED_TYPE_MSG: &str = "Please select if this is a Lost or Found item.";
pub const REQUIRED_LOOKUP_MSG: &str = "Both Item Name and Password are required.";

/// Whole-collection persistence. Every save replaces the previous document.
pub trait ItemStore: Send + Sync {
    fn load(&self) -> Result<Vec<Item>, StoreError>;
    fn save(&self, items: &[Item]) -> Result<(), StoreError>;
}

pub mod json {
    use super::*;
    use serde::Serialize;
    use std::io::Write;
    use std::path::Path;

    pub const DEFAULT_DATA_FILE: &str = "lost_found.json";

    /// JSON array on disk, four-space indented, replaced via temp file + rename.
    #[derive(Debug, Clone)]
    pub struct JsonFileStore {
        path: PathBuf,
    }

    impl JsonFileStore {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn io_err(&self, source: std::io::Error) -> StoreError {
            StoreError::Io { path: self.path.clone(), source }
        }

        fn parent_dir(&self) -> PathBuf {
            match self.path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            }
        }
    }

    impl Default for JsonFileStore {
        fn default() -> Self { Self::new(DEFAULT_DATA_FILE) }
    }

    pub(crate) fn encode(items: &[Item]) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::new();
        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        items.serialize(&mut ser)?;
        Ok(buf)
    }

    impl ItemStore for JsonFileStore {
        fn load(&self) -> Result<Vec<Item>, StoreError> {
            let bytes = match std::fs::read(&self.path) {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    info!(path = %self.path.display(), "no data file yet, starting empty");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(self.io_err(e)),
            };
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Vec::new());
            }
            let items: Vec<Item> = serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })?;
            info!(path = %self.path.display(), count = items.len(), "loaded items");
            Ok(items)
        }

        fn save(&self, items: &[Item]) -> Result<(), StoreError> {
            let bytes = encode(items)?;
            let dir = self.parent_dir();
            std::fs::create_dir_all(&dir).map_err(|e| self.io_err(e))?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_err(e))?;
            tmp.write_all(&bytes).map_err(|e| self.io_err(e))?;
            tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
            // keep the mode of the document being replaced
            if let Ok(meta) = std::fs::metadata(&self.path) {
                tmp.as_file().set_permissions(meta.permissions()).map_err(|e| self.io_err(e))?;
            }
            tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
            debug!(path = %self.path.display(), count = items.len(), "persisted items");
            Ok(())
        }
    }
}

pub mod inmem {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Keeps the "persisted" copy in memory. Clones share the same backing state.
    #[derive(Clone, Default)]
    pub struct InMemStore {
        saved: Arc<Mutex<Vec<Item>>>,
        saves: Arc<AtomicUsize>,
    }

    impl InMemStore {
        pub fn new() -> Self { Self::default() }

        pub fn with_items(items: Vec<Item>) -> Self {
            Self { saved: Arc::new(Mutex::new(items)), saves: Arc::default() }
        }

        /// Last saved collection.
        pub fn snapshot(&self) -> Vec<Item> {
            self.saved.lock().map(|s| s.clone()).unwrap_or_default()
        }

        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl ItemStore for InMemStore {
        fn load(&self) -> Result<Vec<Item>, StoreError> {
            Ok(self.snapshot())
        }

        fn save(&self, items: &[Item]) -> Result<(), StoreError> {
            if let Ok(mut s) = self.saved.lock() {
                *s = items.to_vec();
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

/// Outcome of `Registry::set_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Changed(Item),
    /// Item was already in the requested state; nothing was written.
    Unchanged(Item),
}

impl StatusChange {
    pub fn item(&self) -> &Item {
        match self {
            StatusChange::Changed(i) | StatusChange::Unchanged(i) => i,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, StatusChange::Changed(_))
    }
}

impl NewItem {
    pub fn validate(&self) -> RepoResult<()> {
        if self.name.trim().is_empty() || self.poster.trim().is_empty() || self.password.is_empty() {
            return Err(RepoError::Validation(REQUIRED_FIELDS_MSG.into()));
        }
        if self.kind.is_none() {
            return Err(RepoError::Validation(REQUIRED_TYPE_MSG.into()));
        }
        Ok(())
    }
}

fn check_record(index: usize, item: &Item) -> Result<(), StoreError> {
    let reason = if item.name.is_empty() {
        "empty name"
    } else if item.poster.is_empty() {
        "empty poster"
    } else if item.password.is_empty() {
        "empty password"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidRecord { index, reason })
}

/// Current local time at microsecond precision, strictly after `prev`.
fn next_timestamp(prev: Option<NaiveDateTime>) -> NaiveDateTime {
    let now = Local::now().naive_local().trunc_subsecs(6);
    match prev {
        Some(p) if now <= p => p + Duration::microseconds(1),
        _ => now,
    }
}

/// Ordered, in-memory collection of items mirrored to an `ItemStore`.
///
/// Lookups by name are case-insensitive and resolve to the first match in
/// insertion order. Mutations persist the whole collection; when that write
/// fails the in-memory change is kept and the error is returned to the caller.
pub struct Registry {
    items: Vec<Item>,
    store: Box<dyn ItemStore>,
    images: Arc<dyn ImageStore>,
}

impl Registry {
    pub fn open(store: Box<dyn ItemStore>, images: Arc<dyn ImageStore>) -> RepoResult<Self> {
        let items = store.load()?;
        for (i, item) in items.iter().enumerate() {
            check_record(i, item)?;
        }
        Ok(Self { items, store, images })
    }

    pub fn persist(&self) -> RepoResult<()> {
        self.store.save(&self.items).map_err(|e| {
            warn!("failed to persist items: {e}");
            RepoError::from(e)
        })
    }

    pub fn add(&mut self, new: NewItem) -> RepoResult<Item> {
        new.validate()?;
        let now = next_timestamp(None);
        let item = Item {
            id: Some(uuid::Uuid::new_v4().to_string()),
            name: new.name.trim().to_string(),
            description: new.description.trim().to_string(),
            kind: new.kind,
            status: ItemStatus::Open,
            poster: new.poster.trim().to_string(),
            contact: new.contact.trim().to_string(),
            password: new.password,
            image_path: new.image_path.filter(|p| !p.is_empty()),
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.items.push(item.clone());
        debug!(id = ?item.id, name = %item.name, "item added");
        self.persist()?;
        Ok(item)
    }

    fn position_by_name(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.items.iter().position(|i| i.name.to_lowercase() == wanted)
    }

    pub fn find_by_name(&self, name: &str) -> RepoResult<&Item> {
        self.position_by_name(name)
            .map(|idx| &self.items[idx])
            .ok_or(RepoError::NotFound)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id.as_deref() == Some(id))
    }

    fn authorize_index(&self, name: &str, password: &str) -> RepoResult<usize> {
        if name.trim().is_empty() || password.is_empty() {
            return Err(RepoError::Validation(REQUIRED_LOOKUP_MSG.into()));
        }
        let idx = self.position_by_name(name).ok_or(RepoError::NotFound)?;
        if self.items[idx].password != password {
            return Err(RepoError::Unauthorized);
        }
        Ok(idx)
    }

    pub fn authorize(&self, name: &str, password: &str) -> RepoResult<&Item> {
        let idx = self.authorize_index(name, password)?;
        Ok(&self.items[idx])
    }

    pub fn set_status(&mut self, name: &str, password: &str, status: ItemStatus) -> RepoResult<StatusChange> {
        let idx = self.authorize_index(name, password)?;
        let item = &mut self.items[idx];
        if item.status == status {
            return Ok(StatusChange::Unchanged(item.clone()));
        }
        item.status = status;
        item.updated_at = Some(next_timestamp(item.updated_at));
        let updated = item.clone();
        debug!(name = %updated.name, %status, "status changed");
        self.persist()?;
        Ok(StatusChange::Changed(updated))
    }

    pub fn claim(&mut self, name: &str, password: &str) -> RepoResult<StatusChange> {
        self.set_status(name, password, ItemStatus::Claimed)
    }

    pub fn reopen(&mut self, name: &str, password: &str) -> RepoResult<StatusChange> {
        self.set_status(name, password, ItemStatus::Open)
    }

    pub fn delete(&mut self, name: &str, password: &str) -> RepoResult<Item> {
        let idx = self.authorize_index(name, password)?;
        let removed = self.items.remove(idx);
        if let Some(path) = removed.image() {
            // record removal proceeds regardless
            if let Err(e) = self.images.remove(path) {
                debug!(path, "ignoring image removal failure: {e}");
            }
        }
        debug!(name = %removed.name, "item deleted");
        self.persist()?;
        Ok(removed)
    }

    pub fn list<'a, 'f>(&'a self, filter: &'f ItemFilter) -> impl Iterator<Item = &'a Item> + 'f
    where
        'a: 'f,
    {
        self.items.iter().filter(move |i| filter.matches(i))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn image_store(&self) -> &Arc<dyn ImageStore> {
        &self.images
    }

    pub fn statistics(&self) -> Statistics {
        let mut s = Statistics { total: self.items.len(), ..Default::default() };
        for item in &self.items {
            match item.status {
                ItemStatus::Open => s.open += 1,
                ItemStatus::Claimed => s.claimed += 1,
            }
            match item.kind {
                Some(ItemType::Lost) => s.lost += 1,
                Some(ItemType::Found) => s.found += 1,
                None => {}
            }
            if item.image().is_some_and(|p| self.images.exists(p)) {
                s.with_images += 1;
            }
        }
        s
    }
}

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use lostfound::models::{ItemFilter, ItemStatus, ItemType, NewItem};
use lostfound::repo::inmem::InMemStore;
use lostfound::repo::{Registry, RepoError, StatusChange};
use lostfound::storage::{ImageStore, ImageStoreError};

// ---------------- In-memory mock ImageStore (tests only) ----------------
#[derive(Default)]
struct MockImageStore {
    files: Mutex<HashSet<String>>,
    fail_remove: bool,
}

impl MockImageStore {
    fn with_files(files: &[&str]) -> Self {
        Self { files: Mutex::new(files.iter().map(|s| s.to_string()).collect()), fail_remove: false }
    }
}

impl ImageStore for MockImageStore {
    fn import(&self, source: &Path) -> Result<String, ImageStoreError> {
        let p = format!("img/{}", source.file_name().unwrap().to_string_lossy());
        self.files.lock().unwrap().insert(p.clone());
        Ok(p)
    }
    fn save_capture(&self, _bytes: &[u8], ext: &str) -> Result<String, ImageStoreError> {
        let p = format!("img/captured.{ext}");
        self.files.lock().unwrap().insert(p.clone());
        Ok(p)
    }
    fn exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains(path)
    }
    fn remove(&self, path: &str) -> Result<(), ImageStoreError> {
        if self.fail_remove {
            return Err(ImageStoreError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Helper that returns a fresh, empty registry plus a handle on its store.
fn registry() -> (Registry, InMemStore) {
    registry_with_images(MockImageStore::default())
}

fn registry_with_images(images: MockImageStore) -> (Registry, InMemStore) {
    let store = InMemStore::new();
    let reg = Registry::open(Box::new(store.clone()), Arc::new(images)).unwrap();
    (reg, store)
}

fn new_item(name: &str, kind: ItemType, password: &str) -> NewItem {
    NewItem {
        name: name.into(),
        description: format!("{name} description"),
        kind: Some(kind),
        poster: "Ann".into(),
        contact: "ann@example.com".into(),
        password: password.into(),
        image_path: None,
    }
}

#[test]
fn add_rejects_missing_required_fields() {
    let (mut r, store) = registry();
    r.add(new_item("Wallet", ItemType::Lost, "pw")).unwrap();
    let before = store.snapshot();

    for broken in [
        NewItem { name: String::new(), ..new_item("x", ItemType::Lost, "pw") },
        NewItem { name: "   ".into(), ..new_item("x", ItemType::Lost, "pw") },
        NewItem { poster: String::new(), ..new_item("x", ItemType::Lost, "pw") },
        NewItem { password: String::new(), ..new_item("x", ItemType::Lost, "pw") },
        NewItem { kind: None, ..new_item("x", ItemType::Lost, "pw") },
    ] {
        let err = r.add(broken).unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    assert_eq!(r.len(), 1);
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.save_count(), 1);
}

#[test]
fn add_then_find_by_name() {
    let (mut r, store) = registry();
    let added = r.add(new_item("Blue Umbrella", ItemType::Found, "secret")).unwrap();

    assert_eq!(added.status, ItemStatus::Open);
    assert!(added.id.is_some());
    assert!(added.created_at.is_some());
    assert_eq!(added.created_at, added.updated_at);

    let found = r.find_by_name("blue umbrella").unwrap();
    assert_eq!(found, &added);
    assert_eq!(found.description, "Blue Umbrella description");
    assert_eq!(found.kind, Some(ItemType::Found));
    assert_eq!(r.get_by_id(added.id.as_deref().unwrap()), Some(&added));
    assert_eq!(store.snapshot(), vec![added]);
}

#[test]
fn add_trims_text_fields_and_allows_duplicates() {
    let (mut r, _) = registry();
    let a = r.add(NewItem { name: "  Keys ".into(), ..new_item("k", ItemType::Lost, "pw") }).unwrap();
    assert_eq!(a.name, "Keys");
    let b = r.add(new_item("keys", ItemType::Found, "other")).unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(r.len(), 2);
    assert_eq!(r.find_by_name(" KEYS ").unwrap().id, a.id);
}

#[test]
fn find_unknown_name_is_not_found() {
    let (r, _) = registry();
    assert!(matches!(r.find_by_name("ghost"), Err(RepoError::NotFound)));
}

#[test]
fn authorize_distinguishes_missing_and_wrong_password() {
    let (mut r, _) = registry();
    r.add(new_item("Phone", ItemType::Lost, "Secret")).unwrap();

    assert!(matches!(r.authorize("nothing", "Secret"), Err(RepoError::NotFound)));
    assert!(matches!(r.authorize("phone", "secret"), Err(RepoError::Unauthorized)));
    assert!(matches!(r.authorize("phone", ""), Err(RepoError::Validation(_))));
    assert_eq!(r.authorize("PHONE", "Secret").unwrap().name, "Phone");
}

#[test]
fn wrong_password_never_changes_status() {
    let (mut r, store) = registry();
    r.add(new_item("Phone", ItemType::Lost, "pw")).unwrap();
    let saves = store.save_count();

    let err = r.set_status("Phone", "PW", ItemStatus::Claimed).unwrap_err();
    assert!(matches!(err, RepoError::Unauthorized));
    assert_eq!(r.find_by_name("Phone").unwrap().status, ItemStatus::Open);
    assert_eq!(store.save_count(), saves);
}

#[test]
fn claim_and_reopen_round_trip() {
    let (mut r, store) = registry();
    let original = r.add(new_item("Phone", ItemType::Lost, "pw")).unwrap();

    let claimed = match r.claim("phone", "pw").unwrap() {
        StatusChange::Changed(i) => i,
        other => panic!("expected change, got {other:?}"),
    };
    assert_eq!(claimed.status, ItemStatus::Claimed);
    assert!(claimed.updated_at > original.updated_at);

    let reopened = r.reopen("phone", "pw").unwrap();
    assert!(reopened.is_changed());
    let reopened = reopened.item().clone();
    assert!(reopened.updated_at > claimed.updated_at);

    let mut expected = original.clone();
    expected.updated_at = reopened.updated_at;
    assert_eq!(reopened, expected);
    assert_eq!(reopened.created_at, original.created_at);
    assert_eq!(store.snapshot(), vec![reopened]);
}

#[test]
fn status_already_in_target_is_unchanged() {
    let (mut r, store) = registry();
    let item = r.add(new_item("Phone", ItemType::Lost, "pw")).unwrap();
    let saves = store.save_count();

    let change = r.set_status("Phone", "pw", ItemStatus::Open).unwrap();
    assert_eq!(change, StatusChange::Unchanged(item.clone()));
    assert!(!change.is_changed());
    assert_eq!(store.save_count(), saves);
}

#[test]
fn delete_removes_first_match_only() {
    let (mut r, store) = registry();
    let first = r.add(new_item("Keys", ItemType::Lost, "pw")).unwrap();
    r.add(new_item("Bag", ItemType::Found, "pw")).unwrap();
    let second = r.add(new_item("KEYS", ItemType::Found, "other")).unwrap();

    let removed = r.delete("keys", "pw").unwrap();
    assert_eq!(removed, first);
    assert_eq!(r.len(), 2);
    assert_eq!(r.find_by_name("keys").unwrap(), &second);

    // next match has its own password
    assert!(matches!(r.delete("keys", "pw"), Err(RepoError::Unauthorized)));
    r.delete("keys", "other").unwrap();
    assert!(matches!(r.find_by_name("keys"), Err(RepoError::NotFound)));
    assert_eq!(store.snapshot().len(), 1);
}

#[test]
fn delete_removes_image_and_ignores_failures() {
    let images = MockImageStore::with_files(&["img/a.jpg"]);
    let (mut r, _) = registry_with_images(images);
    r.add(NewItem { image_path: Some("img/a.jpg".into()), ..new_item("A", ItemType::Lost, "pw") }).unwrap();
    r.add(NewItem { image_path: Some("img/gone.jpg".into()), ..new_item("B", ItemType::Lost, "pw") }).unwrap();
    assert_eq!(r.statistics().with_images, 1);

    r.delete("A", "pw").unwrap();
    assert!(!r.image_store().exists("img/a.jpg"));
    r.delete("B", "pw").unwrap();
    assert!(r.is_empty());

    let failing = MockImageStore { fail_remove: true, ..MockImageStore::with_files(&["img/c.jpg"]) };
    let (mut r, store) = registry_with_images(failing);
    r.add(NewItem { image_path: Some("img/c.jpg".into()), ..new_item("C", ItemType::Found, "pw") }).unwrap();
    r.delete("C", "pw").unwrap();
    assert!(store.snapshot().is_empty());
}

#[test]
fn list_combines_dimensions() {
    let (mut r, _) = registry();
    r.add(new_item("Phone", ItemType::Lost, "pw")).unwrap();
    r.add(new_item("Old phone case", ItemType::Lost, "pw")).unwrap();
    r.add(NewItem { poster: "Phoneless Pete".into(), ..new_item("Scarf", ItemType::Lost, "pw") }).unwrap();
    r.add(new_item("Phone charger", ItemType::Found, "pw")).unwrap();
    r.add(new_item("Laptop", ItemType::Lost, "pw")).unwrap();
    r.claim("Phone", "pw").unwrap();
    r.claim("Scarf", "pw").unwrap();
    r.claim("Phone charger", "pw").unwrap();
    r.claim("Laptop", "pw").unwrap();

    let filter = ItemFilter {
        status: Some(ItemStatus::Claimed),
        kind: Some(ItemType::Lost),
        search: Some("PHONE".into()),
    };
    let names: Vec<&str> = r.list(&filter).map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Phone", "Scarf"]);

    let all: Vec<&str> = r.list(&ItemFilter::default()).map(|i| i.name.as_str()).collect();
    assert_eq!(all, vec!["Phone", "Old phone case", "Scarf", "Phone charger", "Laptop"]);

    let by_description = ItemFilter { search: Some("charger desc".into()), ..Default::default() };
    assert_eq!(r.list(&by_description).count(), 1);
}

#[test]
fn statistics_reflect_live_state() {
    let (mut r, _) = registry();
    for name in ["Phone", "Keys", "Wallet"] {
        r.add(new_item(name, ItemType::Lost, "pw")).unwrap();
    }
    r.claim("Keys", "pw").unwrap();

    let s = r.statistics();
    assert_eq!((s.total, s.open, s.claimed, s.lost, s.found), (3, 2, 1, 3, 0));
    assert_eq!(s.with_images, 0);

    r.delete("Phone", "pw").unwrap();
    assert_eq!(r.statistics().total, 2);
}

use super::*;
use shared::domain::{BloodType, Urgency};

fn store() -> (SessionDraftStore<MemorySessionStorage>, MemorySessionStorage) {
    let storage = MemorySessionStorage::new();
    (SessionDraftStore::new(storage.clone()), storage)
}

fn jane_doe() -> RequestDraft {
    RequestDraft {
        patient_name: "Jane Doe".into(),
        blood_type: Some(BloodType::ONegative),
        urgency: Some(Urgency::Critical),
        contact_number: "555-0100".into(),
        ..RequestDraft::default()
    }
}

#[test]
fn load_is_absent_until_saved() {
    let (store, _) = store();
    assert_eq!(store.load_draft(), None);
    assert_eq!(store.promoted_id(), None);
}

#[test]
fn save_then_load_is_repeatable() {
    let (store, _) = store();
    store.save_draft(&jane_doe()).expect("save");
    assert_eq!(store.load_draft(), Some(jane_doe()));
    assert_eq!(store.load_draft(), Some(jane_doe()));
}

#[test]
fn draft_is_stored_as_json_under_session_key() {
    let (store, storage) = store();
    store.save_draft(&jane_doe()).expect("save");
    let raw = storage.get_item(DRAFT_KEY).expect("raw draft");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value["patient_name"], "Jane Doe");
    assert_eq!(value["blood_type"], "O-");
}

#[test]
fn resaving_same_draft_keeps_key_and_promotion() {
    let (store, _) = store();
    store.save_draft(&jane_doe()).expect("save");
    let key = store.submission_key().expect("key");
    let promoted = RequestId::new();
    store.record_promotion(promoted).expect("promotion");

    store.save_draft(&jane_doe()).expect("resave");
    assert_eq!(store.submission_key().expect("key"), key);
    assert_eq!(store.promoted_id(), Some(promoted));
}

#[test]
fn changed_draft_rotates_key_and_forgets_promotion() {
    let (store, _) = store();
    store.save_draft(&jane_doe()).expect("save");
    let key = store.submission_key().expect("key");
    store.record_promotion(RequestId::new()).expect("promotion");

    let mut edited = jane_doe();
    edited.units_needed = Some(3);
    store.save_draft(&edited).expect("save edited");

    assert_ne!(store.submission_key().expect("key"), key);
    assert_eq!(store.promoted_id(), None);
}

#[test]
fn clear_removes_every_session_key() {
    let (store, storage) = store();
    store.save_draft(&jane_doe()).expect("save");
    store.record_promotion(RequestId::new()).expect("promotion");

    store.clear_draft();
    for key in [DRAFT_KEY, SUBMISSION_KEY_KEY, PROMOTED_ID_KEY] {
        assert_eq!(storage.get_item(key), None, "{key} should be removed");
    }
}

#[test]
fn corrupted_values_read_as_absent() {
    let (store, storage) = store();
    storage
        .set_item(DRAFT_KEY, "{not json".into())
        .expect("raw set");
    storage
        .set_item(PROMOTED_ID_KEY, "not-a-uuid".into())
        .expect("raw set");
    assert_eq!(store.load_draft(), None);
    assert_eq!(store.promoted_id(), None);
}

/// Session storage whose writes to selected keys fail.
#[derive(Clone, Default)]
struct FailingSessionStorage {
    inner: MemorySessionStorage,
    failing: Arc<Mutex<Vec<&'static str>>>,
}

impl FailingSessionStorage {
    fn fail_writes_to(&self, key: &'static str) {
        self.failing.lock().expect("failing keys").push(key);
    }
}

impl SessionStorage for FailingSessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        let failing = self.failing.lock().expect("failing keys");
        if failing.iter().any(|failing_key| *failing_key == key) {
            anyhow::bail!("session storage quota exceeded");
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) {
        self.inner.remove_item(key);
    }
}

#[test]
fn failed_key_rotation_keeps_previous_draft_key_and_promotion() {
    let storage = FailingSessionStorage::default();
    let store = SessionDraftStore::new(storage.clone());
    store.save_draft(&jane_doe()).expect("save");
    let key = store.submission_key().expect("key");
    let promoted = RequestId::new();
    store.record_promotion(promoted).expect("promotion");

    storage.fail_writes_to(SUBMISSION_KEY_KEY);
    let mut renamed = jane_doe();
    renamed.patient_name = "John Roe".into();
    assert!(store.save_draft(&renamed).is_err());

    assert_eq!(store.load_draft(), Some(jane_doe()));
    assert_eq!(store.submission_key().expect("key"), key);
    assert_eq!(store.promoted_id(), Some(promoted));
}

#[test]
fn failed_draft_write_after_rotation_leaves_no_draft() {
    let storage = FailingSessionStorage::default();
    let store = SessionDraftStore::new(storage.clone());
    store.save_draft(&jane_doe()).expect("save");
    store.record_promotion(RequestId::new()).expect("promotion");

    storage.fail_writes_to(DRAFT_KEY);
    let mut renamed = jane_doe();
    renamed.patient_name = "John Roe".into();
    assert!(store.save_draft(&renamed).is_err());

    assert_eq!(store.load_draft(), None);
    assert_eq!(store.promoted_id(), None);
}

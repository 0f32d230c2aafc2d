//! Session-scoped handoff of the in-progress request between the compose and
//! hospital selection steps.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use anyhow::{Context, Result};
use shared::domain::{RequestDraft, RequestId, SubmissionKey};
use tracing::warn;

pub const DRAFT_KEY: &str = "bloodRequest";
pub const SUBMISSION_KEY_KEY: &str = "bloodRequestKey";
pub const PROMOTED_ID_KEY: &str = "bloodRequestId";

/// Key to string storage that lives as long as one session.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String) -> Result<()>;
    fn remove_item(&self, key: &str);
}

#[derive(Clone, Default)]
pub struct MemorySessionStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items().insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items().remove(key);
    }
}

pub trait DraftStore: Send + Sync {
    fn save_draft(&self, draft: &RequestDraft) -> Result<()>;
    /// Side-effect free; unreadable stored data counts as absent.
    fn load_draft(&self) -> Option<RequestDraft>;
    fn clear_draft(&self);
    /// Idempotency key for promoting the current draft. Stable until the draft
    /// changes or is cleared.
    fn submission_key(&self) -> Result<SubmissionKey>;
    /// Id of the record already created for the current draft, if any.
    fn promoted_id(&self) -> Option<RequestId>;
    fn record_promotion(&self, request_id: RequestId) -> Result<()>;
}

pub struct SessionDraftStore<S> {
    storage: S,
}

impl<S: SessionStorage> SessionDraftStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn read_parsed<T>(&self, key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let raw = self.storage.get_item(key)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            warn!(key, "ignoring unreadable session value");
        }
        parsed
    }
}

impl<S: SessionStorage> DraftStore for SessionDraftStore<S> {
    fn save_draft(&self, draft: &RequestDraft) -> Result<()> {
        let unchanged = self.load_draft().as_ref() == Some(draft);
        let encoded = serde_json::to_string(draft).context("failed to encode request draft")?;
        if unchanged {
            return self
                .storage
                .set_item(DRAFT_KEY, encoded)
                .context("failed to store request draft");
        }

        // the key is rotated before the draft lands, so a stored draft never
        // pairs with the key or record of a different draft
        self.storage
            .set_item(SUBMISSION_KEY_KEY, SubmissionKey::new().to_string())
            .context("failed to store submission key")?;
        self.storage.remove_item(PROMOTED_ID_KEY);
        if let Err(err) = self.storage.set_item(DRAFT_KEY, encoded) {
            // the old draft no longer matches the rotated key
            self.storage.remove_item(DRAFT_KEY);
            return Err(err.context("failed to store request draft"));
        }
        Ok(())
    }

    fn load_draft(&self) -> Option<RequestDraft> {
        self.read_parsed(DRAFT_KEY, |raw| serde_json::from_str(raw).ok())
    }

    fn clear_draft(&self) {
        self.storage.remove_item(DRAFT_KEY);
        self.storage.remove_item(SUBMISSION_KEY_KEY);
        self.storage.remove_item(PROMOTED_ID_KEY);
    }

    fn submission_key(&self) -> Result<SubmissionKey> {
        if let Some(key) = self.read_parsed(SUBMISSION_KEY_KEY, |raw| raw.parse().ok()) {
            return Ok(key);
        }
        let key = SubmissionKey::new();
        self.storage
            .set_item(SUBMISSION_KEY_KEY, key.to_string())
            .context("failed to store submission key")?;
        Ok(key)
    }

    fn promoted_id(&self) -> Option<RequestId> {
        self.read_parsed(PROMOTED_ID_KEY, |raw| raw.parse().ok())
    }

    fn record_promotion(&self, request_id: RequestId) -> Result<()> {
        self.storage
            .set_item(PROMOTED_ID_KEY, request_id.to_string())
            .context("failed to store promoted request id")
    }
}

#[cfg(test)]
#[path = "tests/draft_store_tests.rs"]
mod tests;

use async_trait::async_trait;
use shared::domain::{BloodRequest, Hospital, OwnerId, RequestDraft, RequestId, SubmissionKey};
use storage::Storage;
use tracing::warn;

use crate::error::RepositoryError;

/// Durable home of blood request records.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Validates and persists the draft as a pending record without hospitals.
    /// A repeated call with the same owner and submission key returns the
    /// record created by the first call.
    async fn create(
        &self,
        owner_id: &OwnerId,
        draft: &RequestDraft,
        submission_key: SubmissionKey,
    ) -> Result<BloodRequest, RepositoryError>;

    /// Replaces the hospital list of an existing record. Leaves every other
    /// field untouched.
    async fn attach_hospitals(
        &self,
        request_id: RequestId,
        hospitals: &[Hospital],
    ) -> Result<(), RepositoryError>;

    /// Newest first. An owner without records gets an empty list.
    async fn list_by_owner(&self, owner_id: &OwnerId)
        -> Result<Vec<BloodRequest>, RepositoryError>;

    async fn get(&self, request_id: RequestId) -> Result<BloodRequest, RepositoryError>;
}

pub(crate) fn ensure_selection(hospitals: &[Hospital]) -> Result<(), RepositoryError> {
    if hospitals.is_empty() {
        return Err(RepositoryError::Validation(
            "select at least one hospital".to_string(),
        ));
    }
    Ok(())
}

/// In-process repository backed directly by the SQLite store.
#[derive(Clone)]
pub struct StorageRequestRepository {
    storage: Storage,
}

impl StorageRequestRepository {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RequestRepository for StorageRequestRepository {
    async fn create(
        &self,
        owner_id: &OwnerId,
        draft: &RequestDraft,
        submission_key: SubmissionKey,
    ) -> Result<BloodRequest, RepositoryError> {
        let details = draft.validate()?;
        let outcome = self
            .storage
            .create_blood_request(owner_id, &details, submission_key)
            .await
            .map_err(RepositoryError::Unavailable)?;
        if outcome.conflicts_with(&details) {
            warn!(
                request_id = %outcome.request.id,
                "submission key reused for different request details"
            );
            return Err(RepositoryError::Validation(
                "submission key was already used for a different request".to_string(),
            ));
        }
        Ok(outcome.request)
    }

    async fn attach_hospitals(
        &self,
        request_id: RequestId,
        hospitals: &[Hospital],
    ) -> Result<(), RepositoryError> {
        ensure_selection(hospitals)?;
        let attached = self
            .storage
            .attach_hospitals(request_id, hospitals)
            .await
            .map_err(RepositoryError::Unavailable)?;
        if !attached {
            return Err(RepositoryError::NotFound(request_id));
        }
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<BloodRequest>, RepositoryError> {
        self.storage
            .list_blood_requests_for_owner(owner_id)
            .await
            .map_err(RepositoryError::Unavailable)
    }

    async fn get(&self, request_id: RequestId) -> Result<BloodRequest, RepositoryError> {
        self.storage
            .get_blood_request(request_id)
            .await
            .map_err(RepositoryError::Unavailable)?
            .ok_or(RepositoryError::NotFound(request_id))
    }
}

#[cfg(test)]
#[path = "tests/repository_tests.rs"]
mod tests;

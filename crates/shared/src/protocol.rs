use serde::{Deserialize, Serialize};

use crate::domain::{Hospital, OwnerId, RequestDraft, SubmissionKey};

pub fn requests_route() -> &'static str {
    "/requests"
}

pub fn request_route(request_id: impl std::fmt::Display) -> String {
    format!("/requests/{request_id}")
}

pub fn request_hospitals_route(request_id: impl std::fmt::Display) -> String {
    format!("/requests/{request_id}/hospitals")
}

/// Body of `POST /requests`. The draft is validated server side; a repeated
/// submission key returns the record created the first time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBloodRequest {
    pub owner_id: OwnerId,
    pub submission_key: SubmissionKey,
    #[serde(flatten)]
    pub draft: RequestDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachHospitalsRequest {
    pub hospitals: Vec<Hospital>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequestsQuery {
    pub owner_id: OwnerId,
}

use shared::{
    domain::{BloodRequest, Hospital, HospitalId, OwnerId, RequestId},
    error::{ApiError, ErrorCode},
    protocol::CreateBloodRequest,
};
use std::collections::HashSet;
use storage::Storage;
use tracing::{error, info, warn};

pub const MAX_SELECTED_HOSPITALS: usize = 32;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn create_request(
    ctx: &ApiContext,
    body: CreateBloodRequest,
) -> Result<BloodRequest, ApiError> {
    if body.owner_id.as_str().trim().is_empty() {
        return Err(ApiError::validation("owner_id cannot be empty"));
    }
    let details = body.draft.validate()?;
    let outcome = ctx
        .storage
        .create_blood_request(&body.owner_id, &details, body.submission_key)
        .await
        .map_err(internal)?;
    if outcome.conflicts_with(&details) {
        warn!(
            request_id = %outcome.request.id,
            owner_id = %body.owner_id,
            "submission key reused for different request details"
        );
        return Err(ApiError::validation(
            "submission key was already used for a different request",
        ));
    }
    info!(
        request_id = %outcome.request.id,
        owner_id = %body.owner_id,
        replayed = outcome.replayed,
        "blood request created"
    );
    Ok(outcome.request)
}

pub async fn get_request(ctx: &ApiContext, request_id: RequestId) -> Result<BloodRequest, ApiError> {
    ctx.storage
        .get_blood_request(request_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(request_id))
}

pub async fn attach_hospitals(
    ctx: &ApiContext,
    request_id: RequestId,
    hospitals: Vec<Hospital>,
) -> Result<(), ApiError> {
    validate_selection(&hospitals)?;
    let attached = ctx
        .storage
        .attach_hospitals(request_id, &hospitals)
        .await
        .map_err(internal)?;
    if !attached {
        return Err(not_found(request_id));
    }
    info!(%request_id, hospitals = hospitals.len(), "hospitals attached");
    Ok(())
}

pub async fn list_requests(
    ctx: &ApiContext,
    owner_id: &OwnerId,
) -> Result<Vec<BloodRequest>, ApiError> {
    ctx.storage
        .list_blood_requests_for_owner(owner_id)
        .await
        .map_err(internal)
}

fn validate_selection(hospitals: &[Hospital]) -> Result<(), ApiError> {
    if hospitals.is_empty() {
        return Err(ApiError::validation("select at least one hospital"));
    }
    if hospitals.len() > MAX_SELECTED_HOSPITALS {
        return Err(ApiError::validation(format!(
            "at most {MAX_SELECTED_HOSPITALS} hospitals can be selected"
        )));
    }
    let mut seen: HashSet<HospitalId> = HashSet::with_capacity(hospitals.len());
    if let Some(duplicate) = hospitals.iter().find(|hospital| !seen.insert(hospital.id)) {
        return Err(ApiError::validation(format!(
            "hospital {} is selected more than once",
            duplicate.id.0
        )));
    }
    Ok(())
}

fn not_found(request_id: RequestId) -> ApiError {
    ApiError::not_found(format!("blood request {request_id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    error!(error = %format!("{err:#}"), "storage operation failed");
    ApiError::new(ErrorCode::Internal, "storage unavailable")
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;

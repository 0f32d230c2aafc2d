use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{BloodRequest, Hospital, OwnerId, RequestDraft, RequestId, SubmissionKey},
    error::ApiError,
    protocol::{
        request_hospitals_route, request_route, requests_route, AttachHospitalsRequest,
        CreateBloodRequest,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    error::RepositoryError,
    repository::{ensure_selection, RequestRepository},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to the request service over HTTP.
#[derive(Clone)]
pub struct HttpRequestRepository {
    http: Client,
    server_url: String,
}

impl HttpRequestRepository {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        let parsed = Url::parse(server_url.trim())
            .with_context(|| format!("invalid server url '{server_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "server url must use http or https, got '{}'",
                parsed.scheme()
            ));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

fn unavailable(err: reqwest::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.into())
}

/// Maps a non-success response onto the repository error taxonomy. A 404 is
/// only meaningful when the call addressed a specific record.
async fn failure(response: Response, request_id: Option<RequestId>) -> RepositoryError {
    let status = response.status();
    let body: Option<ApiError> = response.json().await.ok();
    match (status, request_id) {
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            RepositoryError::Validation(
                body.map(|err| err.message)
                    .unwrap_or_else(|| "the request was rejected".to_string()),
            )
        }
        (StatusCode::NOT_FOUND, Some(request_id)) => RepositoryError::NotFound(request_id),
        _ => RepositoryError::Unavailable(anyhow!(
            "unexpected status {status}{}",
            body.map(|err| format!(": {}", err.message))
                .unwrap_or_default()
        )),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RepositoryError> {
    response
        .json()
        .await
        .map_err(|err| RepositoryError::Unavailable(anyhow!(err).context("malformed response body")))
}

#[async_trait]
impl RequestRepository for HttpRequestRepository {
    async fn create(
        &self,
        owner_id: &OwnerId,
        draft: &RequestDraft,
        submission_key: SubmissionKey,
    ) -> Result<BloodRequest, RepositoryError> {
        let response = self
            .http
            .post(self.endpoint(requests_route()))
            .json(&CreateBloodRequest {
                owner_id: owner_id.clone(),
                submission_key,
                draft: draft.clone(),
            })
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(failure(response, None).await);
        }
        let request: BloodRequest = decode(response).await?;
        debug!(request_id = %request.id, "blood request created remotely");
        Ok(request)
    }

    async fn attach_hospitals(
        &self,
        request_id: RequestId,
        hospitals: &[Hospital],
    ) -> Result<(), RepositoryError> {
        ensure_selection(hospitals)?;
        let response = self
            .http
            .put(self.endpoint(&request_hospitals_route(request_id)))
            .json(&AttachHospitalsRequest {
                hospitals: hospitals.to_vec(),
            })
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(failure(response, Some(request_id)).await);
        }
        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<BloodRequest>, RepositoryError> {
        let response = self
            .http
            .get(self.endpoint(requests_route()))
            .query(&[("owner_id", owner_id.as_str())])
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(failure(response, None).await);
        }
        decode(response).await
    }

    async fn get(&self, request_id: RequestId) -> Result<BloodRequest, RepositoryError> {
        let response = self
            .http
            .get(self.endpoint(&request_route(request_id)))
            .send()
            .await
            .map_err(unavailable)?;
        if !response.status().is_success() {
            return Err(failure(response, Some(request_id)).await);
        }
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/http_repository_tests.rs"]
mod tests;

//! Read side: a user's past requests with display-ready derived fields.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::domain::{BloodRequest, OwnerId, RequestStatus, Urgency};
use tracing::warn;

use crate::{
    identity::IdentityProvider,
    notify::{Notice, Notifier},
    repository::RequestRepository,
};

const REQUESTED_ON_FORMAT: &str = "%b %d, %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityTier {
    Highest,
    Medium,
    Lowest,
}

impl SeverityTier {
    pub fn for_urgency(urgency: Urgency) -> Self {
        match urgency {
            Urgency::Critical => SeverityTier::Highest,
            Urgency::Routine => SeverityTier::Lowest,
            Urgency::Urgent | Urgency::Unrecognized => SeverityTier::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    Clock,
    Check,
    Cross,
}

impl StatusIcon {
    pub fn for_status(status: RequestStatus) -> Self {
        match status {
            RequestStatus::Approved => StatusIcon::Check,
            RequestStatus::Rejected => StatusIcon::Cross,
            RequestStatus::Pending | RequestStatus::Unrecognized => StatusIcon::Clock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRow {
    pub request: BloodRequest,
    pub severity: SeverityTier,
    pub status_icon: StatusIcon,
    pub hospital_count: usize,
    pub requested_on: String,
}

impl DashboardRow {
    pub fn from_request(request: BloodRequest) -> Self {
        Self {
            severity: SeverityTier::for_urgency(request.details.urgency),
            status_icon: StatusIcon::for_status(request.status),
            hospital_count: request.hospital_count(),
            requested_on: requested_on(request.created_at),
            request,
        }
    }
}

pub fn requested_on(created_at: DateTime<Utc>) -> String {
    created_at.format(REQUESTED_ON_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    Loaded(Vec<DashboardRow>),
    Empty,
    /// The repository could not be read. A notice has already been sent.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardPage {
    pub greeting: String,
    pub view: DashboardView,
}

pub struct DashboardReader {
    repository: Arc<dyn RequestRepository>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
}

impl DashboardReader {
    pub fn new(
        repository: Arc<dyn RequestRepository>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            identity,
            notifier,
        }
    }

    /// Newest first, in repository order.
    pub async fn load(&self, owner_id: &OwnerId) -> DashboardView {
        match self.repository.list_by_owner(owner_id).await {
            Ok(requests) if requests.is_empty() => DashboardView::Empty,
            Ok(requests) => DashboardView::Loaded(
                requests
                    .into_iter()
                    .map(DashboardRow::from_request)
                    .collect(),
            ),
            Err(err) => {
                warn!(owner_id = %owner_id, error = %err, "failed to load dashboard");
                self.notifier
                    .notify(Notice::error("Failed to fetch requests", err.user_detail()));
                DashboardView::Unavailable
            }
        }
    }

    /// `None` when nobody is signed in.
    pub async fn load_for_current_user(&self) -> Option<DashboardPage> {
        let user = self.identity.current_user().await?;
        let view = self.load(&user.id).await;
        let greeting = user
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "User".to_string());
        Some(DashboardPage { greeting, view })
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;

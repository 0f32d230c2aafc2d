//! Compose, select hospitals, confirm.
//!
//! The controller owns the step the user is on and decides when the draft
//! held in the [`DraftStore`] becomes a durable record. Promotion is deferred
//! to the first hospital submission and keyed by the draft's submission key,
//! so a retried submission never creates a second record.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::{Hospital, HospitalId, OwnerId, RequestDraft, RequestId};
use tracing::{debug, info, warn};

use crate::{
    directory::HospitalDirectory,
    draft_store::DraftStore,
    error::RepositoryError,
    identity::IdentityProvider,
    notify::{Notice, Notifier},
    repository::RequestRepository,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Composing,
    Selecting,
    /// A submission is in flight. Every other transition is refused.
    Submitting,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent {
        request_id: RequestId,
        hospital_count: usize,
    },
    /// Nothing happened: not on the selection step, or a submission is
    /// already running.
    Ignored,
    /// Still selecting. The selection is unchanged and the user may retry.
    StillSelecting,
    /// The draft or its record is gone; the user has to compose again.
    BackToComposing,
}

/// Everything the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub draft_store: Arc<dyn DraftStore>,
    pub repository: Arc<dyn RequestRepository>,
    pub directory: Arc<HospitalDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn Notifier>,
}

struct Session {
    state: WorkflowState,
    form: RequestDraft,
    selection: BTreeSet<HospitalId>,
}

pub struct WorkflowController {
    deps: Collaborators,
    session: Mutex<Session>,
}

impl WorkflowController {
    pub fn new(deps: Collaborators) -> Self {
        Self {
            deps,
            session: Mutex::new(Session {
                state: WorkflowState::Composing,
                form: RequestDraft::default(),
                selection: BTreeSet::new(),
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> WorkflowState {
        self.session().state
    }

    /// Current form values, including ones not yet saved.
    pub fn draft(&self) -> RequestDraft {
        self.session().form.clone()
    }

    pub fn directory(&self) -> &HospitalDirectory {
        &self.deps.directory
    }

    /// Applies a field edit. Only possible while composing.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut RequestDraft)) -> bool {
        let mut session = self.session();
        if session.state != WorkflowState::Composing {
            return false;
        }
        edit(&mut session.form);
        true
    }

    /// Checks the mandatory fields and hands the draft over to the selection
    /// step. Nothing is written when a field is missing.
    pub fn submit_compose(&self) -> WorkflowState {
        let form = {
            let session = self.session();
            if session.state != WorkflowState::Composing {
                return session.state;
            }
            session.form.clone()
        };

        let missing = form.missing_fields();
        if !missing.is_empty() {
            debug!(missing = missing.len(), "compose rejected");
            self.notify(Notice::error(
                "Missing Information",
                "Please fill in all required fields",
            ));
            return WorkflowState::Composing;
        }
        if let Err(err) = self.deps.draft_store.save_draft(&form) {
            warn!(error = %format!("{err:#}"), "failed to save request draft");
            self.notify(Notice::error(
                "Error",
                "Your request could not be saved. Please try again.",
            ));
            return WorkflowState::Composing;
        }

        let mut session = self.session();
        // start_over may have run while the draft was being saved
        if session.state != WorkflowState::Composing {
            return session.state;
        }
        session.state = WorkflowState::Selecting;
        drop(session);
        self.notify(Notice::info(
            "Request Prepared",
            "Now select hospitals to send your request",
        ));
        WorkflowState::Selecting
    }

    /// Enters the selection step from whatever draft the session holds, for
    /// example after the front-end was reloaded. Without a stored draft the
    /// user is sent back to compose.
    pub fn open_selection(&self) -> WorkflowState {
        {
            let session = self.session();
            if matches!(
                session.state,
                WorkflowState::Submitting | WorkflowState::Confirmed
            ) {
                return session.state;
            }
        }
        match self.deps.draft_store.load_draft() {
            Some(draft) => {
                let mut session = self.session();
                session.form = draft;
                session.state = WorkflowState::Selecting;
                WorkflowState::Selecting
            }
            None => {
                self.session().state = WorkflowState::Composing;
                self.notify(Notice::error(
                    "No Request Data",
                    "Please fill out the blood request form first",
                ));
                WorkflowState::Composing
            }
        }
    }

    /// Flips membership of one hospital. Returns whether it is selected
    /// afterwards. Unknown ids are never selected.
    pub fn toggle_hospital(&self, id: HospitalId) -> bool {
        let mut session = self.session();
        if session.state != WorkflowState::Selecting || !self.deps.directory.contains(id) {
            return session.selection.contains(&id);
        }
        if !session.selection.remove(&id) {
            session.selection.insert(id);
        }
        session.selection.contains(&id)
    }

    pub fn select_hospital(&self, id: HospitalId) -> bool {
        let mut session = self.session();
        if session.state != WorkflowState::Selecting || !self.deps.directory.contains(id) {
            return false;
        }
        session.selection.insert(id);
        true
    }

    pub fn deselect_hospital(&self, id: HospitalId) -> bool {
        let mut session = self.session();
        if session.state != WorkflowState::Selecting {
            return false;
        }
        session.selection.remove(&id);
        true
    }

    pub fn selection(&self) -> Vec<HospitalId> {
        self.session().selection.iter().copied().collect()
    }

    /// Snapshots of the selected hospitals in directory order.
    pub fn selected_hospitals(&self) -> Vec<Hospital> {
        let selection = self.selection();
        self.deps.directory.find_by_ids(&selection)
    }

    /// Selecting back to Composing. The stored draft stays so the form can be
    /// re-submitted.
    pub fn back(&self) -> WorkflowState {
        let mut session = self.session();
        if session.state == WorkflowState::Selecting {
            session.state = WorkflowState::Composing;
        }
        session.state
    }

    /// Discards the session draft and starts a fresh workflow.
    pub fn start_over(&self) -> WorkflowState {
        {
            let mut session = self.session();
            if session.state == WorkflowState::Submitting {
                return session.state;
            }
            session.state = WorkflowState::Composing;
            session.form = RequestDraft::default();
            session.selection.clear();
        }
        self.deps.draft_store.clear_draft();
        WorkflowState::Composing
    }

    /// Promotes the draft if that has not happened yet, then attaches the
    /// selected hospitals. A call made while another submission runs is
    /// ignored. Dropping the returned future before it finishes puts the
    /// controller back on the selection step.
    pub async fn submit_selection(&self) -> SubmitOutcome {
        let selection = {
            let mut session = self.session();
            if session.state != WorkflowState::Selecting {
                debug!(state = ?session.state, "submit ignored");
                return SubmitOutcome::Ignored;
            }
            if session.selection.is_empty() {
                drop(session);
                self.notify(Notice::error(
                    "No Hospitals Selected",
                    "Please select at least one hospital",
                ));
                return SubmitOutcome::StillSelecting;
            }
            session.state = WorkflowState::Submitting;
            session.selection.clone()
        };
        let guard = SubmissionGuard {
            controller: self,
            armed: true,
        };

        let Some(user) = self.deps.identity.current_user().await else {
            self.notify(Notice::error(
                "Sign-in Required",
                "Please sign in to send your request",
            ));
            return guard.finish(WorkflowState::Selecting, SubmitOutcome::StillSelecting);
        };

        let Some(draft) = self.deps.draft_store.load_draft() else {
            self.notify(Notice::error(
                "No Request Data",
                "Please fill out the blood request form first",
            ));
            return guard.finish(WorkflowState::Composing, SubmitOutcome::BackToComposing);
        };

        let hospitals = self.deps.directory.find_by_ids(&selection);
        match self.promote_and_attach(&user.id, &draft, &hospitals).await {
            Ok(request_id) => {
                self.deps.draft_store.clear_draft();
                info!(%request_id, hospitals = hospitals.len(), "blood request sent");
                {
                    let mut session = guard.controller.session();
                    session.form = RequestDraft::default();
                    session.selection.clear();
                }
                self.notify(Notice::info(
                    "Requests Sent Successfully!",
                    format!(
                        "Your blood request has been sent to {} hospital(s)",
                        hospitals.len()
                    ),
                ));
                guard.finish(
                    WorkflowState::Confirmed,
                    SubmitOutcome::Sent {
                        request_id,
                        hospital_count: hospitals.len(),
                    },
                )
            }
            Err(err @ RepositoryError::NotFound(_)) => {
                warn!(error = %err, "request record vanished, restarting compose");
                self.deps.draft_store.clear_draft();
                guard.controller.session().selection.clear();
                self.notify(Notice::error("Error", err.user_detail()));
                guard.finish(WorkflowState::Composing, SubmitOutcome::BackToComposing)
            }
            Err(err) => {
                warn!(error = %err, "submission failed");
                self.notify(Notice::error("Error", err.user_detail()));
                guard.finish(WorkflowState::Selecting, SubmitOutcome::StillSelecting)
            }
        }
    }

    async fn promote_and_attach(
        &self,
        owner_id: &OwnerId,
        draft: &RequestDraft,
        hospitals: &[Hospital],
    ) -> Result<RequestId, RepositoryError> {
        let store = &self.deps.draft_store;
        let request_id = match store.promoted_id() {
            Some(request_id) => request_id,
            None => {
                let submission_key = store
                    .submission_key()
                    .map_err(RepositoryError::Unavailable)?;
                let created = self
                    .deps
                    .repository
                    .create(owner_id, draft, submission_key)
                    .await?;
                if let Err(err) = store.record_promotion(created.id) {
                    // the submission key still maps a retry onto this record
                    warn!(request_id = %created.id, error = %format!("{err:#}"), "failed to remember promoted request");
                }
                created.id
            }
        };
        self.deps
            .repository
            .attach_hospitals(request_id, hospitals)
            .await?;
        Ok(request_id)
    }

    fn notify(&self, notice: Notice) {
        self.deps.notifier.notify(notice);
    }
}

/// Leaves `Submitting` on every exit path of a submission, including the
/// future being dropped at an await point.
struct SubmissionGuard<'a> {
    controller: &'a WorkflowController,
    armed: bool,
}

impl SubmissionGuard<'_> {
    fn finish(mut self, next: WorkflowState, outcome: SubmitOutcome) -> SubmitOutcome {
        self.armed = false;
        self.controller.session().state = next;
        outcome
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.controller.session();
        if session.state == WorkflowState::Submitting {
            debug!("submission abandoned, back to selecting");
            session.state = WorkflowState::Selecting;
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;

//! Client side of blood request dispatch: the compose / select / confirm
//! workflow, the session draft handoff and the request dashboard.

pub mod dashboard;
pub mod directory;
pub mod draft_store;
pub mod error;
pub mod http_repository;
pub mod identity;
pub mod notify;
pub mod repository;
pub mod workflow;

pub use dashboard::{
    DashboardPage, DashboardReader, DashboardRow, DashboardView, SeverityTier, StatusIcon,
};
pub use directory::HospitalDirectory;
pub use draft_store::{DraftStore, MemorySessionStorage, SessionDraftStore, SessionStorage};
pub use error::RepositoryError;
pub use http_repository::HttpRequestRepository;
pub use identity::{CurrentUser, IdentityProvider, StaticIdentity};
pub use notify::{Notice, NoticeKind, Notifier, TracingNotifier};
pub use repository::{RequestRepository, StorageRequestRepository};
pub use workflow::{Collaborators, SubmitOutcome, WorkflowController, WorkflowState};

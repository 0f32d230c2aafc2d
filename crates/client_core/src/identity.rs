use async_trait::async_trait;
use shared::domain::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: OwnerId,
    pub display_name: Option<String>,
}

/// Read-only view of the signed-in user. `None` means nobody is signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Option<CurrentUser>;
}

pub struct StaticIdentity {
    user: Option<CurrentUser>,
}

impl StaticIdentity {
    pub fn signed_in(id: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            user: Some(CurrentUser {
                id: OwnerId::new(id),
                display_name,
            }),
        }
    }

    pub fn signed_out() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }
}

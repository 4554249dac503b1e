//! Identity Port

use async_trait::async_trait;
use intake_core::UserId;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreResult;

/// Source of the signed-in user's id
///
/// `None` means nobody is signed in yet, typically while an email
/// verification link is outstanding.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> StoreResult<Option<UserId>>;
}

/// Identity held in process, switched by the host on sign-in
#[derive(Clone, Debug, Default)]
pub struct SessionIdentity {
    user: Arc<RwLock<Option<UserId>>>,
}

impl SessionIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
        }
    }

    pub async fn sign_in(&self, user: UserId) {
        *self.user.write().await = Some(user);
    }

    pub async fn sign_out(&self) {
        *self.user.write().await = None;
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    async fn current_user(&self) -> StoreResult<Option<UserId>> {
        Ok(self.user.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let identity = SessionIdentity::anonymous();
        assert_eq!(identity.current_user().await.unwrap(), None);

        identity.sign_in(UserId::new("u1")).await;
        assert_eq!(identity.current_user().await.unwrap(), Some(UserId::new("u1")));

        identity.sign_out().await;
        assert_eq!(identity.current_user().await.unwrap(), None);
    }
}

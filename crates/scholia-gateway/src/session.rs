//! Session context holding the current actor.

use std::sync::Arc;

use scholia_core::User;
use tokio::sync::RwLock;

use crate::TRACING_TARGET_SESSION;

/// Shared session context for one viewing session.
///
/// The actor starts as the anonymous placeholder and is replaced at most once
/// through [`Session::set_identity`], when the backend first reveals who the
/// author of a newly created annotation is. Reads are snapshots.
#[derive(Clone)]
pub struct Session {
    user: Arc<RwLock<User>>,
}

impl Session {
    /// Creates a session for a known user.
    pub fn new(user: User) -> Self {
        Self {
            user: Arc::new(RwLock::new(user)),
        }
    }

    /// Creates a session for the anonymous placeholder user.
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self::new(User::anonymous(name))
    }

    /// Returns a snapshot of the current actor.
    pub async fn user(&self) -> User {
        self.user.read().await.clone()
    }

    /// Returns whether the actor is still the anonymous placeholder.
    pub async fn is_anonymous(&self) -> bool {
        self.user.read().await.is_anonymous()
    }

    /// Adopts `user` as the session actor if the session is still anonymous.
    ///
    /// Returns whether the identity changed. An anonymous `user` never
    /// replaces the placeholder.
    pub async fn set_identity(&self, user: User) -> bool {
        if user.is_anonymous() {
            return false;
        }

        let mut current = self.user.write().await;
        if !current.is_anonymous() {
            return false;
        }

        tracing::info!(
            target: TRACING_TARGET_SESSION,
            user_id = %user.id,
            "Session identity resolved"
        );

        *current = user;
        true
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(User::default())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_anonymous() {
        let session = Session::anonymous("Guest");
        let user = session.user().await;

        assert!(user.is_anonymous());
        assert_eq!(user.name, "Guest");
    }

    #[tokio::test]
    async fn identity_is_adopted_once() {
        let session = Session::default();

        assert!(session.set_identity(User::new("42", "Ada")).await);
        assert!(!session.set_identity(User::new("43", "Grace")).await);

        let user = session.user().await;
        assert_eq!(user.id, "42");
        assert!(!session.is_anonymous().await);
    }

    #[tokio::test]
    async fn anonymous_identity_is_ignored() {
        let session = Session::default();
        assert!(!session.set_identity(User::anonymous("Other")).await);
        assert!(session.is_anonymous().await);
    }

    #[tokio::test]
    async fn clones_share_identity() {
        let session = Session::default();
        let other = session.clone();

        session.set_identity(User::new("7", "Lin")).await;
        assert_eq!(other.user().await.id, "7");
    }
}

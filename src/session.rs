use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// An authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub access_token: String,
}

impl Session {
    /// Name from the signup metadata, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Shared handle to the current session. Cloning shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(session: Session) -> Self {
        let handle = Self::new();
        handle.set(session);
        handle
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn set(&self, session: Session) {
        *self.current.write() = Some(session);
    }

    pub fn clear(&self) -> Option<Session> {
        self.current.write().take()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }
}

/// Sign-in, sign-up and sign-out against the identity service.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Registers an account. Callers sign in separately afterwards.
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()>;

    async fn sign_out(&self, session: &Session) -> Result<()>;
}

//! In-process backend with the same contract as the hosted service.
//!
//! Rows are filtered by owner the way row-level security filters them on the
//! hosted store, so the data flow behaves identically offline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::session::{Authenticator, Session};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskId, TaskPatch};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    name: String,
    password: String,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<String, Account>,
    tokens: HashMap<String, String>,
    rows: Vec<Task>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    fn caller(&self, session: &Session) -> Result<String> {
        match self.tokens.get(&session.access_token) {
            Some(user_id) if *user_id == session.user_id => Ok(user_id.clone()),
            _ => Err(Error::store("Invalid or expired session")),
        }
    }

    // Strictly increasing so newest-first ordering is total.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn owned_mut(&mut self, owner: &str, id: &TaskId) -> Result<&mut Task> {
        self.rows
            .iter_mut()
            .find(|t| t.id == *id && t.owner == owner)
            .ok_or_else(|| Error::store(format!("No task {id} for this user")))
    }
}

/// Task rows and accounts kept in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all owners.
    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len()
    }
}

#[async_trait]
impl TaskStore for MemoryBackend {
    async fn select_all(&self, session: &Session) -> Result<Vec<Task>> {
        let state = self.state.lock();
        let owner = state.caller(session)?;
        let mut rows: Vec<Task> = state
            .rows
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert(&self, session: &Session, task: &NewTask) -> Result<Task> {
        let mut state = self.state.lock();
        let owner = state.caller(session)?;
        if task.title.trim().is_empty() {
            return Err(Error::store("title must not be empty"));
        }
        let stamp = state.stamp();
        let row = Task {
            id: TaskId::new(Uuid::new_v4().to_string()),
            title: task.title.clone(),
            priority: task.priority,
            status: task.status,
            owner,
            created_at: stamp,
            updated_at: stamp,
        };
        state.rows.push(row.clone());
        debug!(id = %row.id, "inserted row");
        Ok(row)
    }

    async fn update(&self, session: &Session, id: &TaskId, patch: &TaskPatch) -> Result<Task> {
        let mut state = self.state.lock();
        let owner = state.caller(session)?;
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::store("title must not be empty"));
        }
        let stamp = state.stamp();
        let row = state.owned_mut(&owner, id)?;
        patch.apply_to(row);
        row.updated_at = stamp;
        Ok(row.clone())
    }

    async fn delete(&self, session: &Session, id: &TaskId) -> Result<()> {
        let mut state = self.state.lock();
        let owner = state.caller(session)?;
        let before = state.rows.len();
        state.rows.retain(|t| !(t.id == *id && t.owner == owner));
        if state.rows.len() == before {
            return Err(Error::store(format!("No task {id} for this user")));
        }
        Ok(())
    }
}

#[async_trait]
impl Authenticator for MemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .get(email)
            .filter(|a| a.password == password)
            .cloned()
            .ok_or_else(|| Error::store("Invalid login credentials"))?;
        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), account.user_id.clone());
        Ok(Session {
            user_id: account.user_id,
            email: email.to_string(),
            name: Some(account.name),
            access_token: token,
        })
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<()> {
        if !email.contains('@') {
            return Err(Error::store("Unable to validate email address: invalid format"));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::store(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let mut state = self.state.lock();
        if state.accounts.contains_key(email) {
            return Err(Error::store("User already registered"));
        }
        state.accounts.insert(
            email.to_string(),
            Account {
                user_id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                password: password.to_string(),
            },
        );
        Ok(())
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        self.state.lock().tokens.remove(&session.access_token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Priority, Status};

    async fn signed_in(backend: &MemoryBackend, email: &str) -> Session {
        backend.sign_up("Test", email, "secret1").await.unwrap();
        backend.sign_in(email, "secret1").await.unwrap()
    }

    #[tokio::test]
    async fn rows_are_scoped_to_their_owner() {
        let backend = MemoryBackend::new();
        let ana = signed_in(&backend, "ana@example.com").await;
        let bo = signed_in(&backend, "bo@example.com").await;

        let row = backend
            .insert(&ana, &NewTask::new("mine", Priority::Low, Status::Pending))
            .await
            .unwrap();

        assert!(backend.select_all(&bo).await.unwrap().is_empty());
        assert!(backend
            .update(&bo, &row.id, &TaskPatch::status(Status::Done))
            .await
            .is_err());
        assert!(backend.delete(&bo, &row.id).await.is_err());
        assert_eq!(backend.select_all(&ana).await.unwrap(), vec![row]);
    }

    #[tokio::test]
    async fn signed_out_token_is_rejected() {
        let backend = MemoryBackend::new();
        let ana = signed_in(&backend, "ana@example.com").await;
        backend.sign_out(&ana).await.unwrap();
        assert!(matches!(
            backend.select_all(&ana).await,
            Err(Error::Store(_))
        ));
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let backend = MemoryBackend::new();
        backend
            .sign_up("Ana", "ana@example.com", "secret1")
            .await
            .unwrap();
        let err = backend
            .sign_in("ana@example.com", "nope")
            .await
            .unwrap_err();
        assert_eq!(err, Error::store("Invalid login credentials"));
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let backend = MemoryBackend::new();
        backend.sign_up("Ana", "ana@example.com", "secret1").await.unwrap();
        assert!(backend
            .sign_up("Ana", "ana@example.com", "secret1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_stamps_updated_at_only() {
        let backend = MemoryBackend::new();
        let ana = signed_in(&backend, "ana@example.com").await;
        let row = backend
            .insert(&ana, &NewTask::new("a", Priority::High, Status::Pending))
            .await
            .unwrap();
        let updated = backend
            .update(&ana, &row.id, &TaskPatch::status(Status::Done))
            .await
            .unwrap();
        assert_eq!(updated.created_at, row.created_at);
        assert!(updated.updated_at > row.updated_at);
        assert_eq!(updated.priority, Priority::High);
    }
}

//! Task access layer: the four task operations, scoped to the signed-in user.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::{Session, SessionHandle};
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskId, TaskPatch};

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    session: SessionHandle,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, session: SessionHandle) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn current(&self) -> Result<Session> {
        self.session.current().ok_or(Error::NotAuthenticated)
    }

    /// The caller's tasks, newest first.
    pub async fn list(&self) -> Result<Vec<Task>> {
        let session = self.current()?;
        debug!(user = %session.user_id, "listing tasks");
        self.store
            .select_all(&session)
            .await
            .inspect_err(|err| warn!(%err, "list failed"))
    }

    pub async fn create(&self, task: NewTask) -> Result<Task> {
        validate_title(&task.title)?;
        let session = self.current()?;
        let task = NewTask {
            title: task.title.trim().to_string(),
            ..task
        };
        debug!(user = %session.user_id, title = %task.title, "creating task");
        self.store
            .insert(&session, &task)
            .await
            .inspect_err(|err| warn!(%err, "create failed"))
    }

    /// Applies only the fields present in `patch`.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::validation("Nothing to update"));
        }
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let session = self.current()?;
        let patch = TaskPatch {
            title: patch.title.map(|t| t.trim().to_string()),
            ..patch
        };
        debug!(%id, "updating task");
        self.store
            .update(&session, id, &patch)
            .await
            .inspect_err(|err| warn!(%id, %err, "update failed"))
    }

    pub async fn delete(&self, id: &TaskId) -> Result<()> {
        let session = self.current()?;
        debug!(%id, "deleting task");
        self.store
            .delete(&session, id)
            .await
            .inspect_err(|err| warn!(%id, %err, "delete failed"))
    }
}

pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::validation("Task title cannot be empty"));
    }
    Ok(())
}

use async_trait::async_trait;

use crate::error::Result;
use crate::session::Session;
use crate::task::{NewTask, Task, TaskId, TaskPatch};

/// Row operations offered by the backing store.
///
/// Every call runs as `session`'s user. Implementations are expected to
/// restrict reads and writes to rows owned by that user.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All visible rows, newest `created_at` first.
    async fn select_all(&self, session: &Session) -> Result<Vec<Task>>;

    /// Inserts a row owned by `session.user_id` and returns it.
    async fn insert(&self, session: &Session, task: &NewTask) -> Result<Task>;

    async fn update(&self, session: &Session, id: &TaskId, patch: &TaskPatch) -> Result<Task>;

    async fn delete(&self, session: &Session, id: &TaskId) -> Result<()>;
}

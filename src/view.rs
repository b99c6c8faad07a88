//! Task list state and its reconciliation with access-layer results.
//!
//! Local state only changes after a call has come back successfully; a
//! failed call records its message and leaves `tasks` as it was.

use crate::error::Result;
use crate::service::{validate_title, TaskService};
use crate::task::{NewTask, Priority, Status, Task, TaskId, TaskPatch};

/// Something the user asked the task list to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Load,
    Create(NewTask),
    ChangeStatus { id: TaskId, status: Status },
    ChangePriority { id: TaskId, priority: Priority },
    Delete(TaskId),
}

/// Result of running an [`Intent`] against the access layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Loaded(Result<Vec<Task>>),
    Created(Result<Task>),
    Updated(Result<Task>),
    Deleted { id: TaskId, result: Result<()> },
}

/// An outcome tagged with the mount it was issued from.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub mount: u64,
    pub outcome: Outcome,
}

pub async fn execute(service: &TaskService, intent: Intent) -> Outcome {
    match intent {
        Intent::Load => Outcome::Loaded(service.list().await),
        Intent::Create(task) => Outcome::Created(service.create(task).await),
        Intent::ChangeStatus { id, status } => {
            Outcome::Updated(service.update(&id, TaskPatch::status(status)).await)
        }
        Intent::ChangePriority { id, priority } => {
            Outcome::Updated(service.update(&id, TaskPatch::priority(priority)).await)
        }
        Intent::Delete(id) => {
            let result = service.delete(&id).await;
            Outcome::Deleted { id, result }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub priority: Priority,
    pub status: Status,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            priority: Priority::Medium,
            status: Status::Pending,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskListView {
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error: Option<String>,
    pub form: TaskForm,
    pub selected: usize,
    mount: u64,
    mounted: bool,
}

impl TaskListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Starts a fresh mount and returns the initial load to run.
    pub fn mount(&mut self) -> (u64, Intent) {
        self.mount += 1;
        self.mounted = true;
        self.tasks.clear();
        self.selected = 0;
        self.error = None;
        self.loading = true;
        (self.mount, Intent::Load)
    }

    /// Completions still in flight are dropped once they arrive.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.loading = false;
    }

    /// Generation that new intents should be tagged with.
    pub fn generation(&self) -> u64 {
        self.mount
    }

    /// Validates the form and builds a create intent, or records why not.
    pub fn submit(&mut self) -> Option<Intent> {
        if let Err(err) = validate_title(&self.form.title) {
            self.error = Some(err.to_string());
            return None;
        }
        Some(Intent::Create(NewTask::new(
            self.form.title.trim(),
            self.form.priority,
            self.form.status,
        )))
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.tasks.get(self.selected)
    }

    pub fn cycle_selected_status(&self) -> Option<Intent> {
        self.selected_task().map(|t| Intent::ChangeStatus {
            id: t.id.clone(),
            status: t.status.cycle(),
        })
    }

    pub fn cycle_selected_priority(&self) -> Option<Intent> {
        self.selected_task().map(|t| Intent::ChangePriority {
            id: t.id.clone(),
            priority: t.priority.cycle(),
        })
    }

    pub fn delete_selected(&self) -> Option<Intent> {
        self.selected_task().map(|t| Intent::Delete(t.id.clone()))
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.tasks.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Merges a finished call into local state.
    ///
    /// Returns `false` when the completion belongs to another mount or the
    /// view is no longer mounted; nothing is touched in that case.
    pub fn apply(&mut self, completion: Completion) -> bool {
        if !self.mounted || completion.mount != self.mount {
            return false;
        }
        match completion.outcome {
            Outcome::Loaded(result) => {
                self.loading = false;
                match result {
                    Ok(tasks) => self.succeed(|view| view.tasks = tasks),
                    Err(err) => self.error = Some(err.to_string()),
                }
            }
            Outcome::Created(result) => match result {
                Ok(task) => self.succeed(|view| {
                    view.tasks.insert(0, task);
                    view.form = TaskForm::default();
                    view.selected = 0;
                }),
                Err(err) => self.error = Some(err.to_string()),
            },
            Outcome::Updated(result) => match result {
                Ok(task) => self.succeed(|view| {
                    if let Some(slot) = view.tasks.iter_mut().find(|t| t.id == task.id) {
                        *slot = task;
                    }
                }),
                Err(err) => self.error = Some(err.to_string()),
            },
            Outcome::Deleted { id, result } => match result {
                Ok(()) => self.succeed(|view| {
                    view.tasks.retain(|t| t.id != id);
                    view.selected = view.selected.min(view.tasks.len().saturating_sub(1));
                }),
                Err(err) => self.error = Some(err.to_string()),
            },
        }
        true
    }

    fn succeed(&mut self, change: impl FnOnce(&mut Self)) {
        change(self);
        self.error = None;
    }
}

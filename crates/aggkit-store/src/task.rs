//! Server-side asynchronous tasks (UDF registration, index builds).

use tokio::sync::watch;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress,
    Complete,
    Failed(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress)
    }
}

/// Handle to a task running on the server.
#[derive(Debug)]
pub struct Task {
    name: String,
    status: watch::Receiver<TaskStatus>,
}

/// The server side of a [`Task`]. Dropping it before reporting a terminal
/// status fails the task.
#[derive(Debug)]
pub struct TaskReporter {
    status: watch::Sender<TaskStatus>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> (Task, TaskReporter) {
        let (tx, rx) = watch::channel(TaskStatus::InProgress);
        (
            Task {
                name: name.into(),
                status: rx,
            },
            TaskReporter { status: tx },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        let status = self.status.borrow().clone();
        if status == TaskStatus::InProgress && self.status.has_changed().is_err() {
            return TaskStatus::Failed("abandoned".into());
        }
        status
    }

    /// Block until the task reaches a terminal state. There is no timeout.
    pub async fn wait_till_complete(&mut self) -> Result<(), StoreError> {
        let status = match self.status.wait_for(TaskStatus::is_terminal).await {
            Ok(status) => status.clone(),
            Err(_) => return Err(StoreError::TaskAbandoned(self.name.clone())),
        };
        match status {
            TaskStatus::Failed(reason) => Err(StoreError::TaskFailed {
                task: self.name.clone(),
                reason,
            }),
            _ => Ok(()),
        }
    }
}

impl TaskReporter {
    pub fn complete(self) {
        self.status.send_replace(TaskStatus::Complete);
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.status.send_replace(TaskStatus::Failed(reason.into()));
    }
}

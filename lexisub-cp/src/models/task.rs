//! Task lifecycle state machine
//!
//! A processing task progresses through:
//! `pending → starting → processing → {completed | error | cancelled}`
//!
//! Transitions are strictly forward. Once a record reaches a terminal state
//! it is immutable; further updates are rejected by the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Registered, not yet picked up by the orchestrator
    Pending,
    /// Resolving inputs (video, subtitle source)
    Starting,
    /// Parsing and vocabulary classification underway
    Processing,
    /// Finished successfully, result payload present
    Completed,
    /// Finished with a failure, error detail present
    Error,
    /// Cancelled by the user
    Cancelled,
}

impl TaskState {
    /// Ordinal used to enforce forward-only transitions
    fn rank(self) -> u8 {
        match self {
            TaskState::Pending => 0,
            TaskState::Starting => 1,
            TaskState::Processing => 2,
            TaskState::Completed | TaskState::Error | TaskState::Cancelled => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Error | TaskState::Cancelled
        )
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: TaskState) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Starting => "starting",
            TaskState::Processing => "processing",
            TaskState::Completed => "completed",
            TaskState::Error => "error",
            TaskState::Cancelled => "cancelled",
        }
    }
}

/// One task's progress record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Opaque task identifier (caller-supplied or generated)
    pub task_id: String,
    /// Owning user, used to route progress messages
    pub user_id: String,
    /// Current lifecycle state
    pub state: TaskState,
    /// Percentage complete (0-100), monotone while non-terminal
    pub progress: u8,
    /// Short human-readable label for the current step
    pub current_step: String,
    /// Free-text status message
    pub message: String,
    /// Error detail, set when state is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Final payload, set when state is `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(task_id: String, user_id: String) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            user_id,
            state: TaskState::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            message: String::new(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Partial update applied through the registry
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub state: Option<TaskState>,
    pub progress: Option<u8>,
    pub current_step: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(mut self, state: TaskState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_pending() {
        let record = TaskRecord::new("t-1".to_string(), "42".to_string());
        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.progress, 0);
        assert!(!record.is_terminal());
        assert!(record.error.is_none());
        assert!(record.result.is_none());
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Error.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Starting.is_terminal());
        assert!(!TaskState::Processing.is_terminal());
    }

    #[test]
    fn transitions_are_forward_only() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Starting));
        assert!(TaskState::Starting.can_transition_to(TaskState::Processing));
        assert!(TaskState::Processing.can_transition_to(TaskState::Completed));
        assert!(TaskState::Pending.can_transition_to(TaskState::Cancelled));
        // Same-rank re-entry is allowed (progress updates within processing)
        assert!(TaskState::Processing.can_transition_to(TaskState::Processing));

        assert!(!TaskState::Processing.can_transition_to(TaskState::Starting));
        assert!(!TaskState::Starting.can_transition_to(TaskState::Pending));
        assert!(!TaskState::Completed.can_transition_to(TaskState::Processing));
        assert!(!TaskState::Cancelled.can_transition_to(TaskState::Completed));
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TaskState::Processing).unwrap(),
            serde_json::json!("processing")
        );
        assert_eq!(TaskState::Error.as_str(), "error");
    }

    #[test]
    fn update_progress_is_clamped() {
        let update = TaskUpdate::new().progress(250);
        assert_eq!(update.progress, Some(100));
    }
}

//! Task progress registry
//!
//! Process-wide table of task records, the single source of truth for how
//! far a job has progressed. The orchestrator is the sole writer for a given
//! task id; API handlers read concurrently.
//!
//! Every successful `update` invokes the registered listeners synchronously,
//! while the table lock is held, so for a single task id listeners observe
//! transitions in exactly the order they were issued. Listeners must be
//! non-blocking and must not call back into the registry.

use crate::models::{TaskRecord, TaskState, TaskUpdate};
use lexisub_common::{Error, Result};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

type UpdateListener = Box<dyn Fn(&TaskRecord) + Send + Sync>;

/// Lock-guarded task table with a synchronous observer list
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskRecord>>,
    listeners: RwLock<Vec<UpdateListener>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener invoked synchronously on every successful update
    pub fn on_update<F>(&self, listener: F)
    where
        F: Fn(&TaskRecord) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push(Box::new(listener));
    }

    /// Create a new task record in the `pending` state
    pub fn create(&self, task_id: &str, user_id: &str) -> Result<TaskRecord> {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        if tasks.contains_key(task_id) {
            return Err(Error::DuplicateTask(task_id.to_string()));
        }
        let record = TaskRecord::new(task_id.to_string(), user_id.to_string());
        tasks.insert(task_id.to_string(), record.clone());
        Ok(record)
    }

    /// Apply a partial update to a task record.
    ///
    /// Fails with `UnknownTask` if absent, `TerminalState` if the record is
    /// already terminal (the record is left untouched), and `InvalidInput`
    /// on a backward state transition.
    pub fn update(&self, task_id: &str, update: TaskUpdate) -> Result<TaskRecord> {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;

        if record.is_terminal() {
            return Err(Error::TerminalState(task_id.to_string()));
        }
        if let Some(state) = update.state {
            if !record.state.can_transition_to(state) {
                return Err(Error::InvalidInput(format!(
                    "Backward state transition {} -> {} for task {}",
                    record.state.as_str(),
                    state.as_str(),
                    task_id
                )));
            }
            record.state = state;
        }
        if let Some(progress) = update.progress {
            // Monotone while non-terminal
            record.progress = record.progress.max(progress);
        }
        if let Some(step) = update.current_step {
            record.current_step = step;
        }
        if let Some(message) = update.message {
            record.message = message;
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        if let Some(result) = update.result {
            record.result = Some(result);
        }
        record.updated_at = chrono::Utc::now();

        let snapshot = record.clone();

        // Notify before returning, with the table lock still held, so
        // listeners observe per-task transitions in exactly the order the
        // updates were applied.
        for listener in self
            .listeners
            .read()
            .expect("listener lock poisoned")
            .iter()
        {
            listener(&snapshot);
        }
        drop(tasks);

        Ok(snapshot)
    }

    /// Write the `cancelled` terminal state for a non-terminal task
    pub fn cancel(&self, task_id: &str) -> Result<TaskRecord> {
        self.update(
            task_id,
            TaskUpdate::new()
                .state(TaskState::Cancelled)
                .step("Cancelled")
                .message("Cancelled by user"),
        )
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks
            .lock()
            .expect("registry lock poisoned")
            .get(task_id)
            .cloned()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn create_then_get() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        let record = registry.get("t-1").unwrap();
        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.user_id, "42");
    }

    #[test]
    fn duplicate_create_rejected_first_untouched() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        registry
            .update("t-1", TaskUpdate::new().state(TaskState::Starting))
            .unwrap();

        let err = registry.create("t-1", "other").unwrap_err();
        assert!(matches!(err, Error::DuplicateTask(_)));

        let record = registry.get("t-1").unwrap();
        assert_eq!(record.user_id, "42");
        assert_eq!(record.state, TaskState::Starting);
    }

    #[test]
    fn update_unknown_task_rejected() {
        let registry = TaskRegistry::new();
        let err = registry
            .update("nope", TaskUpdate::new().progress(10))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTask(_)));
    }

    #[test]
    fn terminal_record_is_immutable() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        registry
            .update(
                "t-1",
                TaskUpdate::new()
                    .state(TaskState::Error)
                    .message("video not found")
                    .error("video not found: ep01"),
            )
            .unwrap();

        let before = registry.get("t-1").unwrap();
        let err = registry
            .update("t-1", TaskUpdate::new().progress(99).message("late"))
            .unwrap_err();
        assert!(matches!(err, Error::TerminalState(_)));
        assert_eq!(registry.get("t-1").unwrap(), before);
    }

    #[test]
    fn progress_is_monotone() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        registry.update("t-1", TaskUpdate::new().progress(30)).unwrap();
        let record = registry.update("t-1", TaskUpdate::new().progress(10)).unwrap();
        assert_eq!(record.progress, 30);
    }

    #[test]
    fn backward_transition_rejected() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        registry
            .update("t-1", TaskUpdate::new().state(TaskState::Processing))
            .unwrap();
        let err = registry
            .update("t-1", TaskUpdate::new().state(TaskState::Starting))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn listeners_observe_every_update_in_order() {
        let registry = TaskRegistry::new();
        let seen: Arc<std::sync::Mutex<Vec<TaskState>>> = Arc::default();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            let count = count.clone();
            registry.on_update(move |record| {
                seen.lock().unwrap().push(record.state);
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.create("t-1", "42").unwrap();
        registry
            .update("t-1", TaskUpdate::new().state(TaskState::Starting))
            .unwrap();
        registry
            .update("t-1", TaskUpdate::new().state(TaskState::Processing))
            .unwrap();
        registry
            .update("t-1", TaskUpdate::new().state(TaskState::Completed))
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![TaskState::Starting, TaskState::Processing, TaskState::Completed]
        );
    }

    #[test]
    fn cancel_is_terminal_and_blocks_updates() {
        let registry = TaskRegistry::new();
        registry.create("t-1", "42").unwrap();
        let record = registry.cancel("t-1").unwrap();
        assert_eq!(record.state, TaskState::Cancelled);

        let err = registry
            .update("t-1", TaskUpdate::new().progress(50))
            .unwrap_err();
        assert!(matches!(err, Error::TerminalState(_)));

        // Cancelling twice is also a terminal-state rejection
        assert!(matches!(
            registry.cancel("t-1").unwrap_err(),
            Error::TerminalState(_)
        ));
    }
}

//! Data models for the chunk processor

mod task;

pub use task::{TaskRecord, TaskState, TaskUpdate};

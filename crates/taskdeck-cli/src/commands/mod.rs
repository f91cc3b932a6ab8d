pub mod add;
pub mod common;
pub mod config;
pub mod delete;
pub mod edit;
pub mod list;
pub mod project;
pub mod subtask;
pub mod sync;
pub mod tag;
pub mod task_state;
pub mod watch;

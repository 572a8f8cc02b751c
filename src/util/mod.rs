//! Small helpers shared by the engine and the terminal client.
//!
//! - **Task supervision**: turn panics inside spawned fetch tasks into values,
//!   and track detached writes so shutdown can wait for them
//! - **Text**: sanitize and fit remote titles into a fixed-width listing

mod task;
mod text;

pub use task::{catch_task_panic, BackgroundTasks};
pub use text::{fit_to_width, sanitize_line};

//! Subprocess management.

mod spawn;

pub use spawn::{spawn_process, ProcessOptions, ProcessResult};

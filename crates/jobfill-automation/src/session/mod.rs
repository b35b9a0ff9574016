//! Application sessions: the resumable record of one job's progress.

mod model;
mod store;

pub use model::{ApplicationSession, FieldOutcome, SessionStatus};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

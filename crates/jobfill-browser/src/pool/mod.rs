//! Bounded pool of per-job browser instances.
//!
//! One job id maps to at most one live browser. Capacity is a semaphore;
//! callers beyond it get [`PoolError::Exhausted`] instead of queueing.

mod pool_core;

pub use pool_core::{BrowserLease, BrowserPool};

use thiserror::Error;

use crate::driver::DriverError;
use crate::error::BrowserError;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("No browser slot available ({max} in use)")]
    Exhausted { max: usize },

    #[error("Job {0} already holds a browser")]
    AlreadyLeased(String),

    #[error("No browser leased for job {0}")]
    NotLeased(String),

    #[error("Pool is shut down")]
    ShutDown,

    #[error("Browser launch failed: {0}")]
    Launch(#[from] BrowserError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

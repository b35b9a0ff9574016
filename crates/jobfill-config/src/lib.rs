//! # jobfill config
//!
//! TOML configuration for the autofill engine, browser pool, workflow loop
//! and the collaborators around them.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};

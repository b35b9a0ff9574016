//! Platform-specific strategies.
//!
//! Each platform module supplies a [`PlatformStrategy`](crate::workflow::PlatformStrategy)
//! with its own selectors, waits and action handlers. Register new ones in
//! [`PlatformRegistry::with_builtin`](crate::workflow::PlatformRegistry::with_builtin).

pub mod workday;

pub use workday::WorkdayStrategy;

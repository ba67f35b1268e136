//! The replace coordinator: the §4.8 state machine that ties target resolution, reflow,
//! validation, transactional staging, and diff generation into one call.

pub mod coordinator;

pub use coordinator::{ReplaceCoordinator, ReplaceOptions, ReplaceOutcome};

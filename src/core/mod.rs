//! Core primitives: error taxonomy and the shared cancellation flag.

pub mod errors;
pub mod flag;

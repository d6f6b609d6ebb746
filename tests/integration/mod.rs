//! Integration tests for the translation engine.

pub mod end_to_end;
pub mod profile_loading;
pub mod properties;
pub mod reconciliation;

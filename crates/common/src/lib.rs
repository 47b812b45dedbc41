//! Shared identifier types for the entity lifecycle core.

mod types;

pub use types::{Actor, EntityId};

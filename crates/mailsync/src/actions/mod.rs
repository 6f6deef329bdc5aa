//! Mutations on synced mail

mod handler;

pub use handler::{ActionHandler, DeleteBySenderOutcome};

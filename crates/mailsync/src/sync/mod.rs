//! Sync engine for mirroring a remote mailbox
//!
//! A pass enumerates every remote message reference, ingests new messages
//! in bounded-concurrency batches, then reconciles deletions. Passes are
//! idempotent and safe to retry.

mod engine;
mod reconcile;

pub use engine::{BATCH_SIZE, SyncReport, SyncStats, run_batches, run_sync, sync_mailbox};
pub use reconcile::{ReconcileOutcome, reconcile};

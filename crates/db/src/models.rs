//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models and carry no domain behaviour.
//! Domain types live in the `engine` crate.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// workflow_blobs
// ---------------------------------------------------------------------------

/// A stored blob: the serialized workflow, or one of its backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BlobRow {
    pub key: String,
    /// Serialized JSON payload.
    pub data: String,
    /// Last write, epoch milliseconds.
    pub updated_at: i64,
}

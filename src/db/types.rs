use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Persisted queue states. Success deletes the row, so there is no completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "queue_status", rename_all = "lowercase")]
pub(crate) enum QueueStatus {
    Pending,
    Processing,
    Failed,
}

use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::models::LearningSummaryQueueItem;
use crate::services::learning_summary::{
    summarize_student, HistoryWindow, LearningSummaryStore, SummaryOutcome,
};
use crate::services::openai::GenerationService;

/// A queue row owned by the current run, in the processing state.
///
/// Only [`claim`] produces one, and both ways out consume it: [`ClaimedItem::complete`]
/// deletes the row and [`ClaimedItem::fail`] records the error on it. A failed
/// delete returns the item, which is then failed.
#[derive(Debug)]
pub(crate) struct ClaimedItem {
    item: LearningSummaryQueueItem,
}

impl ClaimedItem {
    pub(crate) fn id(&self) -> &str {
        &self.item.id
    }

    pub(crate) fn student_id(&self) -> &str {
        &self.item.student_id
    }

    /// Deletes the row. On failure the item is handed back so it can still be failed.
    async fn complete(self, store: &dyn LearningSummaryStore) -> Result<(), (Self, anyhow::Error)> {
        match store.delete_item(&self.item.id).await {
            Ok(()) => Ok(()),
            Err(err) => Err((self, err.context("Failed to delete queue item"))),
        }
    }

    async fn fail(self, store: &dyn LearningSummaryStore, error: &str) -> Result<()> {
        store.mark_failed(&self.item.id, error).await.context("Failed to mark queue item failed")
    }
}

pub(crate) async fn claim(store: &dyn LearningSummaryStore, limit: i64) -> Result<Vec<ClaimedItem>> {
    let items = store.claim_pending(limit).await.context("Failed to claim queue items")?;
    Ok(items.into_iter().map(|item| ClaimedItem { item }).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ItemStatus {
    Completed,
    InsufficientHistory,
    Failed,
}

impl ItemStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InsufficientHistory => "insufficient_history",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ItemResult {
    #[serde(rename = "queueItemId")]
    pub(crate) queue_item_id: String,
    pub(crate) student_id: String,
    pub(crate) status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QueueRun {
    pub(crate) processed: usize,
    pub(crate) results: Vec<ItemResult>,
}

/// Claims a batch and processes each item on its own, one at a time.
///
/// An item failure is recorded on that item and never stops the run.
pub(crate) async fn process_queue(
    store: &dyn LearningSummaryStore,
    generator: &dyn GenerationService,
    batch_size: i64,
    max_tokens: u32,
) -> Result<QueueRun> {
    let claimed = claim(store, batch_size).await?;
    if claimed.is_empty() {
        return Ok(QueueRun { processed: 0, results: Vec::new() });
    }

    tracing::info!(claimed = claimed.len(), "Processing learning summary queue");

    let mut results = Vec::with_capacity(claimed.len());
    for item in claimed {
        results.push(process_item(store, generator, item, max_tokens).await);
    }

    let failed = results.iter().filter(|result| result.status == ItemStatus::Failed).count();
    tracing::info!(processed = results.len(), failed, "Learning summary queue run finished");

    Ok(QueueRun { processed: results.len(), results })
}

async fn process_item(
    store: &dyn LearningSummaryStore,
    generator: &dyn GenerationService,
    item: ClaimedItem,
    max_tokens: u32,
) -> ItemResult {
    let queue_item_id = item.id().to_string();
    let student_id = item.student_id().to_string();

    let outcome =
        summarize_student(store, generator, &student_id, HistoryWindow::AfterTrigger, max_tokens)
            .await;

    let (status, error) = match outcome {
        Ok(outcome) => {
            let status = match outcome {
                SummaryOutcome::Updated(_) => ItemStatus::Completed,
                SummaryOutcome::InsufficientHistory { .. } => ItemStatus::InsufficientHistory,
            };
            match item.complete(store).await {
                Ok(()) => (status, None),
                Err((item, err)) => {
                    let message = format!("{err:#}");
                    tracing::error!(queue_item_id = %queue_item_id, student_id = %student_id, error = %message, "Queue item could not be removed");
                    if let Err(mark_err) = item.fail(store, &message).await {
                        tracing::error!(queue_item_id = %queue_item_id, student_id = %student_id, error = %mark_err, "Queue item could not be marked failed");
                    }
                    (ItemStatus::Failed, Some(message))
                }
            }
        }
        Err(err) => {
            let message = err.to_string();
            tracing::error!(queue_item_id = %queue_item_id, student_id = %student_id, error = %message, "Learning summary failed");
            if let Err(mark_err) = item.fail(store, &message).await {
                tracing::error!(queue_item_id = %queue_item_id, student_id = %student_id, error = %mark_err, "Queue item could not be marked failed");
            }
            (ItemStatus::Failed, Some(message))
        }
    };

    metrics::counter!("learning_summary_jobs_total", "status" => status.as_str()).increment(1);

    ItemResult { queue_item_id, student_id, status, error }
}

/// Puts items abandoned in processing back to pending.
pub(crate) async fn recover_stale(store: &dyn LearningSummaryStore, stale_minutes: i64) -> Result<u64> {
    let recovered =
        store.requeue_stale(stale_minutes).await.context("Failed to requeue stale queue items")?;
    if recovered > 0 {
        tracing::warn!(recovered, stale_minutes, "Requeued stale learning summary items");
    }
    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::QueueStatus;
    use crate::services::openai::GenerationError;
    use crate::test_support::{InMemoryLearningStore, ScriptedGenerator};

    #[tokio::test]
    async fn insufficient_history_deletes_without_generation() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["trigger", "only prior"]);
        store.enqueue("q1", "s1");
        let generator = ScriptedGenerator::new(Vec::new());

        let run = process_queue(&store, &generator, 10, 2000).await.expect("run");

        assert_eq!(run.processed, 1);
        assert_eq!(run.results[0].status, ItemStatus::InsufficientHistory);
        assert!(generator.calls().is_empty());
        assert!(store.queue_status("q1").is_none());
    }

    #[tokio::test]
    async fn success_saves_summary_and_deletes_item() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["trigger", "r3", "r2", "r1"]);
        store.enqueue("q1", "s1");
        let generator = ScriptedGenerator::new(vec![Ok("Ava counts with growing confidence.".to_string())]);

        let run = process_queue(&store, &generator, 10, 2000).await.expect("run");

        assert_eq!(run.results[0].status, ItemStatus::Completed);
        assert_eq!(store.summary_for("s1").as_deref(), Some("Ava counts with growing confidence."));
        assert!(store.queue_status("q1").is_none());
        let prompt = generator.calls()[0].user_text();
        assert!(!prompt.contains("trigger"));
        assert!(prompt.contains("r1"));
    }

    #[tokio::test]
    async fn one_failure_does_not_block_later_items() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["t", "a", "b"]);
        store.add_student("s2", "Ben", &["t", "c", "d"]);
        store.add_student("s3", "Cara", &["t", "e", "f"]);
        store.enqueue("q1", "s1");
        store.enqueue("q2", "s2");
        store.enqueue("q3", "s3");
        let generator = ScriptedGenerator::new(vec![
            Ok("Ava summary".to_string()),
            Err(GenerationError::Upstream("model overloaded".to_string())),
            Ok("Cara summary".to_string()),
        ]);

        let run = process_queue(&store, &generator, 10, 2000).await.expect("run");

        let statuses: Vec<ItemStatus> = run.results.iter().map(|result| result.status).collect();
        assert_eq!(statuses, vec![ItemStatus::Completed, ItemStatus::Failed, ItemStatus::Completed]);
        assert!(run.results[1].error.as_deref().is_some_and(|error| error.contains("model overloaded")));
        assert_eq!(store.queue_status("q2"), Some(QueueStatus::Failed));
        assert!(store.failed_error("q2").is_some_and(|error| error.contains("model overloaded")));
        assert_eq!(store.summary_for("s3").as_deref(), Some("Cara summary"));
    }

    #[tokio::test]
    async fn undeletable_item_is_left_failed_not_processing() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["t", "a", "b"]);
        store.enqueue("q1", "s1");
        store.reject_deletes();
        let generator = ScriptedGenerator::new(vec![Ok("Ava summary".to_string())]);

        let run = process_queue(&store, &generator, 10, 2000).await.expect("run");

        assert_eq!(run.results[0].status, ItemStatus::Failed);
        assert_eq!(store.summary_for("s1").as_deref(), Some("Ava summary"));
        assert_eq!(store.queue_status("q1"), Some(QueueStatus::Failed));
        assert!(store.failed_error("q1").is_some_and(|error| error.contains("delete rejected")));
    }

    #[tokio::test]
    async fn claims_respect_batch_size_and_age() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["t"]);
        for id in ["q1", "q2", "q3"] {
            store.enqueue(id, "s1");
        }
        let generator = ScriptedGenerator::new(Vec::new());

        let run = process_queue(&store, &generator, 2, 2000).await.expect("run");

        let ids: Vec<&str> = run.results.iter().map(|result| result.queue_item_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
        assert_eq!(store.queue_status("q3"), Some(QueueStatus::Pending));
    }

    #[tokio::test]
    async fn failed_items_are_not_claimed_again() {
        let store = InMemoryLearningStore::new();
        store.add_student("s1", "Ava", &["t", "a", "b"]);
        store.enqueue("q1", "s1");
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::Transport("timeout".to_string()))]);

        process_queue(&store, &generator, 10, 2000).await.expect("first run");
        let second = process_queue(&store, &generator, 10, 2000).await.expect("second run");

        assert_eq!(second.processed, 0);
        assert_eq!(store.queue_status("q1"), Some(QueueStatus::Failed));
    }

    #[test]
    fn results_serialize_with_expected_keys() {
        let value = serde_json::to_value(ItemResult {
            queue_item_id: "q1".to_string(),
            student_id: "s1".to_string(),
            status: ItemStatus::InsufficientHistory,
            error: None,
        })
        .expect("serialize");
        assert_eq!(value["queueItemId"], "q1");
        assert_eq!(value["student_id"], "s1");
        assert_eq!(value["status"], "insufficient_history");
        assert!(value.get("error").is_none());
    }
}

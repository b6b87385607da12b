use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::LearningSummaryQueueItem;
use crate::services::openai::{ChatRequest, ContentPart, GenerationError, GenerationService, RequestKind};

/// A summary needs at least this many earlier reports to say anything useful.
pub(crate) const MIN_PRIOR_REPORTS: usize = 2;
/// Reports fed into one summary.
pub(crate) const HISTORY_WINDOW: usize = 3;

const SUMMARY_SYSTEM_PROMPT: &str = "You write short internal learning summaries for preschool \
teachers. Use plain British English, no headings, no bullet points and no long dashes.";

#[async_trait]
pub(crate) trait LearningSummaryStore: Send + Sync {
    /// Moves up to `limit` pending items to processing, oldest first.
    async fn claim_pending(&self, limit: i64) -> anyhow::Result<Vec<LearningSummaryQueueItem>>;
    /// Report bodies for a student, newest first.
    async fn recent_reports(&self, student_id: &str, limit: i64) -> anyhow::Result<Vec<String>>;
    async fn student_name(&self, student_id: &str) -> anyhow::Result<Option<String>>;
    async fn save_summary(&self, student_id: &str, summary: &str) -> anyhow::Result<()>;
    async fn delete_item(&self, item_id: &str) -> anyhow::Result<()>;
    async fn mark_failed(&self, item_id: &str, error: &str) -> anyhow::Result<()>;
    /// Returns items stuck in processing for longer than `older_than_minutes` to pending.
    async fn requeue_stale(&self, older_than_minutes: i64) -> anyhow::Result<u64>;
}

/// Which reports feed a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryWindow {
    /// Queue runs: the newest report triggered the job and is skipped.
    AfterTrigger,
    /// On-demand runs: the latest reports as they stand.
    Latest,
}

impl HistoryWindow {
    fn fetch_limit(self) -> i64 {
        match self {
            Self::AfterTrigger => HISTORY_WINDOW as i64 + 1,
            Self::Latest => HISTORY_WINDOW as i64,
        }
    }

    fn select(self, reports: Vec<String>) -> Vec<String> {
        let skip = match self {
            Self::AfterTrigger => 1,
            Self::Latest => 0,
        };
        reports.into_iter().skip(skip).take(HISTORY_WINDOW).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SummaryOutcome {
    Updated(String),
    InsufficientHistory { prior_reports: usize },
}

#[derive(Debug, Error)]
pub(crate) enum SummaryError {
    #[error("student {0} not found")]
    StudentNotFound(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("generation service returned an empty summary")]
    EmptySummary,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub(crate) fn summary_request(student_name: &str, history: &[String], max_tokens: u32) -> ChatRequest {
    let reports = history
        .iter()
        .enumerate()
        .map(|(index, body)| {
            let label = if index == 0 { " (most recent)" } else { "" };
            format!("Report {}{label}:\n{}", index + 1, body.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    ChatRequest {
        kind: RequestKind::LearningSummary,
        system: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
        user: vec![ContentPart::Text(format!(
            "Summarise how {student_name} is progressing, using these recent class reports, \
newest first.\n\n{reports}\n\nCover the overall trajectory, clear strengths, areas that stay \
weak across classes, and any trend between classes. Keep it under 120 words."
        ))],
        max_tokens,
    }
}

/// Summarizes one student's recent reports and stores the result on the student.
pub(crate) async fn summarize_student(
    store: &dyn LearningSummaryStore,
    generator: &dyn GenerationService,
    student_id: &str,
    window: HistoryWindow,
    max_tokens: u32,
) -> Result<SummaryOutcome, SummaryError> {
    let name = store
        .student_name(student_id)
        .await?
        .ok_or_else(|| SummaryError::StudentNotFound(student_id.to_string()))?;

    let reports = store.recent_reports(student_id, window.fetch_limit()).await?;
    let history = window.select(reports);
    if history.len() < MIN_PRIOR_REPORTS {
        tracing::info!(student_id, prior_reports = history.len(), "Not enough reports for a learning summary");
        return Ok(SummaryOutcome::InsufficientHistory { prior_reports: history.len() });
    }

    let completion = generator.complete(summary_request(&name, &history, max_tokens)).await?;
    let summary = completion.content.trim().to_string();
    if summary.is_empty() {
        return Err(SummaryError::EmptySummary);
    }

    store.save_summary(student_id, &summary).await?;
    tracing::info!(
        student_id,
        reports_used = history.len(),
        tokens_used = completion.tokens_used,
        "Learning summary updated"
    );

    Ok(SummaryOutcome::Updated(summary))
}

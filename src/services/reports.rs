use std::time::Instant;

use crate::core::config::BatchMismatchPolicy;
use crate::schemas::report::BatchReportResponse;
use crate::services::batch_splitter::BatchSplit;
use crate::services::openai::{GenerationError, GenerationService};
use crate::services::report_prompt::{batch_report_request, single_report_request, ReportRequest};

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportLimits {
    pub(crate) report_max_tokens: u32,
    pub(crate) batch_tokens_per_student: u32,
}

pub(crate) async fn generate_report(
    generator: &dyn GenerationService,
    request: &ReportRequest,
    limits: ReportLimits,
) -> Result<String, GenerationError> {
    let completion =
        generator.complete(single_report_request(request, limits.report_max_tokens)).await?;
    Ok(completion.content.trim().to_string())
}

/// Generates reports for a whole class in one call.
///
/// A short response is either surfaced as-is or regenerated student by student,
/// depending on `policy`. A failed fallback keeps the original split.
pub(crate) async fn generate_batch(
    generator: &dyn GenerationService,
    requests: &[ReportRequest],
    limits: ReportLimits,
    policy: BatchMismatchPolicy,
) -> Result<BatchReportResponse, GenerationError> {
    let timer = Instant::now();
    let completion = generator
        .complete(batch_report_request(requests, limits.batch_tokens_per_student))
        .await?;
    let split = BatchSplit::from_response(&completion.content, requests.len());

    if !split.is_short() {
        tracing::info!(
            student_count = split.student_count,
            duration_seconds = timer.elapsed().as_secs_f64(),
            "Batch reports generated"
        );
        return Ok(into_response(split, false));
    }

    metrics::counter!("batch_reports_mismatch_total").increment(1);
    tracing::warn!(
        student_count = split.student_count,
        reports_returned = split.reports_returned(),
        policy = policy.as_str(),
        "Batch response returned fewer reports than students"
    );

    if policy == BatchMismatchPolicy::Report {
        return Ok(into_response(split, false));
    }

    let mut reports = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        match generate_report(generator, request, limits).await {
            Ok(report) => reports.push(report),
            Err(err) => {
                tracing::error!(
                    student_index = index,
                    error = %err,
                    "Single-student fallback failed; returning the original batch split"
                );
                return Ok(into_response(split, false));
            }
        }
    }

    tracing::info!(
        student_count = requests.len(),
        duration_seconds = timer.elapsed().as_secs_f64(),
        "Batch reports regenerated one student at a time"
    );
    let student_count = requests.len();
    Ok(into_response(BatchSplit { reports, student_count }, true))
}

fn into_response(split: BatchSplit, fallback_used: bool) -> BatchReportResponse {
    BatchReportResponse {
        reports_returned: split.reports_returned(),
        student_count: split.student_count,
        reports: split.reports,
        fallback_used,
    }
}

use crate::services::report_prompt::STUDENT_SEPARATOR;

/// Splits a batch response into report bodies, in response order.
///
/// Echoed `===STUDENT n===` headers are removed wherever they open a line,
/// segments are trimmed, and empty segments are discarded.
pub(crate) fn split_reports(raw: &str) -> Vec<String> {
    raw.split(STUDENT_SEPARATOR)
        .map(strip_student_headers)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn strip_student_headers(segment: &str) -> String {
    segment
        .lines()
        .filter_map(|line| match strip_header_prefix(line) {
            Some(rest) if rest.trim().is_empty() => None,
            Some(rest) => Some(rest.trim_start()),
            None => Some(line),
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Returns the text after a leading `===STUDENT n===` header, if the line has one.
fn strip_header_prefix(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("===STUDENT")?;
    let rest = rest.trim_start_matches([' ', '_', ':']);
    let digits = rest.len() - rest.trim_start_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    rest[digits..].trim_start().strip_prefix("===")
}

/// A split batch response capped at the number of students asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchSplit {
    pub(crate) reports: Vec<String>,
    pub(crate) student_count: usize,
}

impl BatchSplit {
    pub(crate) fn from_response(raw: &str, student_count: usize) -> Self {
        let mut reports = split_reports(raw);
        if reports.len() > student_count {
            tracing::warn!(
                segments = reports.len(),
                student_count,
                "Batch response had more segments than students; discarding the surplus"
            );
            reports.truncate(student_count);
        }
        Self { reports, student_count }
    }

    pub(crate) fn reports_returned(&self) -> usize {
        self.reports.len()
    }

    pub(crate) fn is_short(&self) -> bool {
        self.reports.len() < self.student_count
    }
}

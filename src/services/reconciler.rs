use async_trait::async_trait;

use crate::db::models::CurriculumActivity;
use crate::schemas::gradesheet::{ActivityMapping, MatchedActivity, Reconciliation};

/// Read access to the curriculum, limited to the two lookups reconciliation needs.
#[async_trait]
pub(crate) trait CurriculumStore: Send + Sync {
    /// Activities with a sequence number for one class, ascending by sequence.
    async fn sequenced_activities(
        &self,
        level: i32,
        class_number: i32,
    ) -> anyhow::Result<Vec<CurriculumActivity>>;

    /// Activities at `level` whose name matches one of `names`, ignoring case.
    async fn activities_by_names(
        &self,
        level: i32,
        names: &[String],
    ) -> anyhow::Result<Vec<CurriculumActivity>>;
}

/// Zips OCR labels against the canonical sequence. The curriculum always wins.
pub(crate) fn map_positions(
    observed: &[String],
    canonical: &[CurriculumActivity],
) -> Vec<ActivityMapping> {
    observed
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let sequence = index + 1;
            match canonical.get(index) {
                Some(activity) => {
                    let warning = (label.to_lowercase()
                        != activity.activity_name.to_lowercase())
                    .then(|| {
                        format!(
                            "Position {sequence}: OCR read \"{label}\" but the curriculum expects \"{}\"",
                            activity.activity_name
                        )
                    });
                    ActivityMapping {
                        ocr_label: label.clone(),
                        activity_name: Some(activity.activity_name.clone()),
                        learning_area: activity.learning_area.clone(),
                        sequence,
                        warning,
                    }
                }
                None => ActivityMapping {
                    ocr_label: label.clone(),
                    activity_name: None,
                    learning_area: None,
                    sequence,
                    warning: Some(format!(
                        "Position {sequence}: no database activity defined at position {sequence} (OCR read \"{label}\")"
                    )),
                },
            }
        })
        .collect()
}

fn positional(
    observed: &[String],
    canonical: &[CurriculumActivity],
    level: i32,
    class_number: i32,
) -> Reconciliation {
    let mappings = map_positions(observed, canonical);
    let mut warnings: Vec<String> =
        mappings.iter().filter_map(|mapping| mapping.warning.clone()).collect();

    if canonical.len() > observed.len() {
        warnings.push(format!(
            "Curriculum defines {} sequenced activities for level {level} class {class_number} but OCR found {}",
            canonical.len(),
            observed.len()
        ));
    }

    Reconciliation::Positional { mappings, warnings }
}

/// Keeps OCR label order and drops repeated names.
fn name_lookup(observed: &[String], found: &[CurriculumActivity]) -> Reconciliation {
    let mut matched: Vec<MatchedActivity> = Vec::new();
    for label in observed {
        let Some(activity) =
            found.iter().find(|activity| activity.activity_name.to_lowercase() == label.to_lowercase())
        else {
            continue;
        };
        if matched.iter().any(|existing| existing.activity_name == activity.activity_name) {
            continue;
        }
        matched.push(MatchedActivity {
            activity_name: activity.activity_name.clone(),
            learning_area: activity.learning_area.clone(),
            sequence: activity.sequence_number,
        });
    }

    Reconciliation::NameLookup { matched }
}

/// Never fails: store errors come back as `Reconciliation::Unavailable`.
pub(crate) async fn reconcile(
    store: &dyn CurriculumStore,
    level: i32,
    class_number: i32,
    observed: &[String],
) -> Reconciliation {
    let canonical = match store.sequenced_activities(level, class_number).await {
        Ok(activities) => activities,
        Err(err) => {
            tracing::warn!(level, class_number, error = %err, "Curriculum sequence lookup failed");
            return Reconciliation::Unavailable { reason: "curriculum lookup failed".to_string() };
        }
    };

    if !canonical.is_empty() {
        let result = positional(observed, &canonical, level, class_number);
        if let Reconciliation::Positional { warnings, .. } = &result {
            metrics::counter!("reconciliation_warnings_total").increment(warnings.len() as u64);
            tracing::info!(
                level,
                class_number,
                observed = observed.len(),
                canonical = canonical.len(),
                warnings = warnings.len(),
                "Positional reconciliation finished"
            );
        }
        return result;
    }

    tracing::info!(level, class_number, "No sequenced curriculum; falling back to name lookup");
    match store.activities_by_names(level, observed).await {
        Ok(found) => name_lookup(observed, &found),
        Err(err) => {
            tracing::warn!(level, error = %err, "Curriculum name lookup failed");
            Reconciliation::Unavailable { reason: "curriculum lookup failed".to_string() }
        }
    }
}

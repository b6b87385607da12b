use std::collections::BTreeMap;

use serde::Serialize;

pub(crate) mod actions;
pub(crate) mod gradesheet;
pub(crate) mod report;

/// Component states keyed by name, ordered for stable output.
#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: &'static str,
    pub(crate) status: &'static str,
    pub(crate) components: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) actions_url: String,
}

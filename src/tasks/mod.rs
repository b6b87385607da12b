pub(crate) mod learning_summary;
pub(crate) mod scheduler;

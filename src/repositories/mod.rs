pub(crate) mod batches;
pub(crate) mod curriculum;
pub(crate) mod health;
pub(crate) mod learning_summary_queue;
pub(crate) mod reports;
pub(crate) mod students;

pub(crate) mod batch_splitter;
pub(crate) mod extraction;
pub(crate) mod learning_summary;
pub(crate) mod openai;
pub(crate) mod reconciler;
pub(crate) mod report_prompt;
pub(crate) mod reports;

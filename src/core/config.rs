mod parsing;
mod settings;
mod types;

pub(crate) use types::{BatchMismatchPolicy, ConfigError, Environment, Settings};

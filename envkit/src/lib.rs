pub mod cli;
pub mod conda;
pub mod config;
pub mod error;
pub mod runner;

pub use conda::CondaRoot;
pub use config::{ConfigRecord, DEFAULT_CONFIG_NAME, DEFAULT_ENV_NAME, ModelEntry};
pub use error::{BootstrapError, Result, ToolFailure};
pub use runner::{CommandRunner, DryRunner, Invocation, RecordingRunner, SystemRunner};

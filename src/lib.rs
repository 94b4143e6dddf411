//! Run a templated command once for every JSON record on an input stream

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod result;
pub mod source;
pub mod template;
pub mod util;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::config::{LogLevel, RunnerConfig};
    pub use crate::error::{Result, RunnerError};
    pub use crate::pipeline::{Pipeline, PipelineConfig, RunSummary};
    pub use crate::process::{Executor, ProcessExecutor};
    pub use crate::result::{ExecutionResult, Outcome, RETURNCODE_FAILURE};
    pub use crate::source::ParameterRecord;
    pub use crate::template::CommandTemplate;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

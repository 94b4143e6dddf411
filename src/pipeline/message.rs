use crate::result::ExecutionResult;
use crate::source::ParameterRecord;

/// A message on the job queue
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// A record to render and run
    Work(ParameterRecord),
    /// Tells exactly one worker to stop
    Shutdown,
}

/// A message on the result queue
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    /// A finished job, or the synthetic result for malformed input
    Result(ExecutionResult),
    /// Tells the sink to stop
    Shutdown,
}

impl From<ExecutionResult> for ResultItem {
    fn from(result: ExecutionResult) -> Self {
        ResultItem::Result(result)
    }
}

//! The concurrent execution pipeline
//!
//! Reader → job queue → worker pool → result queue → sink. The reader runs on
//! a blocking thread, every other stage is a tokio task. Both queues hold at
//! most one item, so a sender waits until a receiver is ready and the number
//! of records in flight stays bounded by the worker count.

mod coordinator;
mod message;
mod sink;
mod worker;

pub use coordinator::{Phase, ReadSummary, ShutdownCoordinator};
pub use message::{ResultItem, WorkItem};
pub use sink::ResultSink;
pub use worker::{SharedJobs, Worker};

use std::io::Read;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, mpsc};

use crate::error::{Result, RunnerError};
use crate::process::Executor;
use crate::source::{ReadEvent, RecordReader, malformed_result};
use crate::template::CommandTemplate;

/// Worker count used when none is configured
pub const DEFAULT_PARALLELISM: usize = 8;

/// Capacity of the job and result queues (the smallest tokio allows)
pub const QUEUE_CAPACITY: usize = 1;

/// Settings fixed for the lifetime of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of workers
    pub parallelism: usize,

    /// Report worker id and resolved program in each result
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            debug: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            return Err(RunnerError::Config("at least one worker required".to_string()));
        }
        Ok(())
    }
}

/// What a finished run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Well-formed records read
    pub records: usize,

    /// Whether input stopped early on a malformed unit
    pub malformed: bool,

    /// Results written to the output
    pub results: usize,
}

/// A configured batch runner
pub struct Pipeline {
    config: PipelineConfig,
    command: Arc<CommandTemplate>,
    executor: Arc<dyn Executor>,
}

impl Pipeline {
    /// Create a new pipeline, rejecting invalid configuration before any I/O
    pub fn new<E: Executor>(
        config: PipelineConfig,
        command: CommandTemplate,
        executor: E,
    ) -> Result<Self> {
        config.validate()?;
        if command.is_empty() {
            return Err(RunnerError::Config("no command given".to_string()));
        }

        Ok(Self {
            config,
            command: Arc::new(command),
            executor: Arc::new(executor),
        })
    }

    /// Run every record read from `input` and write the results to `output`
    ///
    /// Returns once the sink has written the last result, handing the writer back.
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<(RunSummary, W)>
    where
        R: Read + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let parallelism = self.config.parallelism;
        info!("Starting pipeline with {} workers", parallelism);

        let (job_tx, job_rx) = mpsc::channel::<WorkItem>(QUEUE_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel::<ResultItem>(QUEUE_CAPACITY);
        let (done_tx, done_rx) = mpsc::channel::<usize>(parallelism);

        let sink = tokio::spawn(ResultSink::new(output).run(result_rx));

        let jobs: SharedJobs = Arc::new(Mutex::new(job_rx));
        let workers: Vec<_> = (0..parallelism)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    self.config.debug,
                    Arc::clone(&self.command),
                    Arc::clone(&self.executor),
                );
                tokio::spawn(worker.run(Arc::clone(&jobs), result_tx.clone(), done_tx.clone()))
            })
            .collect();
        drop(jobs);
        drop(done_tx);

        let reader = {
            let jobs = job_tx.clone();
            let results = result_tx.clone();
            tokio::task::spawn_blocking(move || feed_jobs(input, jobs, results))
        };

        let coordinator = ShutdownCoordinator::new(parallelism, job_tx, result_tx, done_rx);
        let read = coordinator.shutdown(reader).await?;

        let mut executed = 0;
        for worker in workers {
            executed += worker.await?;
        }
        debug!("Workers ran {} jobs", executed);

        let (output, results) = sink.await??;
        let summary = RunSummary {
            records: read.records,
            malformed: read.malformed,
            results,
        };
        info!(
            "Pipeline finished: {} records, {} results{}",
            summary.records,
            summary.results,
            if summary.malformed { ", input stopped on a malformed record" } else { "" }
        );

        Ok((summary, output))
    }
}

/// Read records and hand them to the workers; runs on a blocking thread
///
/// A malformed unit goes straight to the result queue as a failure and ends
/// the input.
fn feed_jobs<R: Read>(
    input: R,
    jobs: mpsc::Sender<WorkItem>,
    results: mpsc::Sender<ResultItem>,
) -> ReadSummary {
    let mut reader = RecordReader::new(input);
    let mut malformed = false;

    for event in reader.by_ref() {
        match event {
            ReadEvent::Record(record) => {
                if jobs.blocking_send(WorkItem::Work(record)).is_err() {
                    warn!("Job queue closed, no longer reading input");
                    break;
                }
            }
            ReadEvent::Malformed(message) => {
                malformed = true;
                if results.blocking_send(malformed_result(&message).into()).is_err() {
                    warn!("Result queue closed, dropping parse failure: {}", message);
                }
            }
        }
    }

    ReadSummary {
        records: reader.records(),
        malformed,
    }
}

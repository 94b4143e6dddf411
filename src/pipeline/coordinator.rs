use std::fmt;

use log::{debug, trace};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, RunnerError};
use crate::pipeline::message::{ResultItem, WorkItem};

/// Stages of the shutdown handshake, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Running,
    DrainingInput,
    SignalingWorkers,
    DrainingWorkers,
    SignalingSink,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Running => "running",
            Phase::DrainingInput => "draining input",
            Phase::SignalingWorkers => "signaling workers",
            Phase::DrainingWorkers => "draining workers",
            Phase::SignalingSink => "signaling sink",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Totals reported by the input reader once it stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadSummary {
    /// Well-formed records handed to the workers
    pub records: usize,
    /// Whether reading stopped on a malformed unit
    pub malformed: bool,
}

/// Drives reader, workers and sink to a loss-free stop
///
/// No `Shutdown` reaches the sink before every worker has confirmed it is
/// finished, so every result is already queued ahead of it.
pub struct ShutdownCoordinator {
    phase: Phase,
    workers: usize,
    jobs: mpsc::Sender<WorkItem>,
    results: mpsc::Sender<ResultItem>,
    done: mpsc::Receiver<usize>,
}

impl ShutdownCoordinator {
    pub fn new(
        workers: usize,
        jobs: mpsc::Sender<WorkItem>,
        results: mpsc::Sender<ResultItem>,
        done: mpsc::Receiver<usize>,
    ) -> Self {
        Self {
            phase: Phase::Running,
            workers,
            jobs,
            results,
            done,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the whole handshake once the reader has been started
    pub async fn shutdown(mut self, reader: JoinHandle<ReadSummary>) -> Result<ReadSummary> {
        self.advance(Phase::DrainingInput);
        let summary = reader.await?;
        debug!(
            "Input done: {} records{}",
            summary.records,
            if summary.malformed { ", stopped on malformed input" } else { "" }
        );

        self.advance(Phase::SignalingWorkers);
        self.signal_workers().await?;

        self.advance(Phase::DrainingWorkers);
        self.wait_for_workers().await?;

        self.advance(Phase::SignalingSink);
        self.results
            .send(ResultItem::Shutdown)
            .await
            .map_err(|_| RunnerError::Channel("result queue closed before shutdown".to_string()))?;

        self.advance(Phase::Done);
        Ok(summary)
    }

    fn advance(&mut self, next: Phase) {
        debug!("Pipeline phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// One `Shutdown` per worker; each worker consumes exactly one
    async fn signal_workers(&self) -> Result<()> {
        for _ in 0..self.workers {
            self.jobs
                .send(WorkItem::Shutdown)
                .await
                .map_err(|_| RunnerError::Channel("job queue closed before shutdown".to_string()))?;
        }
        Ok(())
    }

    /// Count down until every worker has reported done
    async fn wait_for_workers(&mut self) -> Result<()> {
        let mut completed = 0;
        while completed < self.workers {
            match self.done.recv().await {
                Some(id) => {
                    completed += 1;
                    trace!("Worker {} confirmed shutdown ({}/{})", id, completed, self.workers);
                }
                None => {
                    return Err(RunnerError::Channel(format!(
                        "only {} of {} workers confirmed shutdown",
                        completed, self.workers
                    )));
                }
            }
        }
        Ok(())
    }
}

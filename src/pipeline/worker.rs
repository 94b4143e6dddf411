use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::{Mutex, mpsc};

use crate::pipeline::message::{ResultItem, WorkItem};
use crate::process::Executor;
use crate::template::CommandTemplate;

/// Receiving end of the job queue, shared by every worker
pub type SharedJobs = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// One member of the worker pool
pub struct Worker {
    id: usize,
    debug: bool,
    command: Arc<CommandTemplate>,
    executor: Arc<dyn Executor>,
}

impl Worker {
    pub fn new(
        id: usize,
        debug: bool,
        command: Arc<CommandTemplate>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            id,
            debug,
            command,
            executor,
        }
    }

    /// Take jobs until a `Shutdown` arrives, then report on `done` exactly once
    ///
    /// Returns the number of jobs this worker ran.
    pub async fn run(
        self,
        jobs: SharedJobs,
        results: mpsc::Sender<ResultItem>,
        done: mpsc::Sender<usize>,
    ) -> usize {
        debug!("Worker {} started", self.id);
        let mut completed = 0;

        loop {
            // The lock is held only while waiting, so each item goes to one worker.
            let item = jobs.lock().await.recv().await;

            let record = match item {
                Some(WorkItem::Work(record)) => record,
                Some(WorkItem::Shutdown) => break,
                None => {
                    warn!("Worker {}: job queue closed without a shutdown", self.id);
                    break;
                }
            };

            let argv = self.command.render(&record);
            drop(record);
            let mut result = self.executor.execute(argv).await;
            if self.debug {
                result.worker_id = Some(self.id);
            } else {
                result = result.without_debug_fields();
            }
            trace!("Worker {} finished {:?}", self.id, result.command);
            completed += 1;

            if results.send(ResultItem::Result(result)).await.is_err() {
                warn!("Worker {}: result queue closed, dropping result", self.id);
            }
        }

        debug!("Worker {} stopping after {} jobs", self.id, completed);
        if done.send(self.id).await.is_err() {
            warn!("Worker {}: nobody is waiting for the done signal", self.id);
        }
        completed
    }
}

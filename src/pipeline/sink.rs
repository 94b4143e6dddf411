use log::{debug, error};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Result, RunnerError};
use crate::pipeline::message::ResultItem;
use crate::result::ExecutionResult;

/// Writes results as newline-delimited JSON, in arrival order
pub struct ResultSink<W> {
    output: W,
    written: usize,
    failure: Option<RunnerError>,
}

impl<W: AsyncWrite + Unpin + Send> ResultSink<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            written: 0,
            failure: None,
        }
    }

    /// Consume results until the `Shutdown` item, returning the writer and count
    ///
    /// After a write failure the remaining results are received and discarded,
    /// so that workers blocked on the result queue can still finish.
    pub async fn run(mut self, mut results: mpsc::Receiver<ResultItem>) -> Result<(W, usize)> {
        loop {
            match results.recv().await {
                Some(ResultItem::Result(result)) => {
                    if self.failure.is_none() {
                        if let Err(e) = self.write(&result).await {
                            error!("Failed to write result, discarding the rest: {}", e);
                            self.failure = Some(e);
                        }
                    }
                }
                Some(ResultItem::Shutdown) => break,
                None => {
                    self.failure.get_or_insert_with(|| {
                        RunnerError::Channel("result queue closed before shutdown".to_string())
                    });
                    break;
                }
            }
        }

        debug!("Result sink stopping after {} results", self.written);
        match self.failure {
            Some(e) => Err(e),
            None => Ok((self.output, self.written)),
        }
    }

    async fn write(&mut self, result: &ExecutionResult) -> Result<()> {
        let mut line = serde_json::to_vec(result).map_err(|e| RunnerError::Output(e.to_string()))?;
        line.push(b'\n');

        self.output
            .write_all(&line)
            .await
            .map_err(|e| RunnerError::Output(e.to_string()))?;
        self.output.flush().await.map_err(|e| RunnerError::Output(e.to_string()))?;
        self.written += 1;
        Ok(())
    }
}

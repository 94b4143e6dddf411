use std::io::Read;

use log::{debug, warn};
use serde_json::{Deserializer, StreamDeserializer, Value, de::IoRead};

use crate::result::ExecutionResult;

/// One decoded unit of structured input, used as the rendering context for one job
pub type ParameterRecord = Value;

/// An event produced while reading the input stream
#[derive(Debug, Clone, PartialEq)]
pub enum ReadEvent {
    /// A well-formed record
    Record(ParameterRecord),
    /// A decode failure; no further events follow
    Malformed(String),
}

/// Decodes back-to-back JSON values from a byte stream
///
/// Reading stops for good at the first malformed unit.
pub struct RecordReader<R: Read> {
    stream: StreamDeserializer<'static, IoRead<R>, Value>,
    finished: bool,
    records: usize,
}

impl<R: Read> RecordReader<R> {
    /// Create a new record reader over `input`
    pub fn new(input: R) -> Self {
        Self {
            stream: Deserializer::from_reader(input).into_iter::<Value>(),
            finished: false,
            records: 0,
        }
    }

    /// Number of well-formed records read so far
    pub fn records(&self) -> usize {
        self.records
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = ReadEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.stream.next() {
            Some(Ok(value)) => {
                self.records += 1;
                Some(ReadEvent::Record(value))
            }
            Some(Err(e)) => {
                warn!("Stopping input after {} records: {}", self.records, e);
                self.finished = true;
                Some(ReadEvent::Malformed(e.to_string()))
            }
            None => {
                debug!("End of input after {} records", self.records);
                self.finished = true;
                None
            }
        }
    }
}

/// The synthetic result reported for an input unit that could not be decoded
pub fn malformed_result(message: &str) -> ExecutionResult {
    ExecutionResult::failure(Vec::new(), format!("parse error: {}", message))
}

//! Correlation of markers from the two interpreter streams
//!
//! Each reader task turns its stream into [`StreamEvent`]s: one per marker,
//! carrying the lines buffered since the previous marker, and one when the
//! stream closes. The [`Demultiplexer`] consumes events from both readers and
//! reports a command complete only after its marker has been seen on both
//! standard output and standard error.

use std::collections::HashMap;

use super::marker::Marker;
use crate::types::identifiers::CommandId;

/// Which interpreter stream an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Standard output
    Output,
    /// Standard error
    Error,
}

impl Stream {
    /// Short name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Output => "stdout",
            Self::Error => "stderr",
        }
    }
}

/// Event sent from a reader task to the correlator
#[derive(Debug)]
pub enum StreamEvent {
    /// A marker was read; `lines` is everything buffered since the last one
    Marker {
        /// Source stream
        stream: Stream,
        /// Parsed marker
        marker: Marker,
        /// Lines preceding the marker on this stream
        lines: Vec<String>,
    },
    /// The stream reached end-of-file
    Closed {
        /// Source stream
        stream: Stream,
        /// Lines read after the last marker
        unclaimed: Vec<String>,
    },
}

/// Per-command correlation state
#[derive(Debug, Default)]
struct ShellData {
    output_done: bool,
    error_done: bool,
    exit_code: String,
    outputs: Vec<String>,
    errors: Vec<String>,
    asynchronous: bool,
}

/// A command whose marker has been seen on both streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Completed command
    pub id: CommandId,
    /// Exit status text from the marker
    pub exit_code: String,
    /// Standard-output lines
    pub outputs: Vec<String>,
    /// Standard-error lines
    pub errors: Vec<String>,
    /// Whether the marker carried the asynchronous flag
    pub asynchronous: bool,
}

/// The interpreter stopped honouring the marker protocol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpreterExit {
    /// Error-stream text arrived that no marker claimed
    pub broken_pipe: bool,
    /// Output lines read after the last marker
    pub unclaimed_output: Vec<String>,
    /// Error lines read after the last marker
    pub unclaimed_errors: Vec<String>,
    /// Commands whose marker arrived on only one stream, oldest first
    pub partial: Vec<Completion>,
}

/// Result of feeding one event to the demultiplexer
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Nothing to deliver yet
    Waiting,
    /// A command finished on both streams
    Completed(Completion),
    /// The interpreter is gone or broken; the session must be recovered
    InterpreterGone(InterpreterExit),
}

/// Marker rendezvous state machine
#[derive(Debug, Default)]
pub struct Demultiplexer {
    in_flight: HashMap<CommandId, ShellData>,
    output_closed: Option<Vec<String>>,
    error_closed: Option<Vec<String>>,
    finished: bool,
}

impl Demultiplexer {
    /// Create an empty demultiplexer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands seen on exactly one stream so far
    #[must_use]
    pub fn half_complete(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether the interpreter has already been reported gone
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one reader event
    pub fn handle(&mut self, event: StreamEvent) -> Step {
        if self.finished {
            return Step::Waiting;
        }
        match event {
            StreamEvent::Marker {
                stream,
                marker,
                lines,
            } => self.on_marker(stream, marker, lines),
            StreamEvent::Closed { stream, unclaimed } => self.on_closed(stream, unclaimed),
        }
    }

    fn on_marker(&mut self, stream: Stream, marker: Marker, lines: Vec<String>) -> Step {
        let data = self.in_flight.entry(marker.id).or_insert_with(|| ShellData {
            exit_code: marker.exit_code.clone(),
            asynchronous: marker.asynchronous,
            ..ShellData::default()
        });

        match stream {
            Stream::Output => {
                data.output_done = true;
                data.outputs = lines;
            }
            Stream::Error => {
                data.error_done = true;
                data.errors = lines;
            }
        }

        if !(data.output_done && data.error_done) {
            return Step::Waiting;
        }

        let Some(data) = self.in_flight.remove(&marker.id) else {
            return Step::Waiting;
        };
        Step::Completed(Completion {
            id: marker.id,
            exit_code: data.exit_code,
            outputs: data.outputs,
            errors: data.errors,
            asynchronous: data.asynchronous,
        })
    }

    fn on_closed(&mut self, stream: Stream, unclaimed: Vec<String>) -> Step {
        match stream {
            Stream::Output => self.output_closed = Some(unclaimed),
            Stream::Error => self.error_closed = Some(unclaimed),
        }

        let broken_pipe = self.error_closed.as_ref().is_some_and(|e| !e.is_empty());
        let both_closed = self.output_closed.is_some() && self.error_closed.is_some();
        if !(broken_pipe || both_closed) {
            return Step::Waiting;
        }

        self.finished = true;
        let mut partial: Vec<Completion> = self
            .in_flight
            .drain()
            .map(|(id, data)| Completion {
                id,
                exit_code: data.exit_code,
                outputs: data.outputs,
                errors: data.errors,
                asynchronous: data.asynchronous,
            })
            .collect();
        partial.sort_by_key(|c| c.id);
        if !partial.is_empty() {
            log::debug!(
                target: crate::LOG_TARGET,
                "{} command(s) seen on one stream only at interpreter exit",
                partial.len()
            );
        }
        Step::InterpreterGone(InterpreterExit {
            broken_pipe,
            unclaimed_output: self.output_closed.take().unwrap_or_default(),
            unclaimed_errors: self.error_closed.take().unwrap_or_default(),
            partial,
        })
    }
}

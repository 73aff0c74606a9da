//! Line protocol spoken with the interpreter
//!
//! - [`marker`] frames scripts and recognises completion markers
//! - [`demux`] correlates markers from standard output and standard error

pub mod demux;
pub mod marker;

pub use demux::{Completion, Demultiplexer, InterpreterExit, Step, Stream, StreamEvent};
pub use marker::{Marker, ScannedLine, frame_script, scan_line};

//! Diagnostic text output
//!
//! [`DebugStream`] fans text out to one or more [`TextSink`]s. Every component
//! writes its diagnostic lines here; the default sink forwards them to
//! `tracing`.

pub mod sinks;
pub mod stream;

pub use sinks::{BufferSink, TracingSink, WriterSink};
pub use stream::{DebugStream, SinkId, TextSink};

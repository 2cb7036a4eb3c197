//! Debug output multiplexer
//!
//! Holds an append-only list of text sinks and routes writes either to the
//! selected sink or to every sink in registration order.

use std::fmt;

/// A destination for diagnostic text.
///
/// Implementations report how many bytes they accepted; a short count means
/// the destination is saturated.
pub trait TextSink: Send {
    /// Write a buffer, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Write a single byte, returning 1 if accepted
    fn write_byte(&mut self, byte: u8) -> usize {
        self.write(&[byte])
    }
}

impl<T: TextSink + ?Sized> TextSink for Box<T> {
    fn write(&mut self, buf: &[u8]) -> usize {
        (**self).write(buf)
    }

    fn write_byte(&mut self, byte: u8) -> usize {
        (**self).write_byte(byte)
    }
}

/// Handle to a registered sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(usize);

/// Multiplexed debug output
#[derive(Default)]
pub struct DebugStream {
    sinks: Vec<Box<dyn TextSink>>,
    selected: Option<usize>,
    broadcast: bool,
}

impl DebugStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream with one sink, selected
    pub fn with_sink(sink: Box<dyn TextSink>) -> Self {
        let mut stream = Self::new();
        stream.add_sink(sink, true);
        stream
    }

    /// Register a sink. When `make_default` is set the new sink becomes the
    /// selected one.
    pub fn add_sink(&mut self, sink: Box<dyn TextSink>, make_default: bool) -> SinkId {
        self.sinks.push(sink);
        let id = SinkId(self.sinks.len() - 1);
        if make_default {
            self.selected = Some(id.0);
        }
        id
    }

    /// Select the sink used outside broadcast mode. Unknown ids are ignored.
    pub fn select(&mut self, id: SinkId) {
        if id.0 < self.sinks.len() {
            self.selected = Some(id.0);
        }
    }

    pub fn selected(&self) -> Option<SinkId> {
        self.selected.map(SinkId)
    }

    /// Enable or disable broadcasting to every sink
    pub fn set_broadcast(&mut self, enabled: bool) {
        self.broadcast = enabled;
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Write one byte.
    ///
    /// In broadcast mode stops at the first sink that does not accept it and
    /// returns that sink's count. With no target sink, returns 0.
    pub fn write_byte(&mut self, byte: u8) -> usize {
        if !self.broadcast {
            return match self.selected.and_then(|index| self.sinks.get_mut(index)) {
                Some(sink) => sink.write_byte(byte),
                None => 0,
            };
        }

        let mut accepted = 0;
        for sink in self.sinks.iter_mut() {
            accepted = sink.write_byte(byte);
            if accepted != 1 {
                break;
            }
        }
        accepted
    }

    /// Write a buffer.
    ///
    /// In broadcast mode stops at the first sink that under-accepts and
    /// returns its count, so the result reflects the slowest reporter seen.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if !self.broadcast {
            return match self.selected.and_then(|index| self.sinks.get_mut(index)) {
                Some(sink) => sink.write(buf),
                None => 0,
            };
        }

        let mut accepted = 0;
        for sink in self.sinks.iter_mut() {
            accepted = sink.write(buf);
            if accepted != buf.len() {
                break;
            }
        }
        accepted
    }

    /// Write a line terminated by `\n`
    pub fn println(&mut self, line: &str) -> usize {
        let accepted = self.write(line.as_bytes());
        accepted + self.write_byte(b'\n')
    }
}

impl TextSink for DebugStream {
    fn write(&mut self, buf: &[u8]) -> usize {
        DebugStream::write(self, buf)
    }

    fn write_byte(&mut self, byte: u8) -> usize {
        DebugStream::write_byte(self, byte)
    }
}

impl fmt::Write for DebugStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Short writes are not errors for a diagnostic channel
        DebugStream::write(self, s.as_bytes());
        Ok(())
    }
}

impl fmt::Debug for DebugStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugStream")
            .field("sinks", &self.sinks.len())
            .field("selected", &self.selected)
            .field("broadcast", &self.broadcast)
            .finish()
    }
}

/// Write a formatted line to a [`DebugStream`]
#[macro_export]
macro_rules! debugln {
    ($stream:expr) => {
        $stream.println("")
    };
    ($stream:expr, $($arg:tt)*) => {{
        use ::std::fmt::Write as _;
        let _ = $stream.write_fmt(format_args!($($arg)*));
        $stream.write_byte(b'\n')
    }};
}

//! Concrete debug sinks

use super::stream::TextSink;
use std::io;
use std::sync::{Arc, Mutex};

/// Line-buffered sink that forwards each completed line to `tracing`
#[derive(Debug, Default)]
pub struct TracingSink {
    line: Vec<u8>,
}

/// Lines longer than this are flushed without waiting for a newline
const MAX_LINE: usize = 512;

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_line(&mut self) {
        if self.line.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.line);
        let text = text.trim_end_matches('\r');
        tracing::info!(target: "debug_stream", "{}", text);
        self.line.clear();
    }
}

impl TextSink for TracingSink {
    fn write(&mut self, buf: &[u8]) -> usize {
        for &byte in buf {
            if byte == b'\n' {
                self.flush_line();
            } else {
                self.line.push(byte);
                if self.line.len() >= MAX_LINE {
                    self.flush_line();
                }
            }
        }
        buf.len()
    }
}

impl Drop for TracingSink {
    fn drop(&mut self) {
        self.flush_line();
    }
}

/// Adapter over any [`io::Write`] (a serial device, a log file)
pub struct WriterSink<W: io::Write> {
    inner: W,
}

impl<W: io::Write> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write + Send> TextSink for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> usize {
        // A single write call; partial acceptance is reported, not retried
        match self.inner.write(buf) {
            Ok(written) => {
                if buf.contains(&b'\n') {
                    let _ = self.inner.flush();
                }
                written
            }
            Err(_) => 0,
        }
    }
}

/// In-memory sink with an optional capacity.
///
/// Clones share the same buffer, so a test or a status display can keep a
/// handle while the stream owns another.
#[derive(Debug, Clone)]
pub struct BufferSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    capacity: Option<usize>,
}

impl BufferSink {
    /// Sink that accepts everything
    pub fn unbounded() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            capacity: None,
        }
    }

    /// Sink that accepts at most `capacity` bytes in total
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            capacity: Some(capacity),
        }
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        match self.buffer.lock() {
            Ok(buffer) => String::from_utf8_lossy(&buffer).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// Completed lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .split_terminator('\n')
            .map(str::to_string)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

impl TextSink for BufferSink {
    fn write(&mut self, buf: &[u8]) -> usize {
        let Ok(mut buffer) = self.buffer.lock() else {
            return 0;
        };
        let room = match self.capacity {
            Some(capacity) => capacity.saturating_sub(buffer.len()),
            None => buf.len(),
        };
        let accepted = room.min(buf.len());
        buffer.extend_from_slice(&buf[..accepted]);
        accepted
    }
}

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Bounded in-memory log shown in the TUI log pane.
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    pushed: u64,
}

pub type SharedLogBuffer = Arc<Mutex<LogBuffer>>;

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            pushed: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedLogBuffer {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.pushed += 1;
    }

    /// Lines ever accepted, including ones already evicted.
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Up to `count` lines ending `scroll` lines before the newest, oldest first.
    pub fn window(&self, scroll: usize, count: usize) -> Vec<String> {
        let end = self.lines.len().saturating_sub(scroll);
        let start = end.saturating_sub(count);
        self.lines.range(start..end).cloned().collect()
    }
}

/// `MakeWriter` that splits formatted events into lines of a [`LogBuffer`].
#[derive(Clone)]
pub struct BufferMakeWriter {
    buffer: SharedLogBuffer,
}

impl BufferMakeWriter {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl<'a> MakeWriter<'a> for BufferMakeWriter {
    type Writer = BufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BufferWriter {
            buffer: self.buffer.clone(),
            pending: String::new(),
        }
    }
}

pub struct BufferWriter {
    buffer: SharedLogBuffer,
    pending: String,
}

impl BufferWriter {
    fn drain_complete_lines(&mut self) {
        while let Some(idx) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=idx).collect();
            self.buffer.lock().push(line.trim_end_matches(['\r', '\n']));
        }
    }
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));
        self.drain_complete_lines();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete_lines();
        Ok(())
    }
}

impl Drop for BufferWriter {
    fn drop(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        self.buffer.lock().push(rest.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferMakeWriter, LogBuffer};
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn buffer_drops_oldest_and_skips_blank_lines() {
        let mut buf = LogBuffer::new(2);
        buf.push("a");
        buf.push("   ");
        buf.push("b");
        buf.push("c");
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.pushed(), 3);
        assert_eq!(buf.window(0, 10), vec!["b", "c"]);
    }

    #[test]
    fn window_scrolls_back_from_newest() {
        let mut buf = LogBuffer::new(10);
        for i in 0..5 {
            buf.push(format!("line {i}"));
        }
        assert_eq!(buf.window(0, 2), vec!["line 3", "line 4"]);
        assert_eq!(buf.window(2, 2), vec!["line 1", "line 2"]);
        assert!(buf.window(9, 2).is_empty());
    }

    #[test]
    fn writer_splits_lines_and_flushes_tail_on_drop() {
        let shared = LogBuffer::shared(10);
        let make = BufferMakeWriter::new(shared.clone());
        {
            let mut writer = make.make_writer();
            writer.write_all(b"first\r\nsec").expect("write");
            writer.write_all(b"ond\nthird").expect("write");
            assert_eq!(shared.lock().len(), 2);
        }
        assert_eq!(shared.lock().window(0, 10), vec!["first", "second", "third"]);
    }
}

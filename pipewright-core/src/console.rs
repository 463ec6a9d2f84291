//! The diagnostics console commands echo to.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// A shareable handle to the sink that receives command echoes, exit codes,
/// and long-running notices. Clones write to the same sink; each write locks
/// it, so concurrent collectors interleave whole writes.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    /// Wraps a writer.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Returns a console writing to the process's standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn with_sink<T>(
        &self,
        f: impl FnOnce(&mut dyn Write) -> std::io::Result<T>,
    ) -> std::io::Result<T> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| std::io::Error::other("console sink poisoned"))?;
        f(sink.as_mut())
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdout()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.with_sink(|sink| sink.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.with_sink(|sink| sink.write_all(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.with_sink(|sink| sink.flush())
    }
}

/// An in-memory sink whose contents can be read back after being handed to a
/// [`Console`].
#[derive(Clone, Debug, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    /// Creates an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|buffer| String::from_utf8_lossy(&buffer).into_owned())
            .unwrap_or_default()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::other("capture buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_a_sink() {
        let captured = CapturedOutput::new();
        let console = Console::new(captured.clone());

        let mut first = console.clone();
        let mut second = console;
        write!(first, "a").unwrap();
        write!(second, "b").unwrap();

        assert_eq!(captured.contents(), "ab");
    }

    #[test]
    fn flush_passes_through_to_the_sink() {
        let captured = CapturedOutput::new();
        let mut console = Console::new(captured.clone());

        write!(console, "pending").unwrap();
        console.flush().unwrap();

        assert_eq!(captured.contents(), "pending");
    }
}

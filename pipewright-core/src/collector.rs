//! Deadlock-free collection of a child process's output.
//!
//! A child that fills one pipe's kernel buffer blocks until that pipe is
//! drained, so reading one stream to completion before the other can hang
//! both processes. The collector instead waits for readiness across every
//! still-open stream and reads whatever is available from each.
//!
//! Output is buffered for a while after spawn. If the command is still running
//! once the echo deadline passes, the buffered output is printed once as a
//! "long running" notice and everything read afterwards is echoed live.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::error;
use crate::options::CollectorOptions;
use crate::results::StreamId;
use crate::sys::{self, pipes::PipeReader, poll::Readiness};
use crate::trace_categories;

/// Lifecycle of one in-flight command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectorState {
    /// Launched with pipes open; nothing consumed yet.
    Spawned,
    /// Multiplexing over the still-open output streams.
    Draining,
    /// The child has terminated; remaining output is being drained.
    Exited,
    /// Exit code and stream content are final.
    Collected,
}

/// The final exit code and per-stream content of a collected command.
#[derive(Debug)]
pub(crate) struct Collected {
    pub exit_code: i32,
    pub streams: BTreeMap<StreamId, Vec<u8>>,
}

struct LiveStream {
    id: StreamId,
    reader: PipeReader,
}

#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    /// Nothing more to read for now.
    Pending,
    /// The write end has been closed and everything was read.
    Eof,
}

/// What happens to freshly read bytes besides accumulation.
enum Echo {
    /// Before the deadline: held back for a possible notice.
    Buffering(Vec<u8>),
    /// After the deadline: written straight to the console.
    Live,
    /// Long-running echo is disabled.
    Off,
}

/// Drains one child's output streams and determines its exit code.
pub(crate) struct Collector<'a> {
    command: &'a str,
    options: &'a CollectorOptions,
    console: &'a mut dyn Write,
    state: CollectorState,
    accumulators: BTreeMap<StreamId, Vec<Vec<u8>>>,
    echo: Echo,
}

impl<'a> Collector<'a> {
    pub fn new(
        command: &'a str,
        options: &'a CollectorOptions,
        console: &'a mut dyn Write,
    ) -> Self {
        let echo = if options.echo_long_running {
            Echo::Buffering(Vec::new())
        } else {
            Echo::Off
        };

        Self {
            command,
            options,
            console,
            state: CollectorState::Spawned,
            accumulators: BTreeMap::new(),
            echo,
        }
    }

    fn transition(&mut self, state: CollectorState) {
        tracing::debug!(target: trace_categories::COLLECTOR, "{}: {} -> {state}", self.command, self.state);
        self.state = state;
    }

    /// Runs the collection loop to completion.
    ///
    /// If collection fails, the child is killed and reaped before the error
    /// is returned.
    ///
    /// # Arguments
    ///
    /// * `child` - The spawned process.
    /// * `streams` - The read ends of the child's output pipes, by stream.
    /// * `spawned_at` - When the child was launched; the echo deadline is
    ///   measured from here.
    pub fn collect(
        mut self,
        child: &mut std::process::Child,
        streams: Vec<(StreamId, PipeReader)>,
        spawned_at: Instant,
    ) -> Result<Collected, error::Error> {
        self.drain(child, streams, spawned_at).inspect_err(|e| {
            tracing::debug!(target: trace_categories::COLLECTOR, "{}: collection failed: {e}", self.command);
            abandon(child);
        })
    }

    fn drain(
        &mut self,
        child: &mut std::process::Child,
        streams: Vec<(StreamId, PipeReader)>,
        spawned_at: Instant,
    ) -> Result<Collected, error::Error> {
        let mut live = Vec::with_capacity(streams.len());
        for (id, reader) in streams {
            sys::pipes::set_nonblocking(&reader)?;
            self.accumulators.insert(id, Vec::new());
            live.push(LiveStream { id, reader });
        }

        let echo_deadline = spawned_at + self.options.echo_after();
        let mut exit_code = None;

        self.transition(CollectorState::Draining);

        while !live.is_empty() {
            if let Some(status) = child.try_wait()? {
                exit_code = Some(sys::process::exit_code(status));
                self.transition(CollectorState::Exited);
                for mut stream in live.drain(..) {
                    self.read_available(stream.id, &mut stream.reader)?;
                }
                break;
            }

            let wait = self.next_wait(echo_deadline)?;

            let readiness = {
                let readers: Vec<&PipeReader> = live.iter().map(|s| &s.reader).collect();
                sys::poll::wait_readable(&readers, wait)?
            };

            let mut closed = vec![];
            for (index, ready) in readiness.into_iter().enumerate() {
                let stream = &mut live[index];
                if self.on_ready(stream.id, &mut stream.reader, ready)? == ReadOutcome::Eof {
                    closed.push(index);
                }
            }

            for index in closed.into_iter().rev() {
                let stream = live.remove(index);
                tracing::debug!(target: trace_categories::COLLECTOR, "{}: stream {} reached EOF", self.command, stream.id);
            }
        }

        // All streams closed before the exit poll noticed the child.
        let exit_code = match exit_code {
            Some(exit_code) => exit_code,
            None => {
                let status = child.wait()?;
                self.transition(CollectorState::Exited);
                sys::process::exit_code(status)
            }
        };

        self.transition(CollectorState::Collected);

        let streams = std::mem::take(&mut self.accumulators)
            .into_iter()
            .map(|(id, chunks)| (id, chunks.concat()))
            .collect();

        Ok(Collected { exit_code, streams })
    }

    /// Acts on the readiness reported for one stream.
    fn on_ready(
        &mut self,
        stream: StreamId,
        reader: &mut impl Read,
        ready: Readiness,
    ) -> Result<ReadOutcome, error::Error> {
        match ready {
            Readiness::Idle => Ok(ReadOutcome::Pending),
            Readiness::Errored => Err(error::Error::StreamError { stream }),
            Readiness::Readable => self.read_available(stream, reader),
        }
    }

    /// Flushes the buffered output once the echo deadline has passed and
    /// returns how long the next readiness wait may last.
    fn next_wait(&mut self, echo_deadline: Instant) -> Result<Duration, error::Error> {
        let poll_interval = self.options.poll_interval();

        if !matches!(self.echo, Echo::Buffering(_)) {
            return Ok(poll_interval);
        }

        let now = Instant::now();
        if now < echo_deadline {
            return Ok(poll_interval.min(echo_deadline - now));
        }

        if let Echo::Buffering(buffered) = std::mem::replace(&mut self.echo, Echo::Live) {
            writeln!(self.console)?;
            writeln!(self.console, "Long running command output:")?;
            self.console.write_all(&buffered)?;
            writeln!(self.console)?;
            self.console.flush()?;
            tracing::debug!(target: trace_categories::COLLECTOR, "{}: passed echo deadline; echoing live", self.command);
        }

        Ok(poll_interval)
    }

    /// Reads from a stream until it would block or reaches EOF.
    fn read_available(
        &mut self,
        stream: StreamId,
        reader: &mut impl Read,
    ) -> Result<ReadOutcome, error::Error> {
        let mut chunk = vec![0; self.options.read_chunk_size.max(1)];
        let mut retries_left = self.options.immediate_retries;
        let mut read_any = false;

        loop {
            match reader.read(&mut chunk) {
                Ok(0) => return Ok(ReadOutcome::Eof),
                Ok(count) => {
                    read_any = true;
                    self.accept(stream, &chunk[..count])?;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if read_any || retries_left == 0 {
                        return Ok(ReadOutcome::Pending);
                    }
                    retries_left -= 1;
                    tracing::trace!(target: trace_categories::COLLECTOR, "{}: stream {stream} would block; retrying", self.command);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn accept(&mut self, stream: StreamId, bytes: &[u8]) -> Result<(), error::Error> {
        if let Some(chunks) = self.accumulators.get_mut(&stream) {
            chunks.push(bytes.to_vec());
        }

        match &mut self.echo {
            Echo::Buffering(buffered) => buffered.extend_from_slice(bytes),
            Echo::Live => {
                self.console.write_all(bytes)?;
                self.console.flush()?;
            }
            Echo::Off => (),
        }

        Ok(())
    }
}

/// Kills and reaps a child whose output can no longer be collected.
fn abandon(child: &mut std::process::Child) {
    // Fails only if the child was already reaped.
    let _ = child.kill();

    match child.wait() {
        Ok(status) => {
            tracing::debug!(target: trace_categories::COLLECTOR, "abandoned pid {} exited: {status}", child.id());
        }
        Err(e) => {
            tracing::warn!(target: trace_categories::COLLECTOR, "failed to reap pid {}: {e}", child.id());
        }
    }
}

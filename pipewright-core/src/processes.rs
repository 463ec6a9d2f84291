//! Process management

use std::collections::HashSet;
use std::io::Write;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::Instant;

use crate::collector::Collector;
use crate::command::Command;
use crate::console::Console;
use crate::env::EnvScope;
use crate::options::{ExecutorOptions, SpawnMode};
use crate::results::{CommandResult, STDERR, STDOUT, StreamId};
use crate::spec;
use crate::sys::{self, pipes::PipeReader};
use crate::{error, trace_categories};

/// Process IDs of background children to interrupt when this process exits.
static BACKGROUND_PROCESSES: LazyLock<Mutex<HashSet<u32>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

static EXIT_HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn interrupt_background_processes() {
    if let Ok(pids) = BACKGROUND_PROCESSES.lock() {
        for pid in pids.iter() {
            // The child may already be gone; nothing useful can be done
            // about a failure this late.
            let _ = sys::signal::interrupt_process(*pid);
        }
    }
}

fn ensure_exit_hook() -> Result<(), error::Error> {
    if EXIT_HOOK_INSTALLED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Ok(());
    }

    sys::exit::register_exit_hook(interrupt_background_processes).inspect_err(|_| {
        EXIT_HOOK_INSTALLED.store(false, Ordering::Release);
    })
}

/// A spawned command whose output has not been collected yet.
#[derive(Debug)]
pub struct RunningCommand {
    command: String,
    child: std::process::Child,
    streams: Vec<(StreamId, PipeReader)>,
    spawned_at: Instant,
    options: ExecutorOptions,
    console: Console,
}

impl RunningCommand {
    /// Returns the ID of the spawned process.
    pub fn process_id(&self) -> u32 {
        self.child.id()
    }

    /// Returns the command as rendered for diagnostics.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Drains the child's output, waits for it to exit, and returns the
    /// completed result. Blocks the calling thread until then.
    pub fn collect(mut self) -> Result<CommandResult, error::Error> {
        let process_id = self.child.id();
        let mut console = self.console.clone();

        let collected = Collector::new(&self.command, &self.options.collector, &mut console)
            .collect(&mut self.child, self.streams, self.spawned_at)?;

        tracing::debug!(target: trace_categories::COMMANDS, "{}: exited with {}", self.command, collected.exit_code);

        Ok(CommandResult::new(
            self.command,
            Some(process_id),
            collected.exit_code,
            collected.streams,
        ))
    }
}

/// A child that was started and left running on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetachedProcess {
    command: String,
    process_id: u32,
}

impl DetachedProcess {
    /// Returns the command as rendered for diagnostics.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the ID of the detached process.
    pub const fn process_id(&self) -> u32 {
        self.process_id
    }
}

/// Runs commands as real OS processes.
#[derive(Clone, Debug, Default)]
pub struct ProcessExecutor {
    options: ExecutorOptions,
    console: Console,
}

impl ProcessExecutor {
    /// Creates an executor that echoes to standard output.
    ///
    /// # Arguments
    ///
    /// * `options` - Spawn and collection options.
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            console: Console::stdout(),
        }
    }

    /// Replaces the diagnostics console.
    #[must_use]
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Returns the executor's options.
    pub const fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    fn builder(
        &self,
        command: &Command,
        env: &EnvScope,
    ) -> Result<std::process::Command, error::Error> {
        if command.is_empty() {
            return Err(error::Error::EmptyCommand);
        }

        let argv = match (self.options.spawn_mode, command.as_simple_spec()) {
            (SpawnMode::Direct, Some(spec)) => Some(spec.render_argv()),
            (SpawnMode::Shell, Some(spec)) if !spec::needs_shell(&spec.command()) => Some(
                spec.command()
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect(),
            ),
            _ => None,
        };

        let mut builder = if let Some((executable, arguments)) =
            argv.as_ref().and_then(|argv| argv.split_first())
        {
            tracing::debug!(target: trace_categories::COMMANDS, "spawning directly: {argv:?}");
            let mut builder = std::process::Command::new(executable);
            builder.args(arguments);
            builder
        } else {
            if self.options.spawn_mode == SpawnMode::Direct {
                tracing::debug!(target: trace_categories::COMMANDS, "'{}' needs a shell; falling back to {}", command.command(), self.options.shell);
            }
            let mut builder = std::process::Command::new(&self.options.shell);
            builder.arg("-c").arg(command.command());
            builder
        };

        env.apply(&mut builder, &command.environment());

        Ok(builder)
    }

    fn spawn_failed(command: &Command, source: std::io::Error) -> error::Error {
        error::Error::SpawnFailed {
            command: command.string_format(),
            source,
        }
    }

    /// Launches a command with its stdout and stderr connected to fresh pipes.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to launch.
    /// * `env` - Environment changes applied for this spawn only.
    pub fn spawn(&self, command: &Command, env: &EnvScope) -> Result<RunningCommand, error::Error> {
        let mut builder = self.builder(command, env)?;

        let (stdout_reader, stdout_writer) = sys::pipes::pipe()?;
        let (stderr_reader, stderr_writer) = sys::pipes::pipe()?;

        builder
            .stdin(if self.options.inherit_stdin {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .stdout(stdout_writer)
            .stderr(stderr_writer);

        let spawned_at = Instant::now();
        let child = builder
            .spawn()
            .map_err(|source| Self::spawn_failed(command, source))?;

        // The builder owns the parent's copies of the write ends; the readers
        // only see EOF once those are closed.
        drop(builder);

        tracing::debug!(target: trace_categories::COMMANDS, "spawned '{}' as pid {}", command.string_format(), child.id());

        Ok(RunningCommand {
            command: command.string_format(),
            child,
            streams: vec![(STDOUT, stdout_reader), (STDERR, stderr_reader)],
            spawned_at,
            options: self.options.clone(),
            console: self.console.clone(),
        })
    }

    /// Runs a command to completion and returns its result.
    ///
    /// When verbose, the rendered command is echoed before it runs and its
    /// exit code after.
    pub fn run(&self, command: &Command, env: &EnvScope) -> Result<CommandResult, error::Error> {
        let mut console = self.console.clone();

        if self.options.verbose {
            write!(console, "{} ", command.string_format())?;
            console.flush()?;
        }

        let result = self.spawn(command, env)?.collect()?;

        if self.options.verbose {
            writeln!(console, "=> {}", result.exit_code())?;
        }

        Ok(result)
    }

    /// Runs a command to completion on tokio's blocking pool. Each call
    /// collects independently, so several may be awaited concurrently.
    pub async fn run_async(
        &self,
        command: Command,
        env: EnvScope,
    ) -> Result<CommandResult, error::Error> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run(&command, &env)).await?
    }

    fn detach(
        &self,
        command: &Command,
        env: &EnvScope,
    ) -> Result<std::process::Child, error::Error> {
        let mut builder = self.builder(command, env)?;
        builder
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        builder
            .spawn()
            .map_err(|source| Self::spawn_failed(command, source))
    }

    /// Starts a command without waiting for it. A reaper thread waits on the
    /// child so it does not linger as a zombie; nothing else tracks it.
    pub fn spin_off(
        &self,
        command: &Command,
        env: &EnvScope,
    ) -> Result<DetachedProcess, error::Error> {
        let child = self.detach(command, env)?;
        let process = DetachedProcess {
            command: command.string_format(),
            process_id: child.id(),
        };

        tracing::debug!(target: trace_categories::COMMANDS, "spun off '{}' as pid {}", process.command, process.process_id);

        reap(child, false)?;

        Ok(process)
    }

    /// Starts a command without waiting for it, and arranges for it to be
    /// sent an interrupt when this process exits if it is still running then.
    pub fn background(
        &self,
        command: &Command,
        env: &EnvScope,
    ) -> Result<DetachedProcess, error::Error> {
        ensure_exit_hook()?;

        let child = self.detach(command, env)?;
        let process = DetachedProcess {
            command: command.string_format(),
            process_id: child.id(),
        };

        if let Ok(mut pids) = BACKGROUND_PROCESSES.lock() {
            pids.insert(process.process_id);
        }

        tracing::debug!(target: trace_categories::COMMANDS, "backgrounded '{}' as pid {}", process.command, process.process_id);

        reap(child, true)?;

        Ok(process)
    }
}

/// Waits on a detached child from a dedicated thread. Background children are
/// removed from the exit registry once reaped so a recycled PID is never
/// signalled.
fn reap(mut child: std::process::Child, registered: bool) -> Result<(), error::Error> {
    let pid = child.id();

    std::thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || {
            let status = child.wait();
            if registered {
                if let Ok(mut pids) = BACKGROUND_PROCESSES.lock() {
                    pids.remove(&pid);
                }
            }
            tracing::debug!(target: trace_categories::COMMANDS, "detached pid {pid} exited: {status:?}");
        })?;

    Ok(())
}

/// Returns whether the given process is registered for interruption at exit.
pub fn is_registered_for_exit_interrupt(process_id: u32) -> bool {
    BACKGROUND_PROCESSES
        .lock()
        .is_ok_and(|pids| pids.contains(&process_id))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::console::CapturedOutput;
    use crate::spec::CommandSpec;
    use pretty_assertions::assert_eq;

    fn executor(options: ExecutorOptions) -> (ProcessExecutor, CapturedOutput) {
        let captured = CapturedOutput::new();
        let executor = ProcessExecutor::new(options).with_console(Console::new(captured.clone()));
        (executor, captured)
    }

    #[test]
    fn verbose_echoes_command_and_exit_code() {
        let (executor, captured) = executor(ExecutorOptions {
            verbose: true,
            ..ExecutorOptions::default()
        });

        let result = executor
            .run(&CommandSpec::with_args("echo", ["-n", "hi"]).into(), &EnvScope::inherit())
            .unwrap();

        assert_eq!(result.stdout(), "hi");
        assert_eq!(captured.contents(), "echo -n hi => 0\n");
    }

    #[test]
    fn quiet_executor_prints_nothing() {
        let (executor, captured) = executor(ExecutorOptions::default());
        let result = executor
            .run(&Command::from("true"), &EnvScope::inherit())
            .unwrap();

        assert!(result.succeeded());
        assert_eq!(captured.contents(), "");
    }

    #[test]
    fn direct_mode_passes_arguments_verbatim() {
        let (executor, _) = executor(ExecutorOptions {
            spawn_mode: SpawnMode::Direct,
            ..ExecutorOptions::default()
        });

        let result = executor
            .run(
                &CommandSpec::with_args("printf", ["%s", "a b;c"]).into(),
                &EnvScope::inherit(),
            )
            .unwrap();

        assert_eq!(result.stdout(), "a b;c");
    }

    #[test]
    fn plain_command_lines_skip_the_shell() {
        let (executor, _) = executor(ExecutorOptions {
            shell: "/nonexistent/sh".to_owned(),
            ..ExecutorOptions::default()
        });

        let result = executor
            .run(&CommandSpec::with_args("echo", ["plain"]).into(), &EnvScope::inherit())
            .unwrap();
        assert_eq!(result.stdout(), "plain\n");

        let err = executor
            .run(&CommandSpec::with_args("echo", ["$HOME"]).into(), &EnvScope::inherit())
            .unwrap_err();
        assert!(matches!(err, error::Error::SpawnFailed { .. }), "{err:?}");
    }

    #[test]
    fn direct_mode_falls_back_to_shell_for_chains() {
        let (executor, _) = executor(ExecutorOptions {
            spawn_mode: SpawnMode::Direct,
            ..ExecutorOptions::default()
        });

        let command = Command::from(["printf", "abc"]) | ["tr", "a-c", "A-C"];
        let result = executor.run(&command, &EnvScope::inherit()).unwrap();

        assert_eq!(result.stdout(), "ABC");
    }

    #[test]
    fn empty_command_is_rejected_before_spawning() {
        let (executor, _) = executor(ExecutorOptions::default());
        let err = executor
            .spawn(&Command::default(), &EnvScope::inherit())
            .unwrap_err();
        assert!(matches!(err, error::Error::EmptyCommand));
    }

    #[test]
    fn running_command_reports_its_process() {
        let (executor, _) = executor(ExecutorOptions::default());
        let running = executor
            .spawn(&Command::from("true"), &EnvScope::inherit())
            .unwrap();

        assert!(running.process_id() > 0);
        assert_eq!(running.collect().unwrap().exit_code(), 0);
    }

    #[test]
    fn background_registers_until_reaped() {
        let (executor, _) = executor(ExecutorOptions {
            spawn_mode: SpawnMode::Direct,
            ..ExecutorOptions::default()
        });
        let process = executor
            .background(&Command::from(["sleep", "5"]), &EnvScope::inherit())
            .unwrap();

        assert!(is_registered_for_exit_interrupt(process.process_id()));

        sys::signal::interrupt_process(process.process_id()).unwrap();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while is_registered_for_exit_interrupt(process.process_id()) && Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }

        assert!(!is_registered_for_exit_interrupt(process.process_id()));
    }
}

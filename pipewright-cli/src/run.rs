//! Turns parsed arguments into a command task and runs it.

use std::io::Write;

use pipewright_core::{
    Command, CommandSpec, Console, Executor, ProcessExecutor, STDERR, STDOUT,
};
use pipewright_tasks::{CommandTask, Decorate, Remote};

use crate::args::CommandLineArgs;
use crate::config::Config;

const TASK_NAME: &str = "run";

/// Builds a command from whitespace-separated words.
pub(crate) fn words(text: &str) -> Command {
    Command::from(text.split_whitespace().collect::<Vec<_>>())
}

/// Builds the main command: the positional words with `-e` variables, then
/// every `--and` member, then every `--pipe` member.
pub(crate) fn build_command(args: &CommandLineArgs) -> Command {
    let mut spec: CommandSpec = args.command.iter().cloned().collect();
    for (key, value) in &args.env {
        spec = spec.env(key, value);
    }

    let mut command = Command::from(spec);
    for next in &args.and {
        command &= words(next);
    }
    for next in &args.pipe {
        command |= words(next);
    }
    command
}

fn remote(args: &CommandLineArgs, config: &Config) -> Option<Remote> {
    let (user, host) = args.remote_user_and_host()?;

    let mut remote = Remote::new(host).escape_mode(config.remote_escape_mode(args));
    if let Some(user) = user.or(config.remote.user.as_deref()) {
        remote = remote.user(user);
    }
    if let Some(identity) = args.identity.as_ref().or(config.remote.identity.as_ref()) {
        remote = remote.id_file(identity.display().to_string());
    }

    let cli_options = args.ssh_options.iter().map(|(name, value)| (name, value));
    for (name, value) in config.remote.ssh_options.iter().chain(cli_options) {
        remote = remote.ssh_option(name, value);
    }

    Some(remote)
}

/// Runs what the arguments describe and returns the exit code to report.
pub(crate) fn run(args: &CommandLineArgs, config: &Config) -> anyhow::Result<i32> {
    let options = config.executor_options(args);
    let command = build_command(args);
    let verify = args.verify.as_deref().map(words);

    // Echoes go to stderr so that stdout carries only the command's output.
    let executor = ProcessExecutor::new(options).with_console(Console::new(std::io::stderr()));

    if let Some(remote) = remote(args, config) {
        run_task(CommandTask::remote(TASK_NAME, command, remote), verify, &executor, args)
    } else if args.clean_env {
        run_task(CommandTask::bundle(TASK_NAME, command), verify, &executor, args)
    } else {
        run_task(CommandTask::new(TASK_NAME, command), verify, &executor, args)
    }
}

fn run_task<D: Decorate>(
    task: CommandTask<D>,
    verify: Option<Command>,
    executor: &ProcessExecutor,
    args: &CommandLineArgs,
) -> anyhow::Result<i32> {
    let mut task = match verify {
        Some(verify) => task.verify_with(verify),
        None => task,
    };

    if args.dry_run {
        println!("{}", dry_run_line(&mut task)?);
        return Ok(0);
    }

    if !task.needed(executor)? {
        tracing::info!("verify command succeeded; nothing to do");
        return Ok(0);
    }

    let invocation = task.decoration().decorate(task.name(), task.command())?;

    if args.spin_off || args.background {
        let process = if args.background {
            executor.background(&invocation.command, &invocation.env)?
        } else {
            executor.spin_off(&invocation.command, &invocation.env)?
        };
        println!("{}", process.process_id());
        return Ok(0);
    }

    let result = executor.execute_in(&invocation.command, &invocation.env)?;

    std::io::stdout().write_all(result.stream_bytes(STDOUT))?;
    std::io::stderr().write_all(result.stream_bytes(STDERR))?;

    Ok(result.exit_code())
}

/// Renders the shell equivalent of a task: `verify || command`.
fn dry_run_line<D: Decorate>(task: &mut CommandTask<D>) -> anyhow::Result<String> {
    let command = task
        .decoration()
        .decorate(task.name(), task.command())?
        .command
        .string_format();

    let Some(verify) = task.verify_command().cloned() else {
        return Ok(command);
    };

    let verify = task
        .decoration()
        .decorate(task.name(), &verify)?
        .command
        .string_format();

    Ok(format!("{verify} || {command}"))
}

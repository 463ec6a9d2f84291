use clap::{Parser, builder::styling};
use std::path::PathBuf;

use crate::{events, productinfo};

const SHORT_DESCRIPTION: &str = "Run composed commands and collect their output";

const LONG_DESCRIPTION: &str = r"
pipewright runs a command, optionally chained with further commands, guarded by a
verification command, or wrapped for execution on a remote host over ssh.

Output of commands that run longer than the echo deadline is echoed while they run.
";

/// How embedded single quotes are escaped in remote commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EscapeModeArg {
    /// Precede quotes with a backslash.
    Backslash,
    /// Close, escape, and reopen the quote (`'\''`).
    Posix,
}

impl From<EscapeModeArg> for pipewright_core::EscapeMode {
    fn from(value: EscapeModeArg) -> Self {
        match value {
            EscapeModeArg::Backslash => Self::Backslash,
            EscapeModeArg::Posix => Self::Posix,
        }
    }
}

/// How commands become processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SpawnModeArg {
    /// Run the rendered command with `<shell> -c`.
    Shell,
    /// Exec the executable with its arguments when no shell is needed.
    Direct,
}

impl From<SpawnModeArg> for pipewright_core::SpawnMode {
    fn from(value: SpawnModeArg) -> Self {
        match value {
            SpawnModeArg::Shell => Self::Shell,
            SpawnModeArg::Direct => Self::Direct,
        }
    }
}

/// Parsed command-line arguments for pipewright.
#[derive(Parser)]
#[clap(name = productinfo::PRODUCT_NAME,
       version = productinfo::PRODUCT_VERSION,
       about = SHORT_DESCRIPTION,
       long_about = LONG_DESCRIPTION,
       styles = help_styles())]
pub struct CommandLineArgs {
    /// Set an environment variable for the command.
    #[clap(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Run another command after the command succeeds (words split on whitespace).
    #[clap(long = "and", value_name = "COMMAND")]
    pub and: Vec<String>,

    /// Pipe the output into another command (words split on whitespace).
    #[clap(long = "pipe", value_name = "COMMAND")]
    pub pipe: Vec<String>,

    /// Skip the command when this command succeeds.
    #[clap(long = "verify", value_name = "COMMAND")]
    pub verify: Option<String>,

    /// Run the command on a remote host over ssh.
    #[clap(long = "remote", value_name = "[USER@]HOST")]
    pub remote: Option<String>,

    /// Pass an `-o` option to ssh.
    #[clap(long = "ssh-option", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    pub ssh_options: Vec<(String, String)>,

    /// Identity file for ssh.
    #[clap(long = "identity", value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// Remove Bundler and RubyGems loader variables from the command's environment.
    #[clap(long = "clean-env", conflicts_with = "remote")]
    pub clean_env: bool,

    /// Print the command that would run instead of running it.
    #[clap(long = "dry-run")]
    pub dry_run: bool,

    /// Start the command and exit without waiting for it.
    #[clap(long = "spin-off", conflicts_with = "background")]
    pub spin_off: bool,

    /// Start the command without waiting for it; it is interrupted when pipewright exits.
    #[clap(long = "background")]
    pub background: bool,

    /// Echo each command and its exit status.
    #[clap(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Milliseconds after which a running command's output is echoed.
    #[clap(long = "echo-after-ms", value_name = "MS")]
    pub echo_after_ms: Option<u64>,

    /// Upper bound on each wait for output, in milliseconds.
    #[clap(long = "poll-interval-ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// How single quotes are escaped in remote commands.
    #[clap(long = "escape-mode", value_name = "MODE")]
    pub escape_mode: Option<EscapeModeArg>,

    /// How commands become processes.
    #[clap(long = "spawn-mode", value_name = "MODE")]
    pub spawn_mode: Option<SpawnModeArg>,

    /// Path to a configuration file.
    #[clap(long = "config", value_name = "PATH", conflicts_with = "no_config")]
    pub config_file: Option<PathBuf>,

    /// Do not load any configuration file.
    #[clap(long = "no-config")]
    pub no_config: bool,

    /// Enable debug logging for classes of tracing events.
    #[clap(long = "log-enable", alias = "debug", value_name = "EVENT")]
    pub enabled_log_events: Vec<events::TraceEvent>,

    /// The executable and its arguments.
    #[clap(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl CommandLineArgs {
    /// Splits `--remote` into user and host.
    pub fn remote_user_and_host(&self) -> Option<(Option<&str>, &str)> {
        let remote = self.remote.as_deref()?;
        Some(match remote.rsplit_once('@') {
            Some((user, host)) => (Some(user), host),
            None => (None, remote),
        })
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, found '{s}'"))
}

/// Returns clap styling to be used for command-line help.
fn help_styles() -> clap::builder::Styles {
    styling::Styles::styled()
        .header(
            styling::AnsiColor::Yellow.on_default()
                | styling::Effects::BOLD
                | styling::Effects::UNDERLINE,
        )
        .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
        .literal(styling::AnsiColor::Magenta.on_default() | styling::Effects::BOLD)
        .placeholder(styling::AnsiColor::Cyan.on_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_command_after_separator() {
        let args =
            CommandLineArgs::try_parse_from(["pipewright", "-e", "A=1", "--", "ls", "-l"]).unwrap();
        assert_eq!(args.command, vec!["ls", "-l"]);
        assert_eq!(args.env, vec![("A".to_owned(), "1".to_owned())]);
    }

    #[test]
    fn rejects_malformed_env() {
        assert!(
            CommandLineArgs::try_parse_from(["pipewright", "-e", "novalue", "--", "ls"]).is_err()
        );
        assert!(CommandLineArgs::try_parse_from(["pipewright", "-e", "=x", "--", "ls"]).is_err());
    }

    #[test]
    fn requires_a_command() {
        assert!(CommandLineArgs::try_parse_from(["pipewright"]).is_err());
    }

    #[test]
    fn splits_remote() {
        let args =
            CommandLineArgs::try_parse_from(["pipewright", "--remote", "me@host", "--", "ls"])
                .unwrap();
        assert_eq!(args.remote_user_and_host(), Some((Some("me"), "host")));

        let args = CommandLineArgs::try_parse_from(["pipewright", "--remote", "host", "--", "ls"])
            .unwrap();
        assert_eq!(args.remote_user_and_host(), Some((None, "host")));
    }
}

//! Implements the command-line interface for `pipewright`.

#![deny(missing_docs)]

mod args;
mod config;
mod events;
mod productinfo;
mod run;

use clap::Parser;

use crate::args::CommandLineArgs;

/// Main entry point for `pipewright`.
fn main() {
    //
    // Set up panic handler. On release builds, it will capture panic details to a
    // temporary .toml file and report a human-readable message to the screen.
    //
    human_panic::setup_panic!(
        human_panic::Metadata::new(env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"))
            .homepage(productinfo::PRODUCT_DISPLAY_URI)
    );

    let args = CommandLineArgs::parse();

    let mut event_config = events::TraceEventConfig::init(&args.enabled_log_events);

    let loaded = config::load_config(args.no_config, args.config_file.as_deref());
    if let Some(error) = &loaded.error {
        let path = loaded
            .path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();

        if loaded.explicit_path {
            tracing::error!("error: {path}: {error}");
            std::process::exit(1);
        }

        tracing::warn!("ignoring config file {path}: {error}");
    }

    if let Err(e) = event_config.enable_all(&loaded.config.log_enable) {
        tracing::warn!("{e:#}");
    }

    let exit_code = match run_blocking(args, loaded.config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("error: {e:#}");
            1
        }
    };

    std::process::exit(exit_code);
}

/// Runs the command the arguments describe. Returns the exit code.
///
/// Collection blocks its thread, so the work runs on tokio's blocking pool.
fn run_blocking(args: CommandLineArgs, config: config::Config) -> anyhow::Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        tokio::task::spawn_blocking(move || run::run(&args, &config)).await?
    })
}

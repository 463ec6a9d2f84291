use std::collections::HashSet;

use pipewright_core::trace_categories;
use tracing_subscriber::{
    Layer, Registry, filter::Targets, layer::SubscriberExt, reload::Handle,
    util::SubscriberInitExt,
};

/// Type of event to trace.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraceEvent {
    /// Traces spawning and completion of commands.
    #[clap(name = "commands")]
    Commands,
    /// Traces output collection.
    #[clap(name = "collector")]
    Collector,
    /// Traces task verification decisions.
    #[clap(name = "tasks")]
    Tasks,
}

impl TraceEvent {
    const fn target(self) -> &'static str {
        match self {
            Self::Commands => trace_categories::COMMANDS,
            Self::Collector => trace_categories::COLLECTOR,
            Self::Tasks => trace_categories::TASKS,
        }
    }
}

#[derive(Default)]
pub(crate) struct TraceEventConfig {
    enabled_trace_events: HashSet<TraceEvent>,
    handle: Option<Handle<Targets, Registry>>,
}

impl TraceEventConfig {
    pub fn init(enabled_log_events: &[TraceEvent]) -> Self {
        let mut config = Self {
            enabled_trace_events: enabled_log_events.iter().copied().collect(),
            ..Self::default()
        };

        // Reloadable so events named in the config file, which is read after
        // logging is up, can still be enabled.
        let (reload_filter, handle) =
            tracing_subscriber::reload::Layer::new(config.compose_filter());

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_filter(reload_filter);

        if tracing_subscriber::registry().with(layer).try_init().is_ok() {
            config.handle = Some(handle);
        } else {
            eprintln!("warning: failed to initialize tracing.");
        }

        config
    }

    fn compose_filter(&self) -> Targets {
        Targets::new()
            .with_default(tracing_subscriber::filter::LevelFilter::INFO)
            .with_targets(
                self.enabled_trace_events
                    .iter()
                    .map(|event| (event.target(), tracing::Level::DEBUG)),
            )
    }

    pub fn enable_all(&mut self, events: &[TraceEvent]) -> anyhow::Result<()> {
        let before = self.enabled_trace_events.len();
        self.enabled_trace_events.extend(events.iter().copied());

        // Don't bother to reload if nothing has changed.
        if self.enabled_trace_events.len() == before {
            return Ok(());
        }

        let Some(handle) = &self.handle else {
            anyhow::bail!("tracing not initialized");
        };

        handle
            .reload(self.compose_filter())
            .map_err(|e| anyhow::anyhow!("failed to enable tracing events: {e}"))
    }
}

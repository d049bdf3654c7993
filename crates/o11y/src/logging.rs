use once_cell::sync::OnceCell;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt,
};

static INIT: OnceCell<()> = OnceCell::new();

#[derive(Clone, Debug)]
pub struct Config {
    /// Either a simple level like "info" or a full EnvFilter string
    /// e.g. "info,schema_inference=debug".
    pub level: Option<String>,
    /// Emit logs as JSON lines when true; otherwise pretty text.
    pub json: bool,
    /// Include file/line/target info in logs.
    pub with_targets: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Some("info".to_owned()),
            json: false,
            with_targets: false,
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let _ = LogTracer::init();

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), cfg.level.as_deref());

    let fmt_layer = if cfg.json {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cfg.with_targets)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cfg.with_targets)
            .with_ansi(true)
            .boxed()
    };

    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INIT.set(());
    Ok(())
}

/// `RUST_LOG` wins over the configured level; "info" when neither parses.
fn build_filter(env: Option<&str>, level: Option<&str>) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level.unwrap_or("info")).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_configured_level() {
        let filter = build_filter(Some("warn"), Some("debug"));
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_configured_level_without_env() {
        let filter = build_filter(None, Some("schema_inference=trace"));
        assert_eq!(filter.to_string(), "schema_inference=trace");
    }

    #[test]
    fn test_defaults_to_info() {
        assert_eq!(build_filter(None, None).to_string(), "info");
    }
}

//! Observability setup shared by the schema tooling binaries.

pub mod logging;
pub mod panic;

/// Top-level config for observability.
#[derive(Clone, Debug)]
pub struct O11yConfig {
    /// Application label attached to panic events.
    pub app: &'static str,
    pub logging: logging::Config,
    pub install_panic_hook: bool,
}

impl Default for O11yConfig {
    fn default() -> Self {
        Self {
            app: "schema-infer",
            logging: logging::Config::default(),
            install_panic_hook: true,
        }
    }
}

pub fn init_all(cfg: &O11yConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&cfg.logging)?;
    if cfg.install_panic_hook && panic::install_hook(cfg.app) {
        tracing::debug!(app = cfg.app, "panic hook installed");
    }
    Ok(())
}

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// `RUST_LOG` first, then the configured level, then `info`.
fn build_filter(rust_log: Option<&str>, configured: Option<&str>) -> EnvFilter {
    [rust_log, configured]
        .into_iter()
        .flatten()
        .filter(|directive| !directive.trim().is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

pub fn init_logging(configured: Option<&str>) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(rust_log.as_deref(), configured);
    // stdout is reserved for command output.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

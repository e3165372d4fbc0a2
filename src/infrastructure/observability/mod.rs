use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_FILTER: &str = "notibell=debug";

/// Install a stdout tracing subscriber for hosts that have none.
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    Registry::default().with(env_filter).with(fmt_layer).try_init()?;

    tracing::info!("notibell tracing initialized");
    Ok(())
}

use tracing::subscriber::set_global_default;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

/// Installs the process-wide `tracing` subscriber: an `EnvFilter` defaulting
/// to `log_level` (or `info` when unset, or the `RUST_LOG` environment
/// variable when present) feeding a pretty stdout layer and a JSON layer.
/// Call once, at process start.
pub fn init_tracing(service_name: &'static str, log_level: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.unwrap_or("info")));

    let stdout_layer = tracing_subscriber::fmt::layer().pretty();
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_level(true)
        .with_current_span(true)
        .with_thread_names(true);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(json_layer)
        .with(stdout_layer);

    set_global_default(subscriber)
        .unwrap_or_else(|_| panic!("failed to set default subscriber for {service_name}"));
}

#[cfg(test)]
mod tests {}

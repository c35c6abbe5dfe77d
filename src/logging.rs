/// Installs the global subscriber. `RUST_LOG` wins; otherwise `info`.
///
/// Log lines go to stderr so command output on stdout (the report preview)
/// stays clean. Calling this twice is harmless.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = tracing::subscriber::set_global_default(
        registry.with(fmt::layer().with_writer(std::io::stderr).with_target(false)),
    );
}

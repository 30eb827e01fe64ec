//! `tracing-subscriber` initialization, driven by an `EnvFilter` so the
//! verbosity is controlled by `RUST_LOG` at runtime.

pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "bancho_standalone=info,bancho_core=info".into()))
        .init();
}

use crate::env::config::LogLevel;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide subscriber. `RUST_LOG` wins, otherwise `info`.
pub fn init_logging() {
    init_logging_with_level(LogLevel::Info)
}

/// Same as [`init_logging`], falling back to `level` when `RUST_LOG` is unset
pub fn init_logging_with_level(level: LogLevel) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let use_json = std::env::var("CONTRACT_LOG_JSON")
        .map(|value| value == "1")
        .unwrap_or(false);

    if use_json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

//! Process logger setup shared by the binaries.

use env_logger::Env;
use sdlbound_core::config::LoggingConfig;

/// Install the global logger. `RUST_LOG` wins over the configured filter.
///
/// Returns `false` when a logger was already installed.
pub fn init(cfg: &LoggingConfig) -> bool {
    let installed = env_logger::Builder::from_env(Env::default().default_filter_or(cfg.filter.as_str()))
        .format_timestamp_millis()
        .format_target(true)
        .try_init()
        .is_ok();

    if installed {
        log::debug!(target: "sdl", "logging.init filter={}", cfg.filter);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_existing_logger() {
        let cfg = LoggingConfig::default();
        init(&cfg);
        assert!(!init(&cfg));
    }
}

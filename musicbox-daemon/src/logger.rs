use std::str::FromStr;

use log::LevelFilter;

const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

/// Install env_logger with millisecond timestamps.
///
/// `RUST_LOG` wins when set. Otherwise everything is let through the logger
/// and the global max level (initially `info`) does the filtering, so the
/// configured level can still be applied once the config file is read.
pub fn init() -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    builder.format_timestamp_millis();
    if !rust_log_set() {
        builder.filter_level(LevelFilter::Trace);
    }
    builder.try_init()?;
    if !rust_log_set() {
        log::set_max_level(DEFAULT_LEVEL);
    }
    Ok(())
}

/// Apply the `[log] level` setting unless `RUST_LOG` overrides it
pub fn apply_level(level: &str) {
    if rust_log_set() {
        return;
    }
    match LevelFilter::from_str(level) {
        Ok(filter) => {
            log::set_max_level(filter);
            log::debug!("log level set to {}", filter);
        }
        Err(_) => log::warn!("unknown log level {:?}, keeping {}", level, log::max_level()),
    }
}

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

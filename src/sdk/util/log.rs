use env_logger::{Builder, Env};

/// Installs the process logger, filtered by `RUST_LOG` or `info` when unset.
///
/// Calling it again is harmless: the first logger stays installed.
pub fn init_logging() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_secs().format_module_path(false);
    if builder.try_init().is_err() {
        log::debug!("Logger already installed");
    }
}

use std::io::IsTerminal;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g. `info` or
/// `sync_monitor=debug`) is used. An unparsable directive falls back to `info`.
pub fn init_logger(default_directive: &str) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        // Colour only when a terminal is attached
        .with_ansi(std::io::stdout().is_terminal())
        .init();
}

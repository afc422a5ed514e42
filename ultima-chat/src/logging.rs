//! Tracing subscriber setup for binaries.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` selects DEBUG for the Ultima
/// crates and INFO for everything else. Calling this twice is harmless.
pub fn init(debug: bool) {
    let filter = if debug {
        "info,ultima_rag=debug,ultima_model=debug,ultima_chat=debug,ultima=debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .try_init();
}

// logging.rs — tracing subscriber setup for the binary
//
// The library only emits `tracing` events; installing a subscriber is left
// to the process that embeds it. `RUST_LOG` wins over the verbosity flag.

use tracing_subscriber::{fmt, EnvFilter};

const QUIET: &str = "curvegen=warn";
const VERBOSE: &str = "curvegen=debug";

fn resolve_filter(verbose: bool) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(if verbose { VERBOSE } else { QUIET }),
    }
}

/// Install a stderr fmt subscriber. A second call is a no-op.
pub fn init(verbose: bool) {
    let _ = fmt()
        .with_env_filter(resolve_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

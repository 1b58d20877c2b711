//! Log output for the command-line tool.
//!
//! Library code only emits `tracing` events; the binary decides where they go.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a verbosity level.
///
/// `quiet` wins over any `-v`.
pub fn filter_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "dubweave=warn",
        1 => "dubweave=info",
        2 => "dubweave=debug",
        _ => "dubweave=trace",
    }
}

/// Install the global stderr subscriber. `RUST_LOG` overrides the level.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose >= 2),
        )
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_levels() {
        assert_eq!(filter_directive(0, false), "dubweave=warn");
        assert_eq!(filter_directive(1, false), "dubweave=info");
        assert_eq!(filter_directive(2, false), "dubweave=debug");
        assert_eq!(filter_directive(5, false), "dubweave=trace");
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        assert_eq!(filter_directive(2, true), "error");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(0, true);
        init(1, false);
    }
}

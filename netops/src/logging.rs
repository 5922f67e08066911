use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `NETOPS_LOG` wins over `RUST_LOG`; both
/// win over the `-v` count.
pub fn init(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "netops=info,warn",
        2 => "netops=debug,info",
        _ => "trace",
    };
    let filter = std::env::var("NETOPS_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(fallback));

    // A second init (tests driving main twice) is not an error worth surfacing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

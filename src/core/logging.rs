//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g.
/// `RUST_LOG=voxstream::streaming=debug` to watch visibility recomputes.
///
/// # Example
/// ```
/// voxstream::core::logging::init();
/// log::info!("Streaming started");
/// ```
pub fn init() {
    // try_init so tests and embedding hosts can call this more than once
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}

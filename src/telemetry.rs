//! Opt-in `tracing` setup.
//!
//! The crate only emits events: data set/update entry points, conflation
//! cache rebuilds and batch steps, autoscale passes and gesture boundaries.
//! Hosts with their own subscriber can ignore this module.

/// Filter used by [`init_default_tracing`] when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "chart_timeline=info";

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`].
///
/// Returns `false` without the `telemetry` feature or when a global
/// subscriber is already set.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing_with(DEFAULT_FILTER)
}

/// Same as [`init_default_tracing`] with a caller-supplied fallback filter,
/// e.g. `"chart_timeline::conflation=trace"` to follow batch steps.
#[must_use]
pub fn init_tracing_with(fallback_filter: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_filter));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok()
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = fallback_filter;
        false
    }
}

//! Application configuration.
//!
//! Centralizes the configuration constants used by the data layer and the
//! URL synchronization primitives. The API root is baked in at compile time.

// =============================================================================
// Network Configuration
// =============================================================================

/// API root without a trailing slash.
///
/// Taken from the `GEODASH_API` environment variable at build time.
pub const API_ROOT: &str = match option_env!("GEODASH_API") {
    Some(root) => root,
    None => "http://localhost:8000",
};

/// `Accept` header sent with every cached request.
pub const DEFAULT_ACCEPT: &str = "application/json";

// =============================================================================
// URL Parameter Sync
// =============================================================================

/// Quiet period before an in-memory change is written back to the URL.
pub const URL_SYNC_DEBOUNCE_MS: u64 = 200;

/// Decimal places kept when a number is written to the URL.
///
/// Five places is roughly one meter at the equator, plenty for lat/long.
pub const NUMBER_PARAM_PRECISION: u32 = 5;

/// Separator used by array parameters and for joining repeated keys.
pub const ARRAY_PARAM_SEPARATOR: char = ',';

/// Normalize an API root by dropping trailing slashes.
pub fn normalize_root(root: &str) -> String {
    root.trim_end_matches('/').to_string()
}

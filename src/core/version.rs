//! Build metadata and host API version
//!
//! Includes the `version.rs` generated by the build script so the binary,
//! the library and builtin plugins share a single source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Fallback used when the build script could not read the manifest metadata
const DEFAULT_API_VERSION: u32 = 20250727;

/// Host plugin API version as a `YYYYMMDD` number.
pub fn get_api_version() -> u32 {
    PLUGIN_API_VERSION.parse().unwrap_or(DEFAULT_API_VERSION)
}

/// Major component of an API version (the year).
///
/// Plugins built against the same major API version are compatible.
pub fn api_major(api_version: u32) -> u32 {
    api_version / 10000
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line description used by `--version` style output.
pub fn version_banner() -> String {
    format!(
        "{} (api {}, built {}, git {})",
        PACKAGE_VERSION,
        get_api_version(),
        build_time(),
        git_hash()
    )
}

//! User-Agent strings sent with every API request.
//!
//! Format: `{name}/{version} ({homepage})`, where scoped package names such as
//! `@scope/pkg` are flattened to `scope-pkg`.

/// Builds a User-Agent from package metadata.
///
/// ```
/// use socket_sdk::user_agent::package_user_agent;
///
/// let ua = package_user_agent("@socketsecurity/sdk", "1.2.3", "https://socket.dev");
/// assert_eq!(ua, "socketsecurity-sdk/1.2.3 (https://socket.dev)");
/// ```
#[must_use]
pub fn package_user_agent(name: &str, version: &str, homepage: &str) -> String {
    let name = name.replace('@', "").replace('/', "-");
    format!("{name}/{version} ({homepage})")
}

/// Default User-Agent identifying this crate.
#[must_use]
pub fn default_user_agent() -> String {
    package_user_agent(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_HOMEPAGE"),
    )
}

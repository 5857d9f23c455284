//! Version information.

/// The build metadata suffix appended to the semver version.
const VERSION_META: &str = "stable";

/// The node version string, `<semver>-<meta>`, served by `kanvas_version`.
pub const KANVAS_NODE_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", "stable");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_shape() {
        let (semver, meta) = KANVAS_NODE_VERSION.rsplit_once('-').unwrap();
        assert_eq!(meta, VERSION_META);
        assert_eq!(semver.split('.').count(), 3);
    }
}

//! The persisted cache substrate shared by the path resolver and the
//! analyzer registry (§4.1, §4.4, §6).
//!
//! A configured root directory holds one subdirectory per cache type.
//! Each entry is a JSON document named after its cache key, carrying
//! `{cached_at, ttl_seconds, payload}`. Entries past their TTL are ignored
//! on read. Writes are atomic (write to a tempfile in the same
//! directory, then rename).

mod store;

pub use store::FileCacheStore;

use strum_macros::{Display, EnumString};

/// The closed set of cache types addressable by `cache clear --type=T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum CacheType {
    #[strum(serialize = "analysis")]
    Analysis,
    #[strum(serialize = "path-resolution")]
    PathResolution,
    #[strum(serialize = "version")]
    Version,
    #[strum(serialize = "extension-discovery")]
    ExtensionDiscovery,
    #[strum(serialize = "installation-discovery")]
    InstallationDiscovery,
}

impl CacheType {
    pub const ALL: [CacheType; 5] = [
        CacheType::Analysis,
        CacheType::PathResolution,
        CacheType::Version,
        CacheType::ExtensionDiscovery,
        CacheType::InstallationDiscovery,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for ty in CacheType::ALL {
            let parsed = CacheType::from_str(&ty.to_string()).unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn rejects_unknown_cache_type() {
        assert!(CacheType::from_str("bogus").is_err());
    }
}

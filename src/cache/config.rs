//! Query cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_LIST_CAPACITY: usize = 64;
const DEFAULT_ENTRY_CAPACITY: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve reads through the query cache. When off every read hits the data API.
    pub enabled: bool,
    /// Maximum cached listing pages.
    pub list_capacity: usize,
    /// Maximum cached single records (posts, profiles).
    pub entry_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            list_capacity: DEFAULT_LIST_CAPACITY,
            entry_capacity: DEFAULT_ENTRY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            list_capacity: settings.list_capacity,
            entry_capacity: settings.entry_capacity,
        }
    }
}

impl CacheConfig {
    pub fn list_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.list_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn entry_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.entry_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.list_capacity, 64);
        assert_eq!(config.entry_capacity, 256);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            list_capacity: 0,
            entry_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.list_capacity_non_zero().get(), 1);
        assert_eq!(config.entry_capacity_non_zero().get(), 1);
    }
}

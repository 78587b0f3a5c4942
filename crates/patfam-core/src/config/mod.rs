//! Workspace configuration, one sub-config per subsystem.

mod cliff_config;
mod crawl_config;
pub mod defaults;
mod resolver_config;

pub use cliff_config::CliffConfig;
pub use crawl_config::CrawlConfig;
pub use resolver_config::ResolverConfig;

use serde::{Deserialize, Serialize};

use crate::errors::{PatfamError, PatfamResult};

/// Top-level configuration. Every field has a working default; a TOML
/// file only needs to name what it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatfamConfig {
    pub crawl: CrawlConfig,
    pub resolver: ResolverConfig,
    pub cliff: CliffConfig,
}

impl PatfamConfig {
    /// Parse a TOML override file on top of defaults.
    pub fn from_toml_str(raw: &str) -> PatfamResult<Self> {
        toml::from_str(raw).map_err(PatfamError::config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_from_empty_toml() {
        let cfg = PatfamConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.crawl.max_attempts, defaults::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.resolver.filing_window_days, defaults::DEFAULT_FILING_WINDOW_DAYS);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = PatfamConfig::from_toml_str("[crawl]\nmax_attempts = 7\n").unwrap();
        assert_eq!(cfg.crawl.max_attempts, 7);
        assert_eq!(cfg.crawl.base_delay_ms, defaults::DEFAULT_BASE_DELAY_MS);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(PatfamConfig::from_toml_str("[crawl\n").is_err());
    }
}

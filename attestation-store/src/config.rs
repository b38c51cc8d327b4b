//! Enforcer limits, loaded the way `cortex_server::config::AppConfig::load`
//! loads its configuration: defaults, then an optional file, then
//! environment overrides.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// The three eviction-axis caps the bounded-store enforcer runs against: 16
/// attestations per ⟨actor, context⟩, 64 distinct context-sets per actor, 64
/// distinct actors per entity.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct EnforcerLimits {
    pub actor_context_limit: i64,
    pub actor_contexts_limit: i64,
    pub entity_actors_limit: i64,
}

impl Default for EnforcerLimits {
    fn default() -> Self {
        Self {
            actor_context_limit: 16,
            actor_contexts_limit: 64,
            entity_actors_limit: 64,
        }
    }
}

impl EnforcerLimits {
    /// Loads limits from `config/default.{toml,...}`, `config/local.*`, and
    /// `ATTESTATION__*` environment variables, falling back to spec defaults
    /// when none of those sources set a value.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Config::builder()
            .set_default("actor_context_limit", defaults.actor_context_limit)?
            .set_default("actor_contexts_limit", defaults.actor_contexts_limit)?
            .set_default("entity_actors_limit", defaults.entity_actors_limit)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ATTESTATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let limits = EnforcerLimits::default();
        assert_eq!(limits.actor_context_limit, 16);
        assert_eq!(limits.actor_contexts_limit, 64);
        assert_eq!(limits.entity_actors_limit, 64);
    }
}

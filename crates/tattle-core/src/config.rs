//! Engine configuration, resolved from the environment with defaults.

use std::env;

use crate::registry::{Registry, DEFAULT_OWNER_FIELD};

/// Tunables for the change-aggregation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Field of an instance's data snapshot holding its owner id.
    pub owner_field: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            owner_field: DEFAULT_OWNER_FIELD.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from the environment.
    ///
    /// `TATTLE_OWNER_FIELD` overrides the default owner field (`owner_id`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(field) = env::var("TATTLE_OWNER_FIELD") {
            if !field.is_empty() {
                config.owner_field = field;
            }
        }
        config
    }

    pub fn with_owner_field(mut self, owner_field: impl Into<String>) -> Self {
        self.owner_field = owner_field.into();
        self
    }

    /// Build a registry whose default owner getter reads the configured
    /// field.
    pub fn build_registry(&self) -> Registry {
        Registry::with_owner_field(&self.owner_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_owner_id() {
        assert_eq!(EngineConfig::default().owner_field, "owner_id");
    }

    #[test]
    fn builder_overrides_owner_field() {
        let config = EngineConfig::default().with_owner_field("tenant_id");
        assert_eq!(config.owner_field, "tenant_id");
    }
}

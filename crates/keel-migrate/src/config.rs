//! Engine settings.

use keel_core::Config;

/// Settings the engine runs with.
///
/// Built once by the caller; the engine never reads the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigratorConfig {
    /// Target is a production database
    pub prod: bool,
    /// Migrate even when `prod` is set
    pub apply_in_production: bool,
    /// Wrap transactional units in a transaction where the driver allows it
    pub use_transactions: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            prod: false,
            apply_in_production: false,
            use_transactions: true,
        }
    }
}

impl MigratorConfig {
    /// Engine settings for a loaded project configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            prod: config.prod,
            ..Self::default()
        }
    }

    pub fn allow_production(mut self, allow: bool) -> Self {
        self.apply_in_production = allow;
        self
    }

    /// Whether schema-changing operations hand off to the release pipeline.
    pub fn defers(&self) -> bool {
        self.prod && !self.apply_in_production
    }
}

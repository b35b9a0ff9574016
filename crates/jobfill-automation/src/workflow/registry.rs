use std::sync::Arc;

use tracing::debug;

use super::{DefaultWorkflow, PlatformStrategy};

/// Platform name / URL → strategy, with a generic fallback.
pub struct PlatformRegistry {
    strategies: Vec<Arc<dyn PlatformStrategy>>,
    default: Arc<dyn PlatformStrategy>,
}

impl PlatformRegistry {
    /// Only the generic workflow.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            default: Arc::new(DefaultWorkflow::new()),
        }
    }

    /// Generic workflow plus every platform strategy shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::platforms::WorkdayStrategy::new()));
        registry
    }

    /// Add a strategy; one with the same name is replaced.
    pub fn register(&mut self, strategy: Arc<dyn PlatformStrategy>) {
        self.strategies.retain(|s| s.name() != strategy.name());
        debug!(platform = strategy.name(), "Registered platform strategy");
        self.strategies.push(strategy);
    }

    pub fn set_default(&mut self, strategy: Arc<dyn PlatformStrategy>) {
        self.default = strategy;
    }

    pub fn get(&self, platform: &str) -> Option<Arc<dyn PlatformStrategy>> {
        self.strategies
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(platform))
            .cloned()
    }

    pub fn for_url(&self, url: &str) -> Option<Arc<dyn PlatformStrategy>> {
        self.strategies.iter().find(|s| s.matches_url(url)).cloned()
    }

    /// Exact platform name, then URL match, then the default.
    /// "unknown" and "custom" never select a platform by name.
    pub fn resolve(&self, platform: Option<&str>, url: &str) -> Arc<dyn PlatformStrategy> {
        let named = platform
            .filter(|p| !p.is_empty() && !matches!(p.to_ascii_lowercase().as_str(), "unknown" | "custom"))
            .and_then(|p| self.get(p));
        let chosen = named
            .or_else(|| self.for_url(url))
            .unwrap_or_else(|| self.default.clone());
        debug!(platform = chosen.name(), url, "Resolved workflow strategy");
        chosen
    }

    pub fn platforms(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn has(&self, platform: &str) -> bool {
        self.get(platform).is_some()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

//! Action kind → handler lookup.
//!
//! Handlers are registered as factories and instantiated on first use, so a
//! run that never uploads a file never builds the upload handler. Custom
//! kinds (e.g. a platform's own radio widget) are registered the same way.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::actions::{ActionHandler, register_builtin};
use crate::command::ActionType;
use crate::error::AutofillError;

/// Builds a handler on first use.
pub type HandlerFactory = Arc<dyn Fn() -> Arc<dyn ActionHandler> + Send + Sync>;

/// Thread-safe map of action kinds to lazily created handlers.
pub struct ActionRegistry {
    factories: DashMap<ActionType, HandlerFactory>,
    instances: DashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    /// Registry with a handler for every built-in kind.
    pub fn new() -> Self {
        let registry = Self::empty();
        register_builtin(&registry);
        registry
    }

    /// Registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Register (or replace) the factory for `action`.
    pub fn register<F>(&self, action: ActionType, factory: F)
    where
        F: Fn() -> Arc<dyn ActionHandler> + Send + Sync + 'static,
    {
        self.instances.remove(&action);
        if self.factories.insert(action.clone(), Arc::new(factory)).is_some() {
            debug!(action = %action, "Replaced action handler");
        }
    }

    /// Register an already-built handler.
    pub fn register_handler(&self, action: ActionType, handler: Arc<dyn ActionHandler>) {
        self.register(action, move || handler.clone());
    }

    /// Handler for `action`, created on first request and reused after.
    pub fn get(&self, action: &ActionType) -> Result<Arc<dyn ActionHandler>, AutofillError> {
        if let Some(handler) = self.instances.get(action) {
            return Ok(handler.clone());
        }

        // Clone the factory out so no map guard is held while it runs.
        let factory = self
            .factories
            .get(action)
            .map(|f| f.clone())
            .ok_or_else(|| AutofillError::InvalidCommand(format!("Unknown action type: {}", action)))?;

        let handler = self
            .instances
            .entry(action.clone())
            .or_insert_with(|| factory())
            .clone();
        Ok(handler)
    }

    pub fn supports(&self, action: &ActionType) -> bool {
        self.factories.contains_key(action)
    }

    /// Registered kinds, sorted by name.
    pub fn supported_actions(&self) -> Vec<ActionType> {
        let mut actions: Vec<ActionType> = self.factories.iter().map(|e| e.key().clone()).collect();
        actions.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        actions
    }

    /// How many handlers have been built so far.
    pub fn instantiated_count(&self) -> usize {
        self.instances.len()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionContext, ClickHandler};
    use crate::command::FillCommand;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        async fn perform(&self, _ctx: &ActionContext, command: &FillCommand) -> Result<Value, AutofillError> {
            Ok(command.value.clone())
        }
    }

    #[test]
    fn test_new_registers_every_builtin() {
        let registry = ActionRegistry::new();
        for action in ActionType::BUILTIN.iter() {
            assert!(registry.supports(action), "{} not registered", action);
        }
        assert_eq!(registry.supported_actions().len(), ActionType::BUILTIN.len());
        assert_eq!(registry.instantiated_count(), 0);
    }

    #[test]
    fn test_handlers_are_built_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = ActionRegistry::empty();
        let counter = built.clone();
        registry.register(ActionType::Click, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(ClickHandler) as Arc<dyn ActionHandler>
        });

        registry.get(&ActionType::Click).unwrap();
        registry.get(&ActionType::Click).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(registry.instantiated_count(), 1);
    }

    #[test]
    fn test_unknown_custom_kind() {
        let registry = ActionRegistry::new();
        let err = registry
            .get(&ActionType::Custom("teleport".into()))
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Invalid command: Unknown action type: teleport");
    }

    #[tokio::test]
    async fn test_register_replaces_cached_instance() {
        let registry = ActionRegistry::new();
        registry.get(&ActionType::Click).unwrap();
        registry.register_handler(ActionType::Click, Arc::new(Echo));

        let page = crate::actions::test_support::page(jobfill_browser::fake::FakeDocument::new("https://a", "A"));
        let ctx = crate::actions::test_support::ctx(&page);
        let handler = registry.get(&ActionType::Click).unwrap();
        let used = handler
            .perform(&ctx, &FillCommand::click("#x").with_value("echo"))
            .await
            .unwrap();
        assert_eq!(used, json!("echo"));
    }
}

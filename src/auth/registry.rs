use std::collections::HashMap;
use std::sync::Arc;

use super::strategy::Strategy;
use super::{StrategyRef, DEFAULT_STRATEGY};
use crate::errors::AuthError;

/// Table of configured strategies plus the optional default.
///
/// Built mutably at startup, then shared behind an `Arc` and only read.
#[derive(Debug, Default)]
pub struct AuthRegistry {
    strategies: HashMap<String, Arc<Strategy>>,
    default: Option<String>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Strategy) -> Result<Arc<Strategy>, AuthError> {
        if strategy.name() == DEFAULT_STRATEGY {
            return Err(AuthError::InvalidStrategyConfig(format!(
                "\"{DEFAULT_STRATEGY}\" is reserved for the registry default"
            )));
        }
        if self.strategies.contains_key(strategy.name()) {
            return Err(AuthError::DuplicateStrategy(strategy.name().to_string()));
        }

        let strategy = Arc::new(strategy);
        self.strategies
            .insert(strategy.name().to_string(), Arc::clone(&strategy));
        tracing::debug!(strategy = %strategy.name(), scheme = ?strategy.kind(), "strategy registered");
        Ok(strategy)
    }

    /// Registers `strategy` and makes it the default in one step.
    pub fn register_default(&mut self, strategy: Strategy) -> Result<Arc<Strategy>, AuthError> {
        let strategy = self.register(strategy)?;
        self.default = Some(strategy.name().to_string());
        Ok(strategy)
    }

    /// Marks an already-registered strategy as default, replacing any
    /// previous one. Returns the name it replaced.
    pub fn set_default(&mut self, name: &str) -> Result<Option<String>, AuthError> {
        if !self.strategies.contains_key(name) {
            return Err(AuthError::UnknownStrategyName(name.to_string()));
        }
        Ok(self.default.replace(name.to_string()))
    }

    pub fn clear_default(&mut self) -> Option<String> {
        self.default.take()
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn default_strategy(&self) -> Result<Arc<Strategy>, AuthError> {
        let name = self
            .default
            .as_deref()
            .ok_or(AuthError::NoDefaultStrategyConfigured)?;
        self.resolve(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Strategy>, AuthError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownStrategyName(name.to_string()))
    }

    pub fn resolve_ref(&self, strategy: &StrategyRef) -> Result<Arc<Strategy>, AuthError> {
        match strategy {
            StrategyRef::Default => self.default_strategy(),
            StrategyRef::Named(name) => self.resolve(name),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

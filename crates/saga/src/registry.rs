//! Registry of saga definitions served by one controller.

use std::collections::HashMap;

use crate::definition::SagaDefinition;
use crate::error::{Result, SagaError};

/// Maps saga names to their definitions.
///
/// Built once at startup and then shared read-only (typically behind an
/// `Arc`), so concurrent readers need no locking.
#[derive(Debug, Clone, Default)]
pub struct SagaRegistry {
    sagas: HashMap<String, SagaDefinition>,
}

impl SagaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a saga. Fails on duplicate names and on sagas without steps.
    pub fn add_saga(&mut self, saga: SagaDefinition) -> Result<()> {
        if saga.is_empty() {
            return Err(SagaError::EmptySaga(saga.name().to_string()));
        }
        if self.sagas.contains_key(saga.name()) {
            return Err(SagaError::DuplicateSagaName(saga.name().to_string()));
        }
        self.sagas.insert(saga.name().to_string(), saga);
        Ok(())
    }

    /// Builder form of [`add_saga`](Self::add_saga).
    pub fn with_saga(mut self, saga: SagaDefinition) -> Result<Self> {
        self.add_saga(saga)?;
        Ok(self)
    }

    pub fn get_saga(&self, name: &str) -> Result<&SagaDefinition> {
        self.sagas
            .get(name)
            .ok_or_else(|| SagaError::SagaNotFound(name.to_string()))
    }

    /// Registered saga names, sorted.
    pub fn saga_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.sagas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.sagas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sagas.is_empty()
    }
}

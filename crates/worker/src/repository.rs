//! State repository selected at startup.

use async_trait::async_trait;
use state_store::{
    InMemoryStateRepository, JsonLinesStateRepository, PostgresStateRepository, StateRepository,
    StateStoreError, TransitionRecord,
};

use crate::config::RepositoryBackend;

/// One of the available state repository backends.
#[derive(Clone)]
pub enum Repository {
    Memory(InMemoryStateRepository),
    JsonLines(JsonLinesStateRepository),
    Postgres(PostgresStateRepository),
}

impl Repository {
    /// Opens the configured backend. Postgres connects and migrates.
    pub async fn open(backend: &RepositoryBackend) -> Result<Self, StateStoreError> {
        let repository = match backend {
            RepositoryBackend::Memory => Self::Memory(InMemoryStateRepository::new()),
            RepositoryBackend::JsonLines(path) => {
                Self::JsonLines(JsonLinesStateRepository::new(path))
            }
            RepositoryBackend::Postgres(url) => {
                Self::Postgres(PostgresStateRepository::connect(url).await?)
            }
        };
        tracing::info!(backend = repository.name(), "state repository opened");
        Ok(repository)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::JsonLines(_) => "jsonl",
            Self::Postgres(_) => "postgres",
        }
    }
}

#[async_trait]
impl StateRepository for Repository {
    async fn record(&self, record: TransitionRecord) -> Result<(), StateStoreError> {
        match self {
            Self::Memory(repository) => repository.record(record).await,
            Self::JsonLines(repository) => repository.record(record).await,
            Self::Postgres(repository) => repository.record(record).await,
        }
    }
}

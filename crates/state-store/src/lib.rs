//! Saga state repository.
//!
//! The repository is an append-only audit sink: the saga execution
//! controller writes one [`TransitionRecord`] per lifecycle event and never
//! reads it back. Backends are provided for tests (in-memory), simple
//! deployments (JSON lines file) and production (PostgreSQL).

pub mod error;
pub mod jsonl;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod repository;

pub use common::SagaId;
pub use error::{Result, StateStoreError};
pub use jsonl::JsonLinesStateRepository;
pub use memory::InMemoryStateRepository;
pub use postgres::PostgresStateRepository;
pub use record::{TransitionKind, TransitionRecord};
pub use repository::{StateRepository, StateRepositoryExt};

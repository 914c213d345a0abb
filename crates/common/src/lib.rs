//! Shared types for the saga execution system.

pub mod types;

pub use types::SagaId;

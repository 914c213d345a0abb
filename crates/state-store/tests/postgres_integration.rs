//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p state-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use sqlx::PgPool;
use state_store::{PostgresStateRepository, SagaId, StateRepositoryExt, TransitionKind};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_transitions.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh repository with its own pool. Saga ids are random per test,
/// so tests do not need to truncate the table.
async fn get_test_repository() -> PostgresStateRepository {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    PostgresStateRepository::new(pool)
}

#[tokio::test]
async fn record_and_read_back_history() {
    let repo = get_test_repository().await;
    let saga_id = SagaId::new();

    repo.action_started(&saga_id, "step1").await.unwrap();
    repo.action_succeeded(&saga_id, "step1").await.unwrap();
    repo.saga_completed(&saga_id).await.unwrap();

    let history = repo.history(&saga_id).await.unwrap();
    let transitions: Vec<_> = history.iter().map(|r| r.transition).collect();
    assert_eq!(
        transitions,
        vec![
            TransitionKind::ActionStarted,
            TransitionKind::ActionSucceeded,
            TransitionKind::SagaCompleted,
        ]
    );
    assert_eq!(history[0].step_name.as_deref(), Some("step1"));
    assert_eq!(history[2].step_name, None);
}

#[tokio::test]
async fn failure_context_is_persisted() {
    let repo = get_test_repository().await;
    let saga_id = SagaId::new();

    repo.action_failed(&saga_id, "step2", "Declined", "insufficient funds")
        .await
        .unwrap();
    repo.saga_failed(&saga_id, "step1", Some("Declined"), Some("insufficient funds"))
        .await
        .unwrap();

    let history = repo.history(&saga_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].transition, TransitionKind::SagaFailed);
    assert_eq!(history[1].error_kind.as_deref(), Some("Declined"));
    assert_eq!(history[1].error_message.as_deref(), Some("insufficient funds"));
}

#[tokio::test]
async fn sagas_with_status_uses_latest_record() {
    let repo = get_test_repository().await;
    let stuck = SagaId::new();
    let done = SagaId::new();

    repo.compensation_started(&stuck, "step2").await.unwrap();
    repo.saga_compensate_failed(&stuck, "step2", "Timeout", "ledger offline")
        .await
        .unwrap();

    repo.action_started(&done, "step1").await.unwrap();
    repo.saga_completed(&done).await.unwrap();

    let stuck_ids = repo.sagas_with_status("compensation_failed").await.unwrap();
    assert!(stuck_ids.contains(&stuck));
    assert!(!stuck_ids.contains(&done));

    let completed_ids = repo.sagas_with_status("completed").await.unwrap();
    assert!(completed_ids.contains(&done));
}

#[tokio::test]
async fn history_of_unknown_saga_is_empty() {
    let repo = get_test_repository().await;
    let history = repo.history(&SagaId::new()).await.unwrap();
    assert!(history.is_empty());
}

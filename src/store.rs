use crate::db_types::{CallRecord, CallUpdate};
use crate::error::StoreError;

use async_trait::async_trait;

pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Persistence for call records.  Implementations keep at most one record per call id and make
/// each `upsert` atomic with respect to other upserts for the same id.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Create the record for `call_id` from `update`, or merge the provided fields into the
    /// existing one.
    async fn upsert(&self, call_id: &str, update: CallUpdate) -> Result<CallRecord, StoreError>;

    async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, StoreError>;

    /// Most recently created records first.
    async fn list(&self, limit: usize) -> Result<Vec<CallRecord>, StoreError>;
}

mod memory {
    use super::*;

    use std::collections::HashMap;
    use time::OffsetDateTime;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Records {
        by_call_id: HashMap<String, CallRecord>,
        // call ids in creation order
        order: Vec<String>,
    }

    #[derive(Default)]
    pub struct MemoryStore {
        records: Mutex<Records>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CallStore for MemoryStore {
        async fn upsert(
            &self,
            call_id: &str,
            update: CallUpdate,
        ) -> Result<CallRecord, StoreError> {
            let mut records = self.records.lock().await;
            let now = OffsetDateTime::now_utc();
            if let Some(existing) = records.by_call_id.get_mut(call_id) {
                update.apply_to(existing, now);
                return Ok(existing.clone());
            }
            let record = update.into_record(call_id, now);
            records
                .by_call_id
                .insert(call_id.to_string(), record.clone());
            records.order.push(call_id.to_string());
            Ok(record)
        }

        async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, StoreError> {
            let records = self.records.lock().await;
            Ok(records.by_call_id.get(call_id).cloned())
        }

        async fn list(&self, limit: usize) -> Result<Vec<CallRecord>, StoreError> {
            let records = self.records.lock().await;
            Ok(records
                .order
                .iter()
                .rev()
                .take(limit)
                .filter_map(|call_id| records.by_call_id.get(call_id).cloned())
                .collect())
        }
    }
}
pub use memory::MemoryStore;

mod postgres {
    use super::*;
    use crate::db_types::WorkflowType;

    use sqlx::postgres::PgPoolOptions;
    use sqlx::{FromRow, Pool, Postgres};
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(FromRow)]
    struct CallRow {
        id: Uuid,
        call_sid: String,
        from_number: String,
        to_number: String,
        direction: Option<String>,
        digits: Option<String>,
        workflow_type: String,
        status: String,
        duration_seconds: Option<i64>,
        recording_url: Option<String>,
        recording_duration_seconds: Option<i64>,
        notes: Option<String>,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    }

    impl TryFrom<CallRow> for CallRecord {
        type Error = StoreError;

        fn try_from(row: CallRow) -> Result<Self, Self::Error> {
            let workflow_type = row
                .workflow_type
                .parse::<WorkflowType>()
                .map_err(StoreError::Decode)?;
            Ok(CallRecord {
                id: row.id,
                call_id: row.call_sid,
                from_number: row.from_number,
                to_number: row.to_number,
                direction: row.direction,
                selected_digit: row.digits,
                workflow_type,
                status: row.status,
                duration_seconds: row.duration_seconds,
                recording_url: row.recording_url,
                recording_duration_seconds: row.recording_duration_seconds,
                notes: row.notes,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        }
    }

    // One statement per merge: the unique index on call_sid serializes concurrent writers and
    // COALESCE keeps stored values for parameters that were not provided.
    const UPSERT_SQL: &str = r#"
        INSERT INTO calls (
            id, call_sid, from_number, to_number, direction, digits, workflow_type, status,
            duration_seconds, recording_url, recording_duration_seconds, notes,
            created_at, updated_at
        ) VALUES (
            $1, $2, COALESCE($3, ''), COALESCE($4, ''), $5, $6, COALESCE($7, 'ivr'),
            COALESCE($8, 'pending-input'), $9, $10, $11, $12, now(), now()
        )
        ON CONFLICT (call_sid) DO UPDATE SET
            from_number = COALESCE($3, calls.from_number),
            to_number = COALESCE($4, calls.to_number),
            direction = COALESCE($5, calls.direction),
            digits = COALESCE($6, calls.digits),
            workflow_type = COALESCE($7, calls.workflow_type),
            status = COALESCE($8, calls.status),
            duration_seconds = COALESCE($9, calls.duration_seconds),
            recording_url = COALESCE($10, calls.recording_url),
            recording_duration_seconds = COALESCE($11, calls.recording_duration_seconds),
            notes = COALESCE($12, calls.notes),
            updated_at = now()
        RETURNING *
    "#;

    pub struct PgStore {
        pool: Pool<Postgres>,
    }

    impl PgStore {
        pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(5))
                .connect(database_url)
                .await?;
            sqlx::migrate!().run(&pool).await?;
            Ok(Self { pool })
        }
    }

    #[async_trait]
    impl CallStore for PgStore {
        async fn upsert(
            &self,
            call_id: &str,
            update: CallUpdate,
        ) -> Result<CallRecord, StoreError> {
            let row: CallRow = sqlx::query_as(UPSERT_SQL)
                .bind(Uuid::new_v4())
                .bind(call_id)
                .bind(update.from_number)
                .bind(update.to_number)
                .bind(update.direction)
                .bind(update.selected_digit)
                .bind(update.workflow_type.map(|wf| wf.as_str()))
                .bind(update.status)
                .bind(update.duration_seconds)
                .bind(update.recording_url)
                .bind(update.recording_duration_seconds)
                .bind(update.notes)
                .fetch_one(&self.pool)
                .await?;
            row.try_into()
        }

        async fn find_by_call_id(&self, call_id: &str) -> Result<Option<CallRecord>, StoreError> {
            let row: Option<CallRow> = sqlx::query_as("SELECT * FROM calls WHERE call_sid = $1")
                .bind(call_id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(CallRecord::try_from).transpose()
        }

        async fn list(&self, limit: usize) -> Result<Vec<CallRecord>, StoreError> {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows: Vec<CallRow> =
                sqlx::query_as("SELECT * FROM calls ORDER BY created_at DESC, seq DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?;
            rows.into_iter().map(CallRecord::try_from).collect()
        }
    }
}
pub use postgres::PgStore;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_types::WorkflowType;
    use std::sync::Arc;

    fn status(label: &str) -> CallUpdate {
        CallUpdate {
            status: Some(label.to_string()),
            ..Default::default()
        }
    }

    async fn exercise_merge_semantics(store: &dyn CallStore, call_id: &str) {
        let first = store
            .upsert(
                call_id,
                CallUpdate {
                    from_number: Some("+15550001".to_string()),
                    to_number: Some("+15559999".to_string()),
                    ..CallUpdate::new(WorkflowType::Ivr, "waiting-selection")
                },
            )
            .await
            .unwrap();
        let second = store
            .upsert(
                call_id,
                CallUpdate {
                    selected_digit: Some("1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.status, "waiting-selection");
        assert_eq!(second.from_number, "+15550001");
        assert_eq!(second.selected_digit.as_deref(), Some("1"));

        let found = store.find_by_call_id(call_id).await.unwrap().unwrap();
        assert_eq!(found, second);
    }

    #[tokio::test]
    async fn first_upsert_seeds_defaults() {
        let store = MemoryStore::new();
        let record = store.upsert("CA1", CallUpdate::default()).await.unwrap();
        assert_eq!(record.workflow_type, WorkflowType::Ivr);
        assert_eq!(record.status, "pending-input");
        assert_eq!(record.from_number, "");
        assert_eq!(record.to_number, "");
    }

    #[tokio::test]
    async fn memory_store_merges_sparse_updates() {
        exercise_merge_semantics(&MemoryStore::new(), "CA1").await;
    }

    #[tokio::test]
    async fn repeated_upserts_keep_one_record() {
        let store = MemoryStore::new();
        store.upsert("CA1", status("a")).await.unwrap();
        store.upsert("CA1", status("a")).await.unwrap();
        store.upsert("CA1", status("b")).await.unwrap();

        let all = store.list(DEFAULT_LIST_LIMIT).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, "b");
    }

    #[tokio::test]
    async fn disjoint_updates_union() {
        let store = MemoryStore::new();
        store.upsert("CA1", status("x")).await.unwrap();
        store
            .upsert(
                "CA1",
                CallUpdate {
                    duration_seconds: Some(85),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let record = store
            .upsert(
                "CA1",
                CallUpdate {
                    recording_url: Some("https://example/rec1".to_string()),
                    notes: Some("vip".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.status, "x");
        assert_eq!(record.duration_seconds, Some(85));
        assert_eq!(record.recording_url.as_deref(), Some("https://example/rec1"));
        assert_eq!(record.notes.as_deref(), Some("vip"));
        assert_eq!(record.recording_duration_seconds, None);
    }

    #[tokio::test]
    async fn find_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.find_by_call_id("CA404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first_and_bounded() {
        let store = MemoryStore::new();
        for call_id in ["CA1", "CA2", "CA3"] {
            store.upsert(call_id, status("waiting-selection")).await.unwrap();
        }
        // merging into an old record does not move it
        store.upsert("CA1", status("completed")).await.unwrap();

        let ids: Vec<String> = store
            .list(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.call_id)
            .collect();
        assert_eq!(ids, vec!["CA3", "CA2"]);

        store.upsert("CA4", status("waiting-selection")).await.unwrap();
        let newest = store.list(DEFAULT_LIST_LIMIT).await.unwrap();
        assert_eq!(newest.len(), 4);
        assert_eq!(newest[0].call_id, "CA4");
        assert!(store.list(0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_do_not_lose_fields() {
        let store = Arc::new(MemoryStore::new());
        let updates = vec![
            CallUpdate {
                from_number: Some("+15550001".to_string()),
                ..Default::default()
            },
            CallUpdate {
                selected_digit: Some("1".to_string()),
                ..Default::default()
            },
            CallUpdate {
                duration_seconds: Some(12),
                ..Default::default()
            },
            CallUpdate {
                recording_url: Some("https://example/rec1".to_string()),
                ..Default::default()
            },
            status("no-answer"),
        ];

        let handles: Vec<_> = updates
            .into_iter()
            .map(|update| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert("CA1", update).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.list(DEFAULT_LIST_LIMIT).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.from_number, "+15550001");
        assert_eq!(record.selected_digit.as_deref(), Some("1"));
        assert_eq!(record.duration_seconds, Some(12));
        assert_eq!(record.recording_url.as_deref(), Some("https://example/rec1"));
        assert_eq!(record.status, "no-answer");
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
    async fn pg_store_merges_sparse_updates() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let store = PgStore::connect(&url).await.unwrap();
        let call_id = format!("CA-test-{}", uuid::Uuid::new_v4());
        exercise_merge_semantics(&store, &call_id).await;
        let listed = store.list(1).await.unwrap();
        assert_eq!(listed[0].call_id, call_id);
    }
}

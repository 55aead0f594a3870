//! `SQLite` implementation of [`AuditSink`] over the append-only `audit_log` table.

use std::future::Future;

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use netalloc_app::ports::AuditSink;
use netalloc_domain::audit::AuditRecord;
use netalloc_domain::error::AllocationError;

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`AuditRecord`].
struct Wrapper(AuditRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let subject: String = row.try_get("subject")?;
        let subject_id: String = row.try_get("subject_id")?;
        let operation: String = row.try_get("operation")?;
        let author: String = row.try_get("author")?;
        let timestamp: String = row.try_get("timestamp")?;
        let provider_id: Option<String> = row.try_get("provider_id")?;
        let reason: Option<String> = row.try_get("reason")?;
        let snapshot: String = row.try_get("snapshot")?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let snapshot = serde_json::from_str(&snapshot)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(AuditRecord {
            id: codec::parse(&id)?,
            subject: codec::parse(&subject)?,
            subject_id: codec::parse(&subject_id)?,
            operation: codec::parse(&operation)?,
            author,
            timestamp,
            provider_id: codec::parse_opt(provider_id)?,
            reason,
            snapshot,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO audit_log
        (id, subject, subject_id, operation, author, timestamp, provider_id, reason, snapshot)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_SUBJECT: &str =
    "SELECT * FROM audit_log WHERE subject_id = ? ORDER BY timestamp, rowid";

/// `SQLite`-backed audit trail. Records are only ever inserted.
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

impl SqliteAuditLog {
    /// Create a new audit log using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// History of one subject, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails or a row cannot be decoded.
    pub async fn find_by_subject(
        &self,
        subject_id: uuid::Uuid,
    ) -> Result<Vec<AuditRecord>, AllocationError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_SUBJECT)
            .bind(subject_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl AuditSink for SqliteAuditLog {
    fn record(
        &self,
        record: AuditRecord,
    ) -> impl Future<Output = Result<(), AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let snapshot = serde_json::to_string(&record.snapshot).map_err(StorageError::from)?;

            sqlx::query(INSERT)
                .bind(record.id.to_string())
                .bind(record.subject.to_string())
                .bind(record.subject_id.to_string())
                .bind(record.operation.to_string())
                .bind(&record.author)
                .bind(record.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
                .bind(record.provider_id.map(|id| id.to_string()))
                .bind(&record.reason)
                .bind(snapshot)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use netalloc_domain::audit::{Actor, AuditOperation, AuditSubject};
    use netalloc_domain::id::ProviderId;
    use netalloc_domain::time::now;

    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteAuditLog {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteAuditLog::new(db.pool().clone())
    }

    #[tokio::test]
    async fn should_store_and_read_back_records_in_order() {
        let log = setup().await;
        let subject_id = uuid::Uuid::new_v4();
        let provider_id = ProviderId::new();
        let actor = Actor::new("alice");
        let created = AuditRecord::new(
            AuditSubject::NetworkPoint,
            subject_id,
            AuditOperation::Create,
            &actor,
            now(),
            &serde_json::json!({"code": "NP-1"}),
        );
        let archived = AuditRecord::new(
            AuditSubject::NetworkPoint,
            subject_id,
            AuditOperation::Archive,
            &actor,
            now(),
            &serde_json::json!({"code": "NP-1", "archived": false}),
        )
        .with_provider(Some(provider_id))
        .with_reason("expired");

        log.record(created.clone()).await.unwrap();
        log.record(archived.clone()).await.unwrap();

        let history = log.find_by_subject(subject_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, created.id);
        assert_eq!(history[1].operation, AuditOperation::Archive);
        assert_eq!(history[1].provider_id, Some(provider_id));
        assert_eq!(history[1].reason.as_deref(), Some("expired"));
        assert_eq!(history[1].author, "alice");
        assert_eq!(history[1].snapshot, archived.snapshot);
    }

    #[tokio::test]
    async fn should_return_empty_history_for_unknown_subject() {
        let log = setup().await;
        assert!(log
            .find_by_subject(uuid::Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }
}

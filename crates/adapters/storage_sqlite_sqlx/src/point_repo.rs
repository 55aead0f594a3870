//! `SQLite` implementation of [`NetworkPointRepository`].
//!
//! A point row and its whole queue are written inside one transaction, so
//! the owner column never disagrees with the stored queue head and the
//! `UNIQUE(network_point_id, queue_position)` constraint never sees a
//! half-shifted queue.

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use netalloc_app::ports::NetworkPointRepository;
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{NetworkPointId, ProviderId};
use netalloc_domain::network_point::NetworkPoint;
use netalloc_domain::registration::Registration;
use netalloc_domain::time::{Date, format_date};

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`NetworkPoint`].
struct Wrapper(NetworkPoint);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<NetworkPoint> {
        value.map(|w| w.0)
    }

    fn all(values: Vec<Self>) -> Vec<NetworkPoint> {
        values.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let code: String = row.try_get("code")?;
        let name: String = row.try_get("name")?;
        let point_type: String = row.try_get("point_type")?;
        let valid_from: String = row.try_get("valid_from")?;
        let valid_to: String = row.try_get("valid_to")?;
        let owner_id: Option<String> = row.try_get("owner_id")?;
        let archived: bool = row.try_get("archived")?;

        Ok(Self(NetworkPoint {
            id: codec::parse(&id)?,
            code,
            name,
            point_type: codec::parse(&point_type)?,
            valid_from: codec::date(&valid_from)?,
            valid_to: codec::date(&valid_to)?,
            owner: codec::parse_opt(owner_id)?,
            archived,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO network_points (id, code, name, point_type, valid_from, valid_to, owner_id, archived)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        code = excluded.code,
        name = excluded.name,
        point_type = excluded.point_type,
        valid_from = excluded.valid_from,
        valid_to = excluded.valid_to,
        owner_id = excluded.owner_id,
        archived = excluded.archived
";
const DELETE_QUEUE: &str = "DELETE FROM registrations WHERE network_point_id = ?";
const INSERT_REGISTRATION: &str = r"
    INSERT INTO registrations (id, network_point_id, provider_id, start_date, end_date, queue_position, current)
    VALUES (?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM network_points WHERE id = ?";
const SELECT_BY_CODE: &str = "SELECT * FROM network_points WHERE code = ?";
const SELECT_BY_ARCHIVED: &str = "SELECT * FROM network_points WHERE archived = ? ORDER BY code";
const COUNT_OWNED: &str =
    "SELECT COUNT(*) FROM network_points WHERE archived = 0 AND owner_id = ?";
const SELECT_OWNED: &str =
    "SELECT * FROM network_points WHERE archived = 0 AND owner_id = ? ORDER BY code";
const SELECT_EXPIRED: &str =
    "SELECT * FROM network_points WHERE archived = 0 AND valid_to < ? ORDER BY valid_to, code";

/// `SQLite`-backed network point repository.
pub struct SqliteNetworkPointRepository {
    pool: SqlitePool,
}

impl SqliteNetworkPointRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl NetworkPointRepository for SqliteNetworkPointRepository {
    fn save_with_queue(
        &self,
        point: NetworkPoint,
        entries: Vec<Registration>,
    ) -> impl Future<Output = Result<NetworkPoint, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let point_id = point.id.to_string();

            sqlx::query(UPSERT)
                .bind(&point_id)
                .bind(&point.code)
                .bind(&point.name)
                .bind(point.point_type.to_string())
                .bind(format_date(point.valid_from))
                .bind(format_date(point.valid_to))
                .bind(point.owner.map(|id| id.to_string()))
                .bind(point.archived)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;

            sqlx::query(DELETE_QUEUE)
                .bind(&point_id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;

            for entry in &entries {
                sqlx::query(INSERT_REGISTRATION)
                    .bind(entry.id.to_string())
                    .bind(&point_id)
                    .bind(entry.provider_id.to_string())
                    .bind(format_date(entry.start_date))
                    .bind(format_date(entry.end_date))
                    .bind(i64::from(entry.queue_position))
                    .bind(entry.current)
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }

            tx.commit().await.map_err(StorageError::from)?;
            Ok(point)
        }
    }

    fn get_by_id(
        &self,
        id: NetworkPointId,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send {
        let pool = self.pool.clone();
        let code = code.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_CODE)
                .bind(code)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn list(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ARCHIVED)
                .bind(archived)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn count_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let count: i64 = sqlx::query_scalar(COUNT_OWNED)
                .bind(provider_id.to_string())
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(codec::count(count))
        }
    }

    fn find_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_OWNED)
                .bind(provider_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_expired(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_EXPIRED)
                .bind(format_date(today))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }
}

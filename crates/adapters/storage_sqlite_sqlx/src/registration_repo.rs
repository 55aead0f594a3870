//! `SQLite` implementation of [`RegistrationRepository`].
//!
//! Queues are written together with their point, see
//! [`SqliteNetworkPointRepository`](crate::point_repo::SqliteNetworkPointRepository).

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use netalloc_app::ports::RegistrationRepository;
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{NetworkPointId, ProviderId, RegistrationId};
use netalloc_domain::registration::Registration;
use netalloc_domain::time::{Date, format_date};

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Registration`].
struct Wrapper(Registration);

impl Wrapper {
    fn all(values: Vec<Self>) -> Vec<Registration> {
        values.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let network_point_id: String = row.try_get("network_point_id")?;
        let provider_id: String = row.try_get("provider_id")?;
        let start_date: String = row.try_get("start_date")?;
        let end_date: String = row.try_get("end_date")?;
        let queue_position: i64 = row.try_get("queue_position")?;
        let current: bool = row.try_get("current")?;

        let queue_position =
            u32::try_from(queue_position).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Registration {
            id: codec::parse(&id)?,
            network_point_id: codec::parse(&network_point_id)?,
            provider_id: codec::parse(&provider_id)?,
            start_date: codec::date(&start_date)?,
            end_date: codec::date(&end_date)?,
            queue_position,
            current,
        }))
    }
}

const SELECT_BY_ID: &str = "SELECT * FROM registrations WHERE id = ?";
const SELECT_BY_POINT: &str =
    "SELECT * FROM registrations WHERE network_point_id = ? ORDER BY queue_position";
const SELECT_BY_PROVIDER: &str =
    "SELECT * FROM registrations WHERE provider_id = ? ORDER BY network_point_id, queue_position";
const SELECT_EXPIRED_HEADS: &str = r"
    SELECT * FROM registrations
    WHERE current = 1 AND queue_position = 0 AND end_date < ?
    ORDER BY end_date
";
const UPDATE: &str = r"
    UPDATE registrations
    SET provider_id = ?, start_date = ?, end_date = ?, queue_position = ?, current = ?
    WHERE id = ?
";

/// `SQLite`-backed registration (queue entry) repository.
pub struct SqliteRegistrationRepository {
    pool: SqlitePool,
}

impl SqliteRegistrationRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RegistrationRepository for SqliteRegistrationRepository {
    fn get_by_id(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn find_by_point(
        &self,
        point_id: NetworkPointId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_POINT)
                .bind(point_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_PROVIDER)
                .bind(provider_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_expired_heads(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_EXPIRED_HEADS)
                .bind(format_date(today))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn update(
        &self,
        registration: Registration,
    ) -> impl Future<Output = Result<Registration, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(registration.provider_id.to_string())
                .bind(format_date(registration.start_date))
                .bind(format_date(registration.end_date))
                .bind(i64::from(registration.queue_position))
                .bind(registration.current)
                .bind(registration.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(registration)
        }
    }
}

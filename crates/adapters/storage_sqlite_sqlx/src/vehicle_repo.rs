//! `SQLite` implementation of [`VehicleRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use netalloc_app::ports::VehicleRepository;
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{ProviderId, VehicleId};
use netalloc_domain::time::{Date, format_date};
use netalloc_domain::vehicle::Vehicle;

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Vehicle`].
struct Wrapper(Vehicle);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Vehicle> {
        value.map(|w| w.0)
    }

    fn all(values: Vec<Self>) -> Vec<Vehicle> {
        values.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let license_plate: String = row.try_get("license_plate")?;
        let vin: String = row.try_get("vin")?;
        let brand: String = row.try_get("brand")?;
        let model: String = row.try_get("model")?;
        let status: String = row.try_get("status")?;
        let provider_id: Option<String> = row.try_get("provider_id")?;
        let assignment_start: Option<String> = row.try_get("assignment_start")?;
        let assignment_end: Option<String> = row.try_get("assignment_end")?;
        let archived: bool = row.try_get("archived")?;

        Ok(Self(Vehicle {
            id: codec::parse(&id)?,
            license_plate,
            vin,
            brand,
            model,
            status: codec::parse(&status)?,
            provider_id: codec::parse_opt(provider_id)?,
            assignment_start: codec::date_opt(assignment_start)?,
            assignment_end: codec::date_opt(assignment_end)?,
            archived,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO vehicles
        (id, license_plate, vin, brand, model, status, provider_id, assignment_start, assignment_end, archived)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";
const SELECT_BY_ID: &str = "SELECT * FROM vehicles WHERE id = ?";
const SELECT_BY_PLATE: &str = "SELECT * FROM vehicles WHERE license_plate = ?";
const UPDATE: &str = r"
    UPDATE vehicles
    SET license_plate = ?, vin = ?, brand = ?, model = ?, status = ?, provider_id = ?,
        assignment_start = ?, assignment_end = ?, archived = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM vehicles WHERE id = ?";
const COUNT_ACTIVE_BY_PROVIDER: &str =
    "SELECT COUNT(*) FROM vehicles WHERE archived = 0 AND provider_id = ?";
const SELECT_ACTIVE_BY_PROVIDER: &str =
    "SELECT * FROM vehicles WHERE archived = 0 AND provider_id = ? ORDER BY license_plate";
const SELECT_EXPIRED_ASSIGNMENTS: &str = r"
    SELECT * FROM vehicles
    WHERE archived = 0 AND provider_id IS NOT NULL AND assignment_end < ?
    ORDER BY assignment_end, license_plate
";

/// `SQLite`-backed vehicle repository.
pub struct SqliteVehicleRepository {
    pool: SqlitePool,
}

impl SqliteVehicleRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl VehicleRepository for SqliteVehicleRepository {
    fn create(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(vehicle.id.to_string())
                .bind(&vehicle.license_plate)
                .bind(&vehicle.vin)
                .bind(&vehicle.brand)
                .bind(&vehicle.model)
                .bind(vehicle.status.to_string())
                .bind(vehicle.provider_id.map(|id| id.to_string()))
                .bind(vehicle.assignment_start.map(format_date))
                .bind(vehicle.assignment_end.map(format_date))
                .bind(vehicle.archived)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(vehicle)
        }
    }

    fn get_by_id(
        &self,
        id: VehicleId,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send {
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

    fn find_by_license_plate(
        &self,
        plate: &str,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send {
        let pool = self.pool.clone();
        let plate = plate.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_PLATE)
                .bind(plate)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&vehicle.license_plate)
                .bind(&vehicle.vin)
                .bind(&vehicle.brand)
                .bind(&vehicle.model)
                .bind(vehicle.status.to_string())
                .bind(vehicle.provider_id.map(|id| id.to_string()))
                .bind(vehicle.assignment_start.map(format_date))
                .bind(vehicle.assignment_end.map(format_date))
                .bind(vehicle.archived)
                .bind(vehicle.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(vehicle)
        }
    }

    fn delete(&self, id: VehicleId) -> impl Future<Output = Result<(), AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn count_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let count: i64 = sqlx::query_scalar(COUNT_ACTIVE_BY_PROVIDER)
                .bind(provider_id.to_string())
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(codec::count(count))
        }
    }

    fn find_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ACTIVE_BY_PROVIDER)
                .bind(provider_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }

    fn find_expired_assignments(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_EXPIRED_ASSIGNMENTS)
                .bind(format_date(today))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::all(rows))
        }
    }
}

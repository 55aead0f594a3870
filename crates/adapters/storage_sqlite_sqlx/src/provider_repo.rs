//! `SQLite` implementation of [`ProviderRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use netalloc_app::ports::ProviderRepository;
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::ProviderId;
use netalloc_domain::provider::Provider;

use crate::codec;
use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Provider`].
struct Wrapper(Provider);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Provider> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let code: String = row.try_get("code")?;
        let name: String = row.try_get("name")?;
        let address: Option<String> = row.try_get("address")?;
        let state: Option<String> = row.try_get("state")?;
        let archived: bool = row.try_get("archived")?;

        Ok(Self(Provider {
            id: codec::parse(&id)?,
            code,
            name,
            address,
            state: codec::parse_opt(state)?,
            archived,
        }))
    }
}

const INSERT: &str =
    "INSERT INTO providers (id, code, name, address, state, archived) VALUES (?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM providers WHERE id = ?";
const SELECT_BY_CODE: &str = "SELECT * FROM providers WHERE code = ?";
const SELECT_BY_ARCHIVED: &str = "SELECT * FROM providers WHERE archived = ? ORDER BY name";
const UPDATE: &str =
    "UPDATE providers SET code = ?, name = ?, address = ?, state = ?, archived = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM providers WHERE id = ?";
const UNARCHIVE: &str = "UPDATE providers SET archived = 0 WHERE id = ? AND archived = 1";

/// `SQLite`-backed provider repository.
pub struct SqliteProviderRepository {
    pool: SqlitePool,
}

impl SqliteProviderRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ProviderRepository for SqliteProviderRepository {
    fn create(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(provider.id.to_string())
                .bind(&provider.code)
                .bind(&provider.name)
                .bind(&provider.address)
                .bind(provider.state.map(|state| state.to_string()))
                .bind(provider.archived)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(provider)
        }
    }

    fn get_by_id(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send {
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
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send {
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
    ) -> impl Future<Output = Result<Vec<Provider>, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ARCHIVED)
                .bind(archived)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&provider.code)
                .bind(&provider.name)
                .bind(&provider.address)
                .bind(provider.state.map(|state| state.to_string()))
                .bind(provider.archived)
                .bind(provider.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(provider)
        }
    }

    fn delete(&self, id: ProviderId) -> impl Future<Output = Result<(), AllocationError>> + Send {
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

    fn unarchive(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<bool, AllocationError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(UNARCHIVE)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() == 1)
        }
    }
}

//! Postgres-backed credential storage implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{CredentialStore, StoreError};
use crate::credential::Credential;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Credential store backed by a Postgres table.
///
/// The table holds one row per OAuth client id with the access token,
/// refresh token and expiry. Saving is an upsert so a successful refresh is
/// always durably recorded, including for rows seeded out-of-band.
#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn load(&self, client_id: &str) -> Result<Option<Credential>, StoreError> {
        let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT access_token, refresh_token, expires_at
            FROM patreon_credentials
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(access_token, refresh_token, expires_at)| {
            Credential::new(access_token, refresh_token, expires_at)
        }))
    }

    async fn save(&self, client_id: &str, credential: &Credential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO patreon_credentials (client_id, access_token, refresh_token, expires_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (client_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            "#,
        )
        .bind(client_id)
        .bind(credential.access_token.expose())
        .bind(credential.refresh_token.expose())
        .bind(credential.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

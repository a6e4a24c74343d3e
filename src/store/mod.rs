pub mod collection;

pub use collection::{format_timestamp, now_timestamp, Collection, Document};

use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

/// Errors from the document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing relation: {0}")]
    MissingRelation(String),

    #[error("Invalid query field: {0}")]
    InvalidField(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // Postgres 42P01 = undefined_table; surfaced as 503 with a hint
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("42P01") {
                return StoreError::MissingRelation("documents".to_string());
            }
        }
        StoreError::Sqlx(err)
    }
}

/// Well-known collection names. Handlers never spell these inline.
pub mod names {
    pub const USERS: &str = "users";
    pub const AFFILIATES: &str = "affiliates";
    pub const AFFILIATE_CONVERSIONS: &str = "affiliate_conversions";
    pub const PROMO_CODES: &str = "promo_codes";
    pub const PROMO_REDEMPTIONS: &str = "promo_redemptions";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const AUDIT_LOGS: &str = "audit_logs";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const EMAIL_LOGS: &str = "email_logs";
    pub const EMAIL_ENGAGEMENT: &str = "email_engagement";
    pub const ABUSE: &str = "abuse";
    pub const USAGE: &str = "usage";
    pub const CHAT_HISTORY: &str = "chat_history";
    pub const TWEETS: &str = "tweets";
    pub const ERROR_LOGS: &str = "error_logs";
}

/// Schemaless document store over a single Postgres JSONB table.
///
/// Every persisted record lives in `documents(collection, id, data)`; the
/// store hands out [`Collection`] views that expose get/set/add/query in
/// document terms. Per-document atomicity comes from Postgres row semantics;
/// multi-document writes (mutation + audit entry) share a transaction.
pub struct Store {
    pool: PgPool,
}

static STORE: OnceCell<Store> = OnceCell::const_new();

impl Store {
    /// Get the process-wide store, connecting lazily on first use.
    pub async fn shared() -> Result<&'static Store, StoreError> {
        STORE.get_or_try_init(Store::connect).await
    }

    async fn connect() -> Result<Store, StoreError> {
        let url =
            std::env::var("DATABASE_URL").map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new().connect(&url).await?;
        info!("Connected document store pool");

        let store = Store { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the backing table and indexes when absent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS documents_data_idx ON documents USING gin (data)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub fn collection(&self, name: &'static str) -> Collection {
        Collection::new(name, self.pool.clone())
    }

    /// Begin a transaction for paired writes (mutation + audit entry).
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        Ok(self.pool.begin().await.map_err(StoreError::from)?)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

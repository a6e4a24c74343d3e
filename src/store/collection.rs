use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, Row};
use uuid::Uuid;

use super::StoreError;

/// Canonical timestamp format for document fields. RFC 3339 in UTC with a
/// fixed precision, so lexicographic comparison matches chronological order
/// and range filters can run inside the store.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A single document: its id within the collection plus the JSON payload.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn field_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    pub fn to<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// View over one named collection of the document store.
#[derive(Clone)]
pub struct Collection {
    name: &'static str,
    pool: PgPool,
}

impl Collection {
    pub(super) fn new(name: &'static str, pool: PgPool) -> Self {
        Self { name, pool }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // ---- single-document reads ----

    pub async fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
            .bind(self.name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Document {
            id: r.get("id"),
            data: r.get("data"),
        }))
    }

    /// Like [`get`], but absent documents become `StoreError::NotFound`.
    pub async fn get_required(&self, id: &str) -> Result<Document, StoreError> {
        self.get(id).await?.ok_or_else(|| {
            StoreError::NotFound(format!("document {} not found in {}", id, self.name))
        })
    }

    pub async fn exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }

    // ---- single-document writes ----

    /// Replace (or create) the document wholesale.
    pub async fn set(&self, id: &str, data: &Value) -> Result<(), StoreError> {
        self.exec_set(&self.pool, id, data).await
    }

    pub async fn set_tx(
        &self,
        tx: &mut PgConnection,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        self.exec_set(tx, id, data).await
    }

    /// Shallow-merge fields into the document, creating it when absent.
    pub async fn merge(&self, id: &str, data: &Value) -> Result<(), StoreError> {
        self.exec_merge(&self.pool, id, data).await
    }

    pub async fn merge_tx(
        &self,
        tx: &mut PgConnection,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        self.exec_merge(tx, id, data).await
    }

    /// Shallow-merge fields into an existing document; absent ⇒ NotFound.
    pub async fn update(&self, id: &str, data: &Value) -> Result<(), StoreError> {
        self.exec_update(&self.pool, id, data).await
    }

    pub async fn update_tx(
        &self,
        tx: &mut PgConnection,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        self.exec_update(tx, id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.exec_delete(&self.pool, id).await
    }

    pub async fn delete_tx(&self, tx: &mut PgConnection, id: &str) -> Result<(), StoreError> {
        self.exec_delete(tx, id).await
    }

    /// Insert with a generated id; returns the id.
    pub async fn add(&self, data: &Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.exec_set(&self.pool, &id, data).await?;
        Ok(id)
    }

    pub async fn add_tx(&self, tx: &mut PgConnection, data: &Value) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.exec_set(tx, &id, data).await?;
        Ok(id)
    }

    async fn exec_set<'e, E: PgExecutor<'e>>(
        &self,
        ex: E,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id)
             DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(self.name)
        .bind(id)
        .bind(data)
        .execute(ex)
        .await?;
        Ok(())
    }

    async fn exec_merge<'e, E: PgExecutor<'e>>(
        &self,
        ex: E,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id)
             DO UPDATE SET data = documents.data || EXCLUDED.data, updated_at = now()",
        )
        .bind(self.name)
        .bind(id)
        .bind(data)
        .execute(ex)
        .await?;
        Ok(())
    }

    async fn exec_update<'e, E: PgExecutor<'e>>(
        &self,
        ex: E,
        id: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = now()
             WHERE collection = $1 AND id = $2",
        )
        .bind(self.name)
        .bind(id)
        .bind(data)
        .execute(ex)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "document {} not found in {}",
                id, self.name
            )));
        }
        Ok(())
    }

    async fn exec_delete<'e, E: PgExecutor<'e>>(&self, ex: E, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(self.name)
            .bind(id)
            .execute(ex)
            .await?;
        Ok(())
    }

    // ---- filtered queries ----

    pub fn query(&self) -> Query {
        Query {
            collection: self.name,
            pool: self.pool.clone(),
            conds: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Cond {
    Eq(&'static str, String),
    Gte(&'static str, String),
    Lte(&'static str, String),
    Lt(&'static str, String),
    InAny(&'static str, Vec<String>),
}

#[derive(Debug, Clone)]
enum Bind {
    Text(String),
    TextArray(Vec<String>),
    Int(i64),
}

/// Filtered query over a collection. All comparisons are on text projections
/// of JSONB fields (`data->>field`), which is exact for the string, boolean,
/// and RFC 3339 timestamp fields the data model uses.
pub struct Query {
    collection: &'static str,
    pool: PgPool,
    conds: Vec<Cond>,
    order: Option<(&'static str, bool)>, // (field, descending)
    limit: Option<i64>,
}

impl Query {
    pub fn eq(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conds.push(Cond::Eq(field, value.into()));
        self
    }

    pub fn eq_bool(self, field: &'static str, value: bool) -> Self {
        self.eq(field, if value { "true" } else { "false" })
    }

    pub fn gte(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conds.push(Cond::Gte(field, value.into()));
        self
    }

    pub fn lte(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conds.push(Cond::Lte(field, value.into()));
        self
    }

    pub fn lt(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.conds.push(Cond::Lt(field, value.into()));
        self
    }

    pub fn in_any(mut self, field: &'static str, values: Vec<String>) -> Self {
        self.conds.push(Cond::InAny(field, values));
        self
    }

    /// Lexicographic prefix search: `field >= prefix AND field < prefix + MAX`.
    pub fn prefix(self, field: &'static str, prefix: &str) -> Self {
        let upper = format!("{}\u{f8ff}", prefix);
        self.gte(field, prefix.to_string()).lt(field, upper)
    }

    pub fn order_desc(mut self, field: &'static str) -> Self {
        self.order = Some((field, true));
        self
    }

    pub fn order_asc(mut self, field: &'static str) -> Self {
        self.order = Some((field, false));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    pub async fn fetch(self) -> Result<Vec<Document>, StoreError> {
        let (sql, binds) = self.build("SELECT id, data FROM documents", true);
        let rows = bind_all(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| Document {
                id: r.get("id"),
                data: r.get("data"),
            })
            .collect())
    }

    pub async fn fetch_optional(mut self) -> Result<Option<Document>, StoreError> {
        self.limit = Some(1);
        Ok(self.fetch().await?.into_iter().next())
    }

    pub async fn count(self) -> Result<i64, StoreError> {
        let (sql, binds) = self.build("SELECT COUNT(*) AS n FROM documents", false);
        let row = bind_all(sqlx::query(&sql), &binds)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }

    /// Sum a numeric JSONB field across matching documents.
    pub async fn sum(self, field: &'static str) -> Result<f64, StoreError> {
        validate_field(field)?;
        let prefix = format!(
            "SELECT COALESCE(SUM((data->>'{}')::numeric), 0)::float8 AS total FROM documents",
            field
        );
        let (sql, binds) = self.build(&prefix, false);
        let row = bind_all(sqlx::query(&sql), &binds)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<f64, _>("total"))
    }

    /// Count matching documents grouped by the calendar day of a timestamp
    /// field (the first 10 chars of RFC 3339 are the date).
    pub async fn count_per_day(self, field: &'static str) -> Result<Vec<(String, i64)>, StoreError> {
        validate_field(field)?;
        let prefix = format!(
            "SELECT substr(data->>'{}', 1, 10) AS day, COUNT(*) AS n FROM documents",
            field
        );
        let (mut sql, binds) = self.build(&prefix, false);
        sql.push_str(" GROUP BY 1 ORDER BY 1");
        let rows = bind_all(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("day"), r.get::<i64, _>("n")))
            .collect())
    }

    fn build(&self, select: &str, with_order: bool) -> (String, Vec<Bind>) {
        let mut sql = format!("{} WHERE collection = $1", select);
        let mut binds = vec![Bind::Text(self.collection.to_string())];
        let mut n = 1;

        for cond in &self.conds {
            n += 1;
            match cond {
                Cond::Eq(f, v) => {
                    sql.push_str(&format!(" AND data->>'{}' = ${}", f, n));
                    binds.push(Bind::Text(v.clone()));
                }
                Cond::Gte(f, v) => {
                    sql.push_str(&format!(" AND data->>'{}' >= ${}", f, n));
                    binds.push(Bind::Text(v.clone()));
                }
                Cond::Lte(f, v) => {
                    sql.push_str(&format!(" AND data->>'{}' <= ${}", f, n));
                    binds.push(Bind::Text(v.clone()));
                }
                Cond::Lt(f, v) => {
                    sql.push_str(&format!(" AND data->>'{}' < ${}", f, n));
                    binds.push(Bind::Text(v.clone()));
                }
                Cond::InAny(f, vs) => {
                    sql.push_str(&format!(" AND data->>'{}' = ANY(${})", f, n));
                    binds.push(Bind::TextArray(vs.clone()));
                }
            }
        }

        if with_order {
            if let Some((field, desc)) = self.order {
                sql.push_str(&format!(
                    " ORDER BY data->>'{}' {} NULLS LAST",
                    field,
                    if desc { "DESC" } else { "ASC" }
                ));
            }
            if let Some(limit) = self.limit {
                n += 1;
                sql.push_str(&format!(" LIMIT ${}", n));
                binds.push(Bind::Int(limit));
            }
        }

        (sql, binds)
    }
}

/// Field names come from code, never request input; this is a final guard
/// because they are interpolated into the SQL text.
fn validate_field(field: &str) -> Result<(), StoreError> {
    if !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    binds: &'q [Bind],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(s) => query.bind(s),
            Bind::TextArray(v) => query.bind(v),
            Bind::Int(i) => query.bind(i),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    // connect_lazy spawns the pool reaper, so these need a runtime even
    // though no query ever runs
    fn query_for(collection: &'static str) -> Query {
        Query {
            collection,
            pool: PgPool::connect_lazy("postgres://localhost/unused").expect("lazy pool"),
            conds: Vec::new(),
            order: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn builds_eq_order_limit() {
        let q = query_for("subscriptions")
            .eq("status", "active")
            .order_desc("updated_at")
            .limit(100);
        let (sql, binds) = q.build("SELECT id, data FROM documents", true);
        assert_eq!(
            sql,
            "SELECT id, data FROM documents WHERE collection = $1 AND data->>'status' = $2 \
             ORDER BY data->>'updated_at' DESC NULLS LAST LIMIT $3"
        );
        assert_eq!(binds.len(), 3);
    }

    #[tokio::test]
    async fn builds_prefix_bounds() {
        let q = query_for("users").prefix("email", "sam@");
        let (sql, _) = q.build("SELECT id, data FROM documents", true);
        assert!(sql.contains("data->>'email' >= $2"));
        assert!(sql.contains("data->>'email' < $3"));
    }

    #[tokio::test]
    async fn builds_in_any() {
        let q = query_for("users").in_any(
            "role",
            vec!["owner".into(), "admin".into(), "support".into()],
        );
        let (sql, _) = q.build("SELECT COUNT(*) AS n FROM documents", false);
        assert!(sql.contains("data->>'role' = ANY($2)"));
    }

    #[test]
    fn validates_field_names() {
        assert!(validate_field("created_at").is_ok());
        assert!(validate_field("a1_b2").is_ok());
        assert!(validate_field("created-at").is_err());
        assert!(validate_field("data'; DROP TABLE").is_err());
        assert!(validate_field("").is_err());
    }

    #[test]
    fn timestamp_is_lexicographically_ordered() {
        let early = format_timestamp("2026-01-02T03:04:05Z".parse().unwrap());
        let late = format_timestamp("2026-01-02T03:04:06Z".parse().unwrap());
        assert!(early < late);
        assert!(early.ends_with('Z'));
    }
}

use std::collections::HashMap;
use std::fmt::Write as _;

use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement, TransactionTrait,
    Value,
};
use statmon_common::retry::{retry, Backoff, DEFAULT_BACKOFF};

use crate::error::{Result, StoreError};

const CREATE_GAUGE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS gauge_metrics (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        name TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,
        CONSTRAINT gauge_metrics_name_key UNIQUE (name)
    )";

const CREATE_COUNTER_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS counter_metrics (
        id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
        name TEXT NOT NULL,
        value BIGINT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP NOT NULL,
        CONSTRAINT counter_metrics_name_key UNIQUE (name)
    )";

const UPSERT_GAUGE: &str = "INSERT INTO gauge_metrics (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value, updated_at = now()";

const UPSERT_COUNTER: &str = "INSERT INTO counter_metrics (name, value) VALUES ($1, $2) \
     ON CONFLICT (name) DO UPDATE SET value = counter_metrics.value + EXCLUDED.value, \
     updated_at = now()";

/// Relational backend over a PostgreSQL pool.
///
/// Writes are keyed upserts: gauges replace, counters add to the stored
/// value. Connection-class failures retry on the shared backoff schedule;
/// every other error returns after the single attempt.
pub struct DbStore {
    db: DatabaseConnection,
    backoff: Backoff,
}

/// Connection-class errors (the SQLSTATE 08xxx family surfaces through these
/// variants) are the only retryable kind.
fn is_connection_err(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

/// Builds one multi-row upsert so a whole batch is a single round trip.
/// Map iteration guarantees distinct names, which `ON CONFLICT` requires
/// within a single statement.
fn build_batch_upsert<V>(
    table: &str,
    merge: &str,
    batch: &HashMap<String, V>,
) -> (String, Vec<Value>)
where
    V: Copy + Into<Value>,
{
    let mut sql = format!("INSERT INTO {table} (name, value) VALUES ");
    let mut values: Vec<Value> = Vec::with_capacity(batch.len() * 2);
    for (i, (name, value)) in batch.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        let _ = write!(sql, "(${}, ${})", 2 * i + 1, 2 * i + 2);
        values.push(name.clone().into());
        values.push((*value).into());
    }
    let _ = write!(
        sql,
        " ON CONFLICT (name) DO UPDATE SET value = {merge}, updated_at = now()"
    );
    (sql, values)
}

impl DbStore {
    /// Connects, pings, and creates both tables in one transaction.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let db = Database::connect(dsn).await?;
        db.ping().await?;

        let txn = db.begin().await?;
        txn.execute_unprepared(CREATE_GAUGE_TABLE).await?;
        txn.execute_unprepared(CREATE_COUNTER_TABLE).await?;
        txn.commit().await?;

        Ok(Self {
            db,
            backoff: DEFAULT_BACKOFF,
        })
    }

    async fn exec(&self, sql: &str, values: Vec<Value>) -> Result<()> {
        retry(self.backoff, is_connection_err, || {
            self.db.execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                values.clone(),
            ))
        })
        .await?;
        Ok(())
    }

    pub async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.exec(UPSERT_GAUGE, vec![name.into(), value.into()]).await
    }

    pub async fn update_gauges(&self, batch: &HashMap<String, f64>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let (sql, values) = build_batch_upsert("gauge_metrics", "EXCLUDED.value", batch);
        self.exec(&sql, values).await
    }

    pub async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        self.exec(UPSERT_COUNTER, vec![name.into(), delta.into()]).await
    }

    pub async fn update_counters(&self, batch: &HashMap<String, i64>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let (sql, values) = build_batch_upsert(
            "counter_metrics",
            "counter_metrics.value + EXCLUDED.value",
            batch,
        );
        self.exec(&sql, values).await
    }

    async fn query_value(&self, sql: &str, name: &str) -> Result<sea_orm::QueryResult> {
        let row = retry(self.backoff, is_connection_err, || {
            self.db.query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [name.into()],
            ))
        })
        .await?;
        row.ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub async fn get_gauge(&self, name: &str) -> Result<f64> {
        let row = self
            .query_value("SELECT value FROM gauge_metrics WHERE name = $1", name)
            .await?;
        Ok(row.try_get("", "value")?)
    }

    pub async fn get_counter(&self, name: &str) -> Result<i64> {
        let row = self
            .query_value("SELECT value FROM counter_metrics WHERE name = $1", name)
            .await?;
        Ok(row.try_get("", "value")?)
    }

    pub async fn get_gauge_list(&self) -> Result<HashMap<String, f64>> {
        let rows = retry(self.backoff, is_connection_err, || {
            self.db.query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT name, value FROM gauge_metrics",
            ))
        })
        .await?;

        let mut list = HashMap::with_capacity(rows.len());
        for row in rows {
            list.insert(row.try_get("", "name")?, row.try_get("", "value")?);
        }
        Ok(list)
    }

    pub async fn get_counter_list(&self) -> Result<HashMap<String, i64>> {
        let rows = retry(self.backoff, is_connection_err, || {
            self.db.query_all(Statement::from_string(
                DbBackend::Postgres,
                "SELECT name, value FROM counter_metrics",
            ))
        })
        .await?;

        let mut list = HashMap::with_capacity(rows.len());
        for row in rows {
            list.insert(row.try_get("", "name")?, row.try_get("", "value")?);
        }
        Ok(list)
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.db.ping().await?)
    }

    /// Drains the connection pool. Operations after close fail.
    pub async fn close(&self) -> Result<()> {
        Ok(self.db.clone().close().await?)
    }
}

//! PostgreSQL target implementation.
//!
//! Uses deadpool-postgres for pooling. Each entity's parent table declares
//! its natural key as a unique BIGINT column plus a `last_synced_at`
//! timestamp; child tables declare `(fk, sequence)` unique. The engine does
//! not create tables - the target schema is a contract owned by the store.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info};

use crate::batch::SyncBatch;
use crate::catalog::{ChildSpec, SyncEntityDescriptor};
use crate::config::TargetConfig;
use crate::error::{Result, SyncError};
use crate::target::SyncTarget;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL sync target.
pub struct PgTarget {
    pool: Pool,
    schema: String,
}

impl PgTarget {
    /// Create a target from configuration and verify connectivity.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| SyncError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, "testing PostgreSQL target connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Quote a PostgreSQL identifier.
    fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Qualify a table name with the target schema.
    fn qualify(&self, table: &str) -> String {
        format!("{}.{}", Self::quote_ident(&self.schema), Self::quote_ident(table))
    }

    fn parent_upsert_sql(&self, entity: &SyncEntityDescriptor) -> String {
        let key = Self::quote_ident(entity.key_column);
        let mut cols = vec![key.clone()];
        cols.extend(entity.columns.iter().map(|c| Self::quote_ident(c.column)));

        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${i}")).collect();
        let updates: Vec<String> = entity
            .columns
            .iter()
            .map(|c| {
                let col = Self::quote_ident(c.column);
                format!("{col} = EXCLUDED.{col}")
            })
            .chain(std::iter::once("\"last_synced_at\" = now()".to_string()))
            .collect();

        format!(
            "INSERT INTO {} ({}, \"last_synced_at\") VALUES ({}, now()) \
             ON CONFLICT ({}) DO UPDATE SET {}",
            self.qualify(entity.parent_table),
            cols.join(", "),
            placeholders.join(", "),
            key,
            updates.join(", "),
        )
    }

    fn child_upsert_sql(&self, child: &ChildSpec) -> String {
        let fk = Self::quote_ident(child.fk_column);
        let seq = Self::quote_ident(child.sequence_column);
        let mut cols = vec![fk.clone(), seq.clone()];
        cols.extend(child.columns.iter().map(|c| Self::quote_ident(c.column)));

        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${i}")).collect();
        let updates: Vec<String> = child
            .columns
            .iter()
            .map(|c| {
                let col = Self::quote_ident(c.column);
                format!("{col} = EXCLUDED.{col}")
            })
            .collect();

        let conflict = if updates.is_empty() {
            format!("ON CONFLICT ({fk}, {seq}) DO NOTHING")
        } else {
            format!(
                "ON CONFLICT ({fk}, {seq}) DO UPDATE SET {}",
                updates.join(", ")
            )
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) {}",
            self.qualify(child.table),
            cols.join(", "),
            placeholders.join(", "),
            conflict,
        )
    }

    fn child_delete_sql(&self, child: &ChildSpec) -> String {
        format!(
            "DELETE FROM {} WHERE {} = $1",
            self.qualify(child.table),
            Self::quote_ident(child.fk_column),
        )
    }

    async fn try_write(
        &self,
        entity: &SyncEntityDescriptor,
        batch: &SyncBatch,
    ) -> Result<(usize, usize)> {
        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("acquiring connection for {} sync", entity.name)))?;
        let tx = client.transaction().await?;

        let parent_stmt = tx.prepare(&self.parent_upsert_sql(entity)).await?;
        let mut parent_count = 0usize;
        for row in &batch.parents {
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(row.values.len() + 1);
            params.push(&row.key);
            for value in &row.values {
                params.push(value);
            }
            tx.execute(&parent_stmt, &params).await?;
            parent_count += 1;
        }

        let mut child_count = 0usize;
        if let Some(child) = &entity.child {
            let insert_stmt = tx.prepare(&self.child_upsert_sql(child)).await?;
            let delete_stmt = if child.replace_rows {
                Some(tx.prepare(&self.child_delete_sql(child)).await?)
            } else {
                None
            };

            for (parent_key, rows) in &batch.children {
                if let Some(delete_stmt) = &delete_stmt {
                    let deleted = tx.execute(delete_stmt, &[parent_key]).await?;
                    if deleted > 0 {
                        debug!(
                            entity = entity.name,
                            parent_key, deleted, "replaced existing child rows"
                        );
                    }
                }
                for row in rows {
                    let mut params: Vec<&(dyn ToSql + Sync)> =
                        Vec::with_capacity(row.values.len() + 2);
                    params.push(&row.parent_key);
                    params.push(&row.sequence);
                    for value in &row.values {
                        params.push(value);
                    }
                    tx.execute(&insert_stmt, &params).await?;
                    child_count += 1;
                }
            }
        }

        tx.commit().await?;
        Ok((parent_count, child_count))
    }
}

#[async_trait]
impl SyncTarget for PgTarget {
    async fn resolve_watermark(&self, entity: &SyncEntityDescriptor) -> Result<i64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("resolving {} watermark", entity.name)))?;
        let sql = format!(
            "SELECT COALESCE(MAX({}), 0)::BIGINT FROM {}",
            Self::quote_ident(entity.watermark_column),
            self.qualify(entity.parent_table),
        );
        let row = client.query_one(&sql, &[]).await?;
        let watermark: i64 = row.get(0);
        debug!(entity = entity.name, watermark, "resolved watermark");
        Ok(watermark)
    }

    async fn write_batch(
        &self,
        entity: &SyncEntityDescriptor,
        batch: &SyncBatch,
    ) -> Result<(usize, usize)> {
        // Rewrap database errors so the failure names the entity whose
        // transaction rolled back.
        self.try_write(entity, batch).await.map_err(|e| match e {
            SyncError::Db(inner) => SyncError::write(entity.name, inner),
            other => other,
        })
    }
}

//! Shared result-cache tier stored in a Lance table.
//!
//! Every process pointing at the same database URI sees the same entries.
//! Writes go through `merge_insert` on `key`, so a reader observes either the
//! previous row or the new one. When the table grows past `capacity` the
//! oldest rows by `created_at` are deleted.

use anyhow::{anyhow, Result as AnyResult};
use arrow_array::{Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray, UInt64Array};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::Table;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

use docsift_cache::{CacheEntry, CacheTier};
use docsift_core::{Error, Result};

use crate::schema::build_cache_schema;
use crate::table::{open_db, open_or_create, sql_str};

pub struct LanceSharedTier {
    table: Table,
    capacity: usize,
    handle: Handle,
}

impl LanceSharedTier {
    pub async fn open(uri: &str, table_name: &str, capacity: usize) -> AnyResult<Self> {
        let conn = open_db(uri).await?;
        let table = open_or_create(&conn, table_name, build_cache_schema()).await?;
        Ok(Self { table, capacity: capacity.max(1), handle: Handle::current() })
    }

    async fn fetch(&self, key: &str) -> AnyResult<Vec<RecordBatch>> {
        let stream = self.table.query().only_if(format!("key = {}", sql_str(key))).limit(1).execute().await?;
        Ok(stream.try_collect().await?)
    }

    async fn store(&self, entry: &CacheEntry) -> AnyResult<()> {
        let schema = build_cache_schema();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec![entry.key.clone()])),
                Arc::new(StringArray::from(vec![entry.value.clone()])),
                Arc::new(UInt64Array::from(vec![entry.content_version])),
                Arc::new(TimestampMillisecondArray::from(vec![entry.created_at])),
            ],
        )?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let mut mi = self.table.merge_insert(&["key"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        mi.execute(reader).await?;
        self.prune().await
    }

    async fn prune(&self) -> AnyResult<()> {
        let rows = self.table.count_rows(None).await?;
        if rows <= self.capacity {
            return Ok(());
        }
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .select(Select::columns(&["key", "created_at"]))
            .execute()
            .await?
            .try_collect()
            .await?;
        let mut aged = Vec::with_capacity(rows);
        for batch in &batches {
            let keys = string_column(batch, "key")?;
            let created = batch
                .column_by_name("created_at")
                .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
                .ok_or_else(|| anyhow!("created_at column missing"))?;
            for i in 0..batch.num_rows() {
                aged.push((created.value(i), keys.value(i).to_string()));
            }
        }
        aged.sort();
        let surplus = aged.len().saturating_sub(self.capacity);
        if surplus == 0 {
            return Ok(());
        }
        let doomed: Vec<String> = aged.iter().take(surplus).map(|(_, k)| sql_str(k)).collect();
        self.table.delete(&format!("key IN ({})", doomed.join(", "))).await?;
        debug!(removed = surplus, "shared cache pruned");
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AnyResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn decode_entry(batch: &RecordBatch, row: usize) -> Result<CacheEntry> {
    let corrupt = |what: &str| Error::CacheCorruption(format!("shared cache row: {what}"));
    let key = string_column(batch, "key").map_err(|_| corrupt("key"))?;
    let value = string_column(batch, "value").map_err(|_| corrupt("value"))?;
    let version = batch
        .column_by_name("content_version")
        .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| corrupt("content_version"))?;
    let created = batch
        .column_by_name("created_at")
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| corrupt("created_at"))?;
    if key.is_null(row) || value.is_null(row) || version.is_null(row) {
        return Err(corrupt("null field"));
    }
    Ok(CacheEntry {
        key: key.value(row).to_string(),
        value: value.value(row).to_string(),
        content_version: version.value(row),
        created_at: created.value(row),
    })
}

impl CacheTier for LanceSharedTier {
    fn name(&self) -> &'static str { "shared" }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let batches = self.handle.block_on(self.fetch(key)).map_err(|e| Error::Operation(format!("shared cache read: {e:#}")))?;
        let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else { return Ok(None) };
        decode_entry(batch, 0).map(Some)
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.handle.block_on(self.store(entry)).map_err(|e| Error::Operation(format!("shared cache write: {e:#}")))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.handle
            .block_on(self.table.delete(&format!("key = {}", sql_str(key))))
            .map(|_| ())
            .map_err(|e| Error::Operation(format!("shared cache delete: {e}")))
    }
}

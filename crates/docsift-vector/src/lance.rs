//! LanceDB-backed vector index.
//!
//! The `VectorIndex` methods are synchronous and drive the async Lance API
//! through the runtime handle captured in `open`, so they must be called from
//! a blocking context (`spawn_blocking` or a plain thread), never from inside
//! an async task. The `*_async` methods are for callers that are already async.

use anyhow::{anyhow, Result as AnyResult};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use docsift_core::traits::VectorIndex;
use docsift_core::types::{Document, HitSource, RankedHit, SearchFilters};
use docsift_core::{Error, Result};

use crate::schema::{build_document_schema, VECTOR_COLUMN};
use crate::table::{encode_tags, filter_predicate, open_db, open_or_create, sql_str};

const BATCH_SIZE: usize = 1000;

pub struct LanceVectorIndex {
    table: Table,
    dim: usize,
    handle: Handle,
}

impl LanceVectorIndex {
    /// Connect to `uri` and open (or create) the document table for `dim`-length vectors.
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> AnyResult<Self> {
        let dim_i32 = i32::try_from(dim).map_err(|_| anyhow!("embedding dimension {dim} too large"))?;
        let conn = open_db(uri).await?;
        let table = open_or_create(&conn, table_name, build_document_schema(dim_i32)).await?;
        info!(uri, table = table_name, dim, "vector table ready");
        Ok(Self { table, dim, handle: Handle::current() })
    }

    pub async fn count_async(&self) -> AnyResult<usize> {
        Ok(self.table.count_rows(None).await?)
    }

    /// Insert or replace `docs` by id. Documents without a `dim`-length
    /// embedding are removed from the table instead. Returns rows written.
    pub async fn upsert_async(&self, docs: &[Document]) -> AnyResult<usize> {
        let (usable, unusable): (Vec<&Document>, Vec<&Document>) = docs.iter().partition(|d| d.has_embedding(self.dim));
        if !unusable.is_empty() {
            let ids: Vec<String> = unusable.iter().map(|d| sql_str(&d.id)).collect();
            self.table.delete(&format!("id IN ({})", ids.join(", "))).await?;
            warn!(skipped = unusable.len(), "documents without a usable embedding left out of the vector table");
        }
        let mut written = 0usize;
        for chunk in usable.chunks(BATCH_SIZE) {
            let batch = self.docs_to_record_batch(chunk)?;
            let schema = batch.schema();
            let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
            let mut mi = self.table.merge_insert(&["id"]);
            mi.when_matched_update_all(None).when_not_matched_insert_all();
            mi.execute(reader).await?;
            written += chunk.len();
        }
        Ok(written)
    }

    /// Nearest `limit` documents by cosine similarity, ties broken by id.
    ///
    /// Lance cuts its result at the requested row count in storage order, so
    /// documents tied at the boundary score could be dropped arbitrarily. The
    /// fetch widens until the row after the boundary scores strictly lower.
    pub async fn search_async(&self, embedding: &[f32], limit: usize, filters: &SearchFilters) -> AnyResult<Vec<RankedHit>> {
        let rows = self.table.count_rows(None).await?;
        if limit == 0 || rows == 0 {
            return Ok(Vec::new());
        }
        let mut fetch = limit.saturating_add(1).min(rows);
        loop {
            let mut hits = self.nearest(embedding, fetch, filters).await?;
            hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
            let complete = hits.len() < fetch || fetch >= rows || hits[limit - 1].score > hits[hits.len() - 1].score;
            if complete {
                hits.truncate(limit);
                return Ok(hits);
            }
            fetch = fetch.saturating_mul(2).min(rows);
        }
    }

    async fn nearest(&self, embedding: &[f32], fetch: usize, filters: &SearchFilters) -> AnyResult<Vec<RankedHit>> {
        let mut query = self
            .table
            .vector_search(embedding.to_vec())?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(fetch);
        if let Some(predicate) = filter_predicate(filters) {
            query = query.only_if(predicate);
        }
        let mut stream = query.execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("id column missing from vector results"))?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("_distance column missing from vector results"))?;
            for i in 0..batch.num_rows() {
                // cosine distance is 1 - similarity
                let score = 1.0 - f64::from(distances.value(i));
                hits.push(RankedHit::new(ids.value(i), score, HitSource::Vector));
            }
        }
        Ok(hits)
    }

    fn docs_to_record_batch(&self, docs: &[&Document]) -> AnyResult<RecordBatch> {
        let schema = build_document_schema(self.dim as i32);
        let mut ids = Vec::with_capacity(docs.len());
        let mut hashes = Vec::with_capacity(docs.len());
        let mut source_types = Vec::with_capacity(docs.len());
        let mut tags = Vec::with_capacity(docs.len());
        let mut timestamps = Vec::with_capacity(docs.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(docs.len());
        for doc in docs {
            ids.push(doc.id.clone());
            hashes.push(doc.content_hash.clone());
            source_types.push(doc.metadata.source_type.clone());
            tags.push(encode_tags(&doc.metadata.tags));
            timestamps.push(doc.metadata.timestamp);
            vectors.push(Some(doc.embedding.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(StringArray::from(source_types)),
                Arc::new(StringArray::from(tags)),
                Arc::new(Int64Array::from(timestamps)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
            ],
        )?;
        Ok(batch)
    }
}

impl VectorIndex for LanceVectorIndex {
    fn dim(&self) -> usize { self.dim }

    fn index(&self, docs: &[Document]) -> Result<()> {
        let written = self.handle.block_on(self.upsert_async(docs)).map_err(|e| Error::Operation(format!("vector upsert: {e:#}")))?;
        debug!(written, "vector table updated");
        Ok(())
    }

    fn search(&self, embedding: &[f32], limit: usize, filters: &SearchFilters) -> Result<Vec<RankedHit>> {
        if embedding.len() != self.dim {
            return Err(Error::vector_unavailable(format!("query embedding has {} dims, index expects {}", embedding.len(), self.dim)));
        }
        self.handle.block_on(self.search_async(embedding, limit, filters)).map_err(|e| Error::vector_unavailable(format!("{e:#}")))
    }
}

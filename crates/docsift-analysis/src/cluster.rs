//! DBSCAN over document embeddings.
//!
//! Input is sorted by id before anything else runs, so for fixed parameters
//! and embeddings the assignment is identical on every run, including which
//! cluster claims a border point reachable from two of them (the one whose
//! seed has the smaller id).

use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use docsift_core::config::{ClusterConfig, DistanceMetric};
use docsift_core::hashing::{cosine_similarity, euclidean_distance};
use docsift_core::traits::DocumentStore;
use docsift_core::types::{Cluster, Document, DocumentId, NOISE_CLUSTER_ID};
use docsift_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Neighbourhood radius in the chosen metric.
    pub eps: f32,
    /// Other points required within `eps` for a core point.
    pub min_pts: usize,
    pub metric: DistanceMetric,
}

impl ClusterParams {
    pub fn new(eps: f32, min_pts: usize) -> Result<Self> {
        let params = Self { eps, min_pts, metric: DistanceMetric::default() };
        params.validate()?;
        Ok(params)
    }

    pub fn with_config(mut self, config: &ClusterConfig) -> Self {
        self.metric = config.metric;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::ConfigInvalid(format!("cluster eps must be positive, got {}", self.eps)));
        }
        if self.min_pts == 0 {
            return Err(Error::ConfigInvalid("cluster min_pts must be at least 1".into()));
        }
        Ok(())
    }
}

pub struct ClusterEngine {
    params: ClusterParams,
    dim: usize,
}

impl ClusterEngine {
    /// `dim` is the deployment's embedding dimension; other lengths are noise.
    pub fn new(params: ClusterParams, dim: usize) -> Result<Self> {
        params.validate()?;
        if dim == 0 {
            return Err(Error::ConfigInvalid("cluster embedding dimension must be at least 1".into()));
        }
        Ok(Self { params, dim })
    }

    /// Cluster the given documents; unknown ids fail with `NotFound`.
    pub fn cluster(&self, store: &dyn DocumentStore, ids: &[DocumentId]) -> Result<Vec<Cluster>> {
        let unique: Vec<DocumentId> = ids.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let docs = store.get_many(&unique)?;
        Ok(self.cluster_documents(&docs))
    }

    /// Clusters numbered from 0 in order of their smallest member id,
    /// followed by one noise group when any document is left unclustered.
    /// Documents without a `dim`-length embedding are noise.
    pub fn cluster_documents(&self, docs: &[Document]) -> Vec<Cluster> {
        let started = Instant::now();
        let mut sorted: Vec<&Document> = docs.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let dim = self.dim;
        let (points, invalid): (Vec<&Document>, Vec<&Document>) = sorted.into_iter().partition(|d| d.has_embedding(dim));
        if !invalid.is_empty() {
            warn!(count = invalid.len(), dim, "documents without a usable embedding reported as noise");
        }

        let neighbours = self.neighbourhoods(&points);
        let core: Vec<bool> = neighbours.iter().map(|n| n.len() >= self.params.min_pts).collect();
        let mut label: Vec<Option<usize>> = vec![None; points.len()];
        let mut next = 0usize;
        for seed in 0..points.len() {
            if label[seed].is_some() || !core[seed] {
                continue;
            }
            let id = next;
            next += 1;
            label[seed] = Some(id);
            let mut queue: VecDeque<usize> = neighbours[seed].iter().copied().collect();
            while let Some(p) = queue.pop_front() {
                if label[p].is_some() {
                    continue;
                }
                label[p] = Some(id);
                if core[p] {
                    queue.extend(neighbours[p].iter().copied());
                }
            }
        }

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); next];
        let mut noise: Vec<DocumentId> = Vec::new();
        for (i, l) in label.iter().enumerate() {
            match l {
                Some(c) => members[*c].push(i),
                None => noise.push(points[i].id.clone()),
            }
        }
        noise.extend(invalid.iter().map(|d| d.id.clone()));
        noise.sort();

        let mut clusters: Vec<Cluster> = members
            .iter()
            .enumerate()
            .map(|(c, idx)| Cluster {
                cluster_id: c as i32,
                member_ids: idx.iter().map(|&i| points[i].id.clone()).collect(),
                centroid: Some(centroid(idx.iter().map(|&i| points[i].embedding.as_slice()), dim)),
                noise: false,
            })
            .collect();
        info!(
            documents = docs.len(),
            clusters = clusters.len(),
            noise = noise.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "clustering finished"
        );
        if !noise.is_empty() {
            clusters.push(Cluster { cluster_id: NOISE_CLUSTER_ID, member_ids: noise, centroid: None, noise: true });
        }
        clusters
    }

    /// For every point, the other points within `eps`, ascending.
    fn neighbourhoods(&self, points: &[&Document]) -> Vec<Vec<usize>> {
        let eps = f64::from(self.params.eps);
        let metric = self.params.metric;
        (0..points.len())
            .into_par_iter()
            .map(|i| {
                (0..points.len())
                    .filter(|&j| j != i && distance(metric, &points[i].embedding, &points[j].embedding) <= eps)
                    .collect()
            })
            .collect()
    }
}

fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine => 1.0 - f64::from(cosine_similarity(a, b)),
        DistanceMetric::Euclidean => f64::from(euclidean_distance(a, b)),
    }
}

fn centroid<'a>(vectors: impl Iterator<Item = &'a [f32]>, dim: usize) -> Vec<f32> {
    let mut sum = vec![0f64; dim];
    let mut n = 0usize;
    for v in vectors {
        for (s, x) in sum.iter_mut().zip(v) {
            *s += f64::from(*x);
        }
        n += 1;
    }
    sum.into_iter().map(|s| (s / n.max(1) as f64) as f32).collect()
}

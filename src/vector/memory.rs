// ABOUTME: In-process vector index with brute-force cosine similarity
// ABOUTME: Used by tests and local runs without a hosted index
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Saige Dental Intelligence

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexDescription, VectorIndex, VectorMatch, VectorRecord};
use crate::constants::embeddings::DEFAULT_METRIC;
use crate::errors::{AppError, AppResult};

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[derive(Debug, Default)]
struct IndexState {
    dimension: Option<usize>,
    records: HashMap<String, VectorRecord>,
}

/// Vector index held in memory
///
/// A fresh index exists with an unset dimension; the first upsert fixes it.
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    name: String,
    state: RwLock<Option<IndexState>>,
}

impl InMemoryVectorIndex {
    /// Create an empty, existing index
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(Some(IndexState::default())),
        }
    }

    /// Number of stored vectors
    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .as_ref()
            .map_or(0, |s| s.records.len())
    }

    /// Whether the index holds no vectors
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// IDs of every stored vector, sorted
    pub async fn ids(&self) -> Vec<String> {
        let guard = self.state.read().await;
        let mut ids: Vec<String> = guard
            .as_ref()
            .map(|s| s.records.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

fn missing(name: &str) -> AppError {
    AppError::not_found(format!("Vector index {name}"))
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> AppResult<Vec<VectorMatch>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(|| missing(&self.name))?;

        let mut matches: Vec<VectorMatch> = state
            .records
            .values()
            .filter(|r| source.map_or(true, |s| r.metadata.source == s))
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: serde_json::to_value(&r.metadata).ok(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(|| missing(&self.name))?;

        for record in records {
            let dimension = *state.dimension.get_or_insert(record.values.len());
            if record.values.len() != dimension {
                return Err(AppError::invalid_input(format!(
                    "Vector {} has dimension {}, index expects {dimension}",
                    record.id,
                    record.values.len()
                )));
            }
            state.records.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn describe_index(&self) -> AppResult<Option<IndexDescription>> {
        Ok(self.state.read().await.as_ref().map(|s| IndexDescription {
            name: self.name.clone(),
            dimension: s.dimension.unwrap_or_default(),
            metric: DEFAULT_METRIC.to_owned(),
            ready: true,
        }))
    }

    async fn create_index(&self, dimension: usize, _metric: &str) -> AppResult<()> {
        let mut guard = self.state.write().await;
        if guard.is_some() {
            return Err(AppError::invalid_input(format!(
                "Vector index {} already exists",
                self.name
            )));
        }
        *guard = Some(IndexState {
            dimension: Some(dimension),
            records: HashMap::new(),
        });
        Ok(())
    }

    async fn delete_index(&self) -> AppResult<()> {
        self.state
            .write()
            .await
            .take()
            .map(|_| ())
            .ok_or_else(|| missing(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ChunkMetadata;

    fn record(id: &str, source: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_owned(),
            values,
            metadata: ChunkMetadata {
                source: source.to_owned(),
                chunk_index: 0,
                text: format!("text of {id}"),
            },
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity_and_filters() {
        let index = InMemoryVectorIndex::new("kb");
        index
            .upsert(&[
                record("a", "billing.txt", vec![1.0, 0.0]),
                record("b", "billing.txt", vec![0.7, 0.7]),
                record("c", "hygiene.txt", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(matches[0].metadata_str("text"), Some("text of a"));

        let matches = index.query(&[1.0, 0.0], 10, Some("hygiene.txt")).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata_str("source"), Some("hygiene.txt"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryVectorIndex::new("kb");
        index.upsert(&[record("a", "f.txt", vec![1.0, 0.0])]).await.unwrap();
        let result = index.upsert(&[record("b", "f.txt", vec![1.0])]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_recreate() {
        let index = InMemoryVectorIndex::new("kb");
        index.upsert(&[record("a", "f.txt", vec![1.0, 0.0])]).await.unwrap();

        index.delete_index().await.unwrap();
        assert!(index.describe_index().await.unwrap().is_none());
        assert!(index.query(&[1.0, 0.0], 5, None).await.is_err());

        index.create_index(3, "cosine").await.unwrap();
        let description = index.describe_index().await.unwrap().unwrap();
        assert_eq!(description.dimension, 3);
        assert!(index.is_empty().await);
    }
}

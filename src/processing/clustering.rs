//! Redundancy filter: keep one representative chunk per embedding cluster.
//!
//! Chunks are embedded and grouped with `linfa-clustering`'s k-means (k-means++ seeding from a
//! fixed seed so repeated runs over the same upload pick the same chunks). For each centroid
//! the closest chunk not already chosen is kept. Representatives come back in cluster order
//! unless `sorted` is set, in which case they are returned in document order.

use super::types::{ClusteringError, TextChunk};
use crate::embedding::EmbeddingClient;
use linfa::{DatasetBase, traits::Fit};
use linfa_clustering::KMeans;
use ndarray::{Array2, ArrayView1};
use rand::{SeedableRng, rngs::StdRng};

const MAX_ITERATIONS: u64 = 300;

/// Embedding-space clustering filter.
#[derive(Debug, Clone, Copy)]
pub struct ClusteringFilter {
    /// Number of clusters (and therefore representatives) to produce.
    pub num_clusters: usize,
    /// Seed for centroid initialization.
    pub seed: u64,
    /// Return representatives in original chunk order.
    pub sorted: bool,
}

impl Default for ClusteringFilter {
    fn default() -> Self {
        Self {
            num_clusters: 5,
            seed: 42,
            sorted: false,
        }
    }
}

impl ClusteringFilter {
    /// Reduce `chunks` to one representative per cluster.
    pub async fn filter(
        &self,
        chunks: Vec<TextChunk>,
        embedder: &dyn EmbeddingClient,
    ) -> Result<Vec<TextChunk>, ClusteringError> {
        if self.num_clusters == 0 {
            return Err(ClusteringError::InvalidClusterCount);
        }
        if chunks.len() < self.num_clusters {
            return Err(ClusteringError::NotEnoughChunks {
                chunks: chunks.len(),
                clusters: self.num_clusters,
            });
        }

        tracing::info!(
            chunks = chunks.len(),
            clusters = self.num_clusters,
            "Clustering texts using embeddings"
        );
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.generate_embeddings(texts).await?;
        if vectors.len() != chunks.len() {
            return Err(ClusteringError::EmbeddingCount {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let filter = *self;
        let selected = tokio::task::spawn_blocking(move || filter.select(&vectors))
            .await
            .map_err(|error| ClusteringError::Task(error.to_string()))??;

        let mut slots: Vec<Option<TextChunk>> = chunks.into_iter().map(Some).collect();
        let representatives: Vec<TextChunk> = selected
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        tracing::info!(selected = representatives.len(), "Text clustering completed");
        Ok(representatives)
    }

    /// Indices of the representative vectors, in output order.
    pub(crate) fn select(&self, vectors: &[Vec<f32>]) -> Result<Vec<usize>, ClusteringError> {
        let points = to_matrix(vectors)?;
        let centroids = fit_centroids(&points, self.num_clusters, self.seed)?;
        let mut selected = closest_to_centroids(&points, &centroids);
        if self.sorted {
            selected.sort_unstable();
        }
        Ok(selected)
    }
}

/// Stack embeddings into an `n x dim` matrix, rejecting ragged input.
fn to_matrix(vectors: &[Vec<f32>]) -> Result<Array2<f64>, ClusteringError> {
    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    if dimension == 0 || vectors.iter().any(|vector| vector.len() != dimension) {
        return Err(ClusteringError::DimensionMismatch);
    }
    let flat: Vec<f64> = vectors.iter().flatten().map(|v| f64::from(*v)).collect();
    Array2::from_shape_vec((vectors.len(), dimension), flat)
        .map_err(|_| ClusteringError::DimensionMismatch)
}

/// Seeded k-means (k-means++ init, single run). Requires `points.nrows() >= k > 0`.
pub(crate) fn fit_centroids(
    points: &Array2<f64>,
    k: usize,
    seed: u64,
) -> Result<Array2<f64>, ClusteringError> {
    let dataset = DatasetBase::from(points.clone());
    let model = KMeans::params_with_rng(k, StdRng::seed_from_u64(seed))
        .n_runs(1)
        .max_n_iterations(MAX_ITERATIONS)
        .fit(&dataset)?;
    Ok(model.centroids().clone())
}

/// For each centroid in order, the closest point index not already taken.
pub(crate) fn closest_to_centroids(points: &Array2<f64>, centroids: &Array2<f64>) -> Vec<usize> {
    let mut taken = vec![false; points.nrows()];
    let mut selected = Vec::with_capacity(centroids.nrows());

    for centroid in centroids.rows() {
        let best = points
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !taken[*index])
            .map(|(index, point)| (index, squared_distance(point, centroid)))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((index, _)) = best {
            taken[index] = true;
            selected.push(index);
        }
    }

    selected
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

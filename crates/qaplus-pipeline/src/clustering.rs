//! HDBSCAN over L2-normalized span embeddings.
//!
//! The `hdbscan` crate assigns the raw labels. They are then trimmed by
//! centroid distance and capped at `max_clusters` before noise handling.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use hdbscan::{Hdbscan, HdbscanHyperParams};
use qaplus_core::{ClusteringConfig, NoiseHandling};

use crate::error::PipelineError;
use crate::similarity::{centroid, euclidean, l2_normalize};
use crate::types::{Cluster, ClusteringResult, Singleton, NOISE_LABEL};
use crate::vector_store::{EphemeralTable, SpanPayload};

pub struct HdbscanClustering {
    min_cluster_size: usize,
    min_samples: usize,
    max_clusters: usize,
    noise_handling: NoiseHandling,
    allow_single_cluster: bool,
    cluster_selection_epsilon: f64,
    max_member_distance: f64,
}

impl HdbscanClustering {
    #[must_use]
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            min_cluster_size: config.min_cluster_size.max(2),
            min_samples: config.min_samples.max(1),
            max_clusters: config.max_clusters.max(1),
            noise_handling: config.noise_handling,
            allow_single_cluster: config.allow_single_cluster,
            cluster_selection_epsilon: config.cluster_selection_epsilon,
            max_member_distance: config.max_member_distance,
        }
    }

    /// Cluster the rows of a run table. Payloads come back in the same order
    /// as the result's labels.
    ///
    /// # Errors
    ///
    /// Propagates table read errors and [`PipelineError::Clustering`].
    pub async fn cluster_table(
        &self,
        table: &EphemeralTable<'_>,
    ) -> Result<(ClusteringResult, Vec<SpanPayload>), PipelineError> {
        let records = table.get_all_vectors().await?;
        let (vectors, payloads): (Vec<Vec<f32>>, Vec<SpanPayload>) =
            records.into_iter().map(|r| (r.vector, r.payload)).unzip();
        let result = self.cluster(&vectors)?;
        tracing::info!(
            table = table.name(),
            points = vectors.len(),
            clusters = result.clusters.len(),
            noise = result.noise_count,
            "clustered vector table"
        );
        Ok((result, payloads))
    }

    /// Cluster raw vectors. Inputs are L2-normalized first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Clustering`] when vectors differ in length or
    /// the clusterer rejects the data.
    pub fn cluster(&self, vectors: &[Vec<f32>]) -> Result<ClusteringResult, PipelineError> {
        if let Some(first) = vectors.first() {
            if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
                return Err(PipelineError::Clustering(format!(
                    "vectors have inconsistent dimensions ({} vs {})",
                    first.len(),
                    bad.len()
                )));
            }
        }
        let normalized: Vec<Vec<f32>> = vectors.iter().map(|v| l2_normalize(v)).collect();
        let labels = self.fit_labels(&normalized)?;
        Ok(self.assemble(labels, normalized))
    }

    fn fit_labels(&self, points: &[Vec<f32>]) -> Result<Vec<i32>, PipelineError> {
        if points.len() < self.min_cluster_size {
            return Ok(vec![NOISE_LABEL; points.len()]);
        }

        let params = HdbscanHyperParams::builder()
            .min_cluster_size(self.min_cluster_size)
            .min_samples(self.min_samples)
            .allow_single_cluster(self.allow_single_cluster)
            .epsilon(self.cluster_selection_epsilon)
            .build();
        let mut labels = Hdbscan::new(points, params)
            .cluster()
            .map_err(|e| PipelineError::Clustering(e.to_string()))?;

        self.trim_outlying_members(&mut labels, points);
        self.cap_clusters(&mut labels);
        Ok(labels)
    }

    /// Demote members farther than `max_member_distance` from their cluster
    /// centroid. A cluster left below `min_cluster_size` dissolves into noise.
    fn trim_outlying_members(&self, labels: &mut [i32], points: &[Vec<f32>]) {
        let mut demoted = 0usize;
        for members in group_by_label(labels).into_values() {
            let center = l2_normalize(&centroid(members.iter().map(|&i| points[i].as_slice())));
            let kept: BTreeSet<usize> = members
                .iter()
                .copied()
                .filter(|&i| euclidean(&points[i], &center) <= self.max_member_distance)
                .collect();
            let dissolve = kept.len() < self.min_cluster_size;
            for i in members {
                if dissolve || !kept.contains(&i) {
                    labels[i] = NOISE_LABEL;
                    demoted += 1;
                }
            }
        }
        if demoted > 0 {
            tracing::debug!(
                demoted,
                max_member_distance = self.max_member_distance,
                "demoted outlying cluster members to noise"
            );
        }
    }

    /// Keep the `max_clusters` largest clusters, demote the rest to noise,
    /// and renumber the survivors `0..k` in their original order.
    fn cap_clusters(&self, labels: &mut [i32]) {
        let mut by_size: Vec<(i32, usize)> = group_by_label(labels)
            .into_iter()
            .map(|(label, members)| (label, members.len()))
            .collect();
        by_size.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let demoted = by_size.len().saturating_sub(self.max_clusters);
        let kept: BTreeSet<i32> = by_size
            .iter()
            .take(self.max_clusters)
            .map(|(label, _)| *label)
            .collect();
        let remap: HashMap<i32, i32> = kept
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, i32::try_from(new).unwrap_or(i32::MAX)))
            .collect();
        for label in labels.iter_mut() {
            if *label != NOISE_LABEL {
                *label = remap.get(label).copied().unwrap_or(NOISE_LABEL);
            }
        }
        if demoted > 0 {
            tracing::debug!(
                demoted,
                max_clusters = self.max_clusters,
                "demoted smallest clusters to noise"
            );
        }
    }

    fn assemble(&self, labels: Vec<i32>, vectors: Vec<Vec<f32>>) -> ClusteringResult {
        let noise: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == NOISE_LABEL)
            .map(|(index, _)| index)
            .collect();
        let clusters = group_by_label(&labels)
            .into_iter()
            .map(|(id, members)| Cluster {
                id,
                size: members.len(),
                members,
            })
            .collect();
        let singletons = match self.noise_handling {
            NoiseHandling::IncludeAsSingletons => {
                noise.iter().map(|&index| Singleton { index }).collect()
            }
            NoiseHandling::Discard => Vec::new(),
        };
        ClusteringResult {
            labels,
            clusters,
            singletons,
            noise_count: noise.len(),
            vectors,
        }
    }
}

/// Member indices per non-noise label, ascending.
fn group_by_label(labels: &[i32]) -> BTreeMap<i32, Vec<usize>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label != NOISE_LABEL {
            groups.entry(label).or_default().push(index);
        }
    }
    groups
}

#[cfg(test)]
#[path = "clustering_test.rs"]
mod tests;

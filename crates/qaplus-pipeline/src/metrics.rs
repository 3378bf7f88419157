//! Diagnostics for a clustering run, computed on cosine geometry.

use std::collections::BTreeMap;

use crate::similarity::{centroid, cosine_similarity};
use crate::text::round3;
use crate::types::{ClusterMetrics, NOISE_LABEL};

pub struct ClusterQualityMetrics;

impl ClusterQualityMetrics {
    /// Compute quality metrics for `labels` over `vectors`. Noise points only
    /// count toward `noise_percentage`. Ratios are rounded to three decimals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(vectors: &[Vec<f32>], labels: &[i32]) -> ClusterMetrics {
        let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        let mut noise = 0usize;
        for (index, &label) in labels.iter().enumerate().take(vectors.len()) {
            if label == NOISE_LABEL {
                noise += 1;
            } else {
                clusters.entry(label).or_default().push(index);
            }
        }
        let groups: Vec<Vec<usize>> = clusters.into_values().collect();

        let noise_percentage = if labels.is_empty() {
            0.0
        } else {
            round3(noise as f32 / labels.len() as f32 * 100.0)
        };

        ClusterMetrics {
            silhouette_score: silhouette(vectors, &groups).map(round3),
            avg_intra_cluster_cosine_similarity: intra_similarity(vectors, &groups).map(round3),
            avg_inter_cluster_separation: inter_separation(vectors, &groups).map(round3),
            noise_percentage,
            num_clusters: groups.len(),
            num_noise_points: noise,
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[allow(clippy::cast_precision_loss)]
fn mean_distance(vectors: &[Vec<f32>], point: usize, members: &[usize]) -> f32 {
    let others: Vec<f32> = members
        .iter()
        .filter(|&&m| m != point)
        .map(|&m| cosine_distance(&vectors[point], &vectors[m]))
        .collect();
    if others.is_empty() {
        return 0.0;
    }
    others.iter().sum::<f32>() / others.len() as f32
}

/// Mean silhouette over clustered points. Singleton clusters contribute 0.
#[allow(clippy::cast_precision_loss)]
fn silhouette(vectors: &[Vec<f32>], groups: &[Vec<usize>]) -> Option<f32> {
    if groups.iter().filter(|g| g.len() >= 2).count() < 2 {
        return None;
    }
    let mut total = 0.0_f32;
    let mut count = 0usize;
    for (gi, group) in groups.iter().enumerate() {
        for &point in group {
            count += 1;
            if group.len() < 2 {
                continue;
            }
            let a = mean_distance(vectors, point, group);
            let b = groups
                .iter()
                .enumerate()
                .filter(|(gj, _)| *gj != gi)
                .map(|(_, other)| mean_distance(vectors, point, other))
                .fold(f32::INFINITY, f32::min);
            let scale = a.max(b);
            if scale > 0.0 {
                total += (b - a) / scale;
            }
        }
    }
    Some(total / count as f32)
}

#[allow(clippy::cast_precision_loss)]
fn intra_similarity(vectors: &[Vec<f32>], groups: &[Vec<usize>]) -> Option<f32> {
    let per_cluster: Vec<f32> = groups
        .iter()
        .filter(|g| g.len() >= 2)
        .map(|group| {
            let mut sum = 0.0_f32;
            let mut pairs = 0usize;
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    sum += cosine_similarity(&vectors[a], &vectors[b]);
                    pairs += 1;
                }
            }
            sum / pairs as f32
        })
        .collect();
    if per_cluster.is_empty() {
        return None;
    }
    Some(per_cluster.iter().sum::<f32>() / per_cluster.len() as f32)
}

#[allow(clippy::cast_precision_loss)]
fn inter_separation(vectors: &[Vec<f32>], groups: &[Vec<usize>]) -> Option<f32> {
    if groups.len() < 2 {
        return None;
    }
    let centroids: Vec<Vec<f32>> = groups
        .iter()
        .map(|g| centroid(g.iter().map(|&i| vectors[i].as_slice())))
        .collect();
    let mut sum = 0.0_f32;
    let mut pairs = 0usize;
    for (i, a) in centroids.iter().enumerate() {
        for b in &centroids[i + 1..] {
            sum += cosine_distance(a, b);
            pairs += 1;
        }
    }
    Some(sum / pairs as f32)
}

//! Behavior clustering
//!
//! Partitions per-session behaviour vectors into productivity clusters with
//! seeded k-means++ initialisation followed by Lloyd iterations. Cluster ids
//! carry no meaning across refits; [`rank_clusters`] names them by ordering
//! centroids on one feature.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ComputeError;
use crate::types::ClusterAssignment;

/// Session feature names in vector order
pub const SESSION_FEATURES: [&str; 6] = [
    "typing_rhythm",
    "tab_switches",
    "errors",
    "debugging",
    "active_file_duration",
    "idle_time",
];

/// Feature used to rank clusters when none is given
pub const DEFAULT_RANK_FEATURE: usize = 4;

/// Cluster names by rank when `k = 3`
pub const RANK_LABELS: [&str; 3] = ["High Productivity", "Moderate Productivity", "Low Productivity"];

/// Behaviour observed during one coding session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionFeatures {
    pub typing_rhythm: f64,
    pub tab_switches: f64,
    pub errors: f64,
    pub debugging: f64,
    pub active_file_duration: f64,
    pub idle_time: f64,
}

impl SessionFeatures {
    /// Vector in [`SESSION_FEATURES`] order
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.typing_rhythm,
            self.tab_switches,
            self.errors,
            self.debugging,
            self.active_file_duration,
            self.idle_time,
        ]
    }
}

/// k-means settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeans {
    pub k: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            k: 3,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

impl KMeans {
    /// Fit centroids on `vectors`
    pub fn fit(&self, vectors: &[Vec<f64>]) -> Result<ClusterModel, ComputeError> {
        if self.k == 0 {
            return Err(ComputeError::invalid_field("k"));
        }
        if vectors.len() < self.k {
            return Err(ComputeError::InsufficientData {
                required: self.k,
                actual: vectors.len(),
            });
        }
        let dim = validate_vectors(vectors)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus_init(vectors, self.k, &mut rng);
        let mut assignments = vec![usize::MAX; vectors.len()];
        let mut iterations = 0;

        for iteration in 0..self.max_iter {
            let mut changed = false;
            for (i, v) in vectors.iter().enumerate() {
                let nearest = nearest_centroid(&centroids, v).0;
                if assignments[i] != nearest {
                    assignments[i] = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }

            let mut sums = vec![vec![0.0; dim]; self.k];
            let mut counts = vec![0usize; self.k];
            for (v, &cluster) in vectors.iter().zip(&assignments) {
                counts[cluster] += 1;
                for (s, x) in sums[cluster].iter_mut().zip(v) {
                    *s += x;
                }
            }

            let mut max_shift: f64 = 0.0;
            for (c, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
                // An empty cluster keeps its previous centroid
                if count == 0 {
                    continue;
                }
                let updated: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
                max_shift = max_shift.max(squared_distance(&centroids[c], &updated).sqrt());
                centroids[c] = updated;
            }

            iterations = iteration + 1;
            if max_shift < self.tolerance {
                break;
            }
        }

        let model = ClusterModel { centroids };
        let inertia: f64 = vectors.iter().map(|v| nearest_centroid(&model.centroids, v).1).sum();
        info!(k = self.k, iterations, inertia, "fitted session clusters");
        Ok(model)
    }
}

/// Fitted centroids; read-only once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterModel {
    pub centroids: Vec<Vec<f64>>,
}

impl ClusterModel {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn dimension(&self) -> usize {
        self.centroids.first().map(Vec::len).unwrap_or(0)
    }

    /// Nearest centroid for one vector, ties going to the lower id
    pub fn predict(&self, vector: &[f64]) -> Result<usize, ComputeError> {
        if vector.len() != self.dimension() {
            return Err(ComputeError::InputValidation {
                fields: vec![format!(
                    "expected {} features, got {}",
                    self.dimension(),
                    vector.len()
                )],
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(ComputeError::invalid_field("vector"));
        }
        Ok(nearest_centroid(&self.centroids, vector).0)
    }

    /// Assign every vector and attach its cluster's centroid
    pub fn assign(&self, vectors: &[Vec<f64>]) -> Result<Vec<ClusterAssignment>, ComputeError> {
        validate_vectors(vectors)?;
        vectors
            .iter()
            .map(|v| {
                let cluster_id = self.predict(v)?;
                Ok(ClusterAssignment {
                    cluster_id,
                    centroid: self.centroids[cluster_id].clone(),
                })
            })
            .collect()
    }
}

/// Cluster session vectors with the default settings (`k = 3`, fixed seed)
pub fn cluster_sessions(vectors: &[Vec<f64>]) -> Result<Vec<ClusterAssignment>, ComputeError> {
    KMeans::default().fit(vectors)?.assign(vectors)
}

/// Position of one cluster after ordering centroids on a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRank {
    pub cluster_id: usize,
    /// 0 is the best-ranked cluster
    pub rank: usize,
    pub label: String,
    /// Centroid value of the ranking feature
    pub value: f64,
}

/// Name clusters by ordering their centroids on `feature_index`.
///
/// With `descending` the largest centroid value ranks first. Equal values keep
/// cluster id order. Result is indexed by rank.
pub fn rank_clusters(
    model: &ClusterModel,
    feature_index: usize,
    descending: bool,
) -> Result<Vec<ClusterRank>, ComputeError> {
    if feature_index >= model.dimension() {
        return Err(ComputeError::invalid_field(format!(
            "feature_index {feature_index}"
        )));
    }

    let mut order: Vec<(usize, f64)> = model
        .centroids
        .iter()
        .enumerate()
        .map(|(id, c)| (id, c[feature_index]))
        .collect();
    order.sort_by(|a, b| {
        let ord = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
        let ord = if descending { ord.reverse() } else { ord };
        ord.then(a.0.cmp(&b.0))
    });

    let k = model.k();
    Ok(order
        .into_iter()
        .enumerate()
        .map(|(rank, (cluster_id, value))| ClusterRank {
            cluster_id,
            rank,
            label: rank_label(rank, k),
            value,
        })
        .collect())
}

fn rank_label(rank: usize, k: usize) -> String {
    if k == RANK_LABELS.len() {
        RANK_LABELS[rank].to_string()
    } else {
        format!("Cluster rank {}", rank + 1)
    }
}

/// Descriptive statistics of one feature within a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-cluster descriptive statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatistics {
    pub cluster_id: usize,
    pub count: usize,
    pub features: Vec<FeatureSummary>,
}

/// Count, mean, min and max of every feature for each non-empty cluster
pub fn cluster_statistics(
    vectors: &[Vec<f64>],
    assignments: &[ClusterAssignment],
) -> Result<Vec<ClusterStatistics>, ComputeError> {
    if vectors.len() != assignments.len() {
        return Err(ComputeError::InputValidation {
            fields: vec![format!(
                "{} vectors but {} assignments",
                vectors.len(),
                assignments.len()
            )],
        });
    }
    if vectors.is_empty() {
        return Ok(Vec::new());
    }
    let dim = validate_vectors(vectors)?;
    let k = assignments.iter().map(|a| a.cluster_id + 1).max().unwrap_or(0);

    let stats = (0..k)
        .filter_map(|cluster_id| {
            let members: Vec<&Vec<f64>> = vectors
                .iter()
                .zip(assignments)
                .filter(|(_, a)| a.cluster_id == cluster_id)
                .map(|(v, _)| v)
                .collect();
            if members.is_empty() {
                return None;
            }
            let count = members.len();
            let features = (0..dim)
                .map(|j| {
                    let values = members.iter().map(|v| v[j]);
                    let (min, max) = values
                        .clone()
                        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                            (lo.min(x), hi.max(x))
                        });
                    FeatureSummary {
                        feature: feature_name(j, dim),
                        mean: values.sum::<f64>() / count as f64,
                        min,
                        max,
                    }
                })
                .collect();
            Some(ClusterStatistics {
                cluster_id,
                count,
                features,
            })
        })
        .collect();

    Ok(stats)
}

fn feature_name(index: usize, dim: usize) -> String {
    if dim == SESSION_FEATURES.len() {
        SESSION_FEATURES[index].to_string()
    } else {
        format!("feature_{index}")
    }
}

/// Check every vector has the same width and finite values; returns the width
fn validate_vectors(vectors: &[Vec<f64>]) -> Result<usize, ComputeError> {
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    let bad: Vec<String> = vectors
        .iter()
        .enumerate()
        .filter(|(_, v)| v.len() != dim || v.iter().any(|x| !x.is_finite()))
        .map(|(i, _)| format!("vector[{i}]"))
        .collect();
    if dim == 0 && !vectors.is_empty() {
        return Err(ComputeError::invalid_field("vector[0]"));
    }
    if bad.is_empty() {
        Ok(dim)
    } else {
        Err(ComputeError::InputValidation { fields: bad })
    }
}

/// k-means++ seeding: first centroid uniform, the rest sampled with
/// probability proportional to squared distance from the nearest chosen one
fn kmeans_plus_plus_init(vectors: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = vectors.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(vectors[rng.gen_range(0..n)].clone());

    while centroids.len() < k {
        let distances: Vec<f64> = vectors
            .iter()
            .map(|v| nearest_centroid(&centroids, v).1)
            .collect();
        let total: f64 = distances.iter().sum();

        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative > target
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };
        debug!(index = next, "k-means++ picked centroid");
        centroids.push(vectors[next].clone());
    }

    centroids
}

/// Index and squared distance of the closest centroid
fn nearest_centroid(centroids: &[Vec<f64>], v: &[f64]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(j, c)| (j, squared_distance(v, c)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or((0, 0.0))
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn three_groups() -> Vec<Vec<f64>> {
        let mut vectors = Vec::new();
        for (base, offset) in [(0.0, 0.0), (100.0, 0.5), (200.0, 1.0)] {
            for j in 0..4 {
                let jitter = j as f64 * 0.1 + offset;
                vectors.push(vec![base + jitter, base - jitter, base, base, base + 1.0, base]);
            }
        }
        vectors
    }

    #[test]
    fn test_separated_groups_share_ids() {
        let vectors = three_groups();
        let assignments = cluster_sessions(&vectors).unwrap();
        assert_eq!(assignments.len(), 12);

        let ids: Vec<usize> = assignments.iter().map(|a| a.cluster_id).collect();
        for group in ids.chunks(4) {
            assert!(group.iter().all(|&id| id == group[0]));
        }
        assert_ne!(ids[0], ids[4]);
        assert_ne!(ids[4], ids[8]);
        assert_ne!(ids[0], ids[8]);
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let vectors = three_groups();
        let a = cluster_sessions(&vectors).unwrap();
        let b = cluster_sessions(&vectors).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_points_share_cluster() {
        let mut vectors = three_groups();
        vectors.push(vectors[0].clone());
        let assignments = cluster_sessions(&vectors).unwrap();
        assert_eq!(assignments[0].cluster_id, assignments[12].cluster_id);
        assert_eq!(assignments[0].centroid, assignments[12].centroid);
    }

    #[test]
    fn test_too_few_vectors() {
        let vectors = vec![vec![1.0; 6], vec![2.0; 6]];
        assert!(matches!(
            cluster_sessions(&vectors),
            Err(ComputeError::InsufficientData {
                required: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            cluster_sessions(&[]),
            Err(ComputeError::InsufficientData { actual: 0, .. })
        ));
    }

    #[test]
    fn test_ragged_and_nan_vectors_are_named() {
        let vectors = vec![vec![1.0, 2.0], vec![1.0], vec![f64::NAN, 0.0]];
        match cluster_sessions(&vectors) {
            Err(ComputeError::InputValidation { fields }) => {
                assert_eq!(fields, vec!["vector[1]", "vector[2]"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_predict_new_vector() {
        let vectors = three_groups();
        let model = KMeans::default().fit(&vectors).unwrap();
        let near_middle = vec![101.0, 99.0, 100.0, 100.0, 101.0, 100.0];
        let expected = model.predict(&vectors[4]).unwrap();
        assert_eq!(model.predict(&near_middle).unwrap(), expected);
        assert!(model.predict(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rank_clusters_by_feature() {
        let model = ClusterModel {
            centroids: vec![vec![5.0, 1.0], vec![9.0, 1.0], vec![1.0, 1.0]],
        };
        let ranks = rank_clusters(&model, 0, true).unwrap();
        let ids: Vec<usize> = ranks.iter().map(|r| r.cluster_id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert_eq!(ranks[0].label, "High Productivity");
        assert_eq!(ranks[2].label, "Low Productivity");

        // Ties keep cluster id order
        let tied = rank_clusters(&model, 1, false).unwrap();
        assert_eq!(tied.iter().map(|r| r.cluster_id).collect::<Vec<_>>(), vec![0, 1, 2]);

        assert!(rank_clusters(&model, 2, true).is_err());
    }

    #[test]
    fn test_rank_labels_for_other_k() {
        let model = ClusterModel {
            centroids: vec![vec![1.0], vec![2.0]],
        };
        let ranks = rank_clusters(&model, 0, true).unwrap();
        assert_eq!(ranks[0].label, "Cluster rank 1");
        assert_eq!(ranks[0].cluster_id, 1);
    }

    #[test]
    fn test_cluster_statistics() {
        let vectors = vec![vec![1.0, 10.0], vec![3.0, 30.0], vec![7.0, 70.0]];
        let assignments = vec![
            ClusterAssignment {
                cluster_id: 0,
                centroid: vec![2.0, 20.0],
            },
            ClusterAssignment {
                cluster_id: 0,
                centroid: vec![2.0, 20.0],
            },
            ClusterAssignment {
                cluster_id: 2,
                centroid: vec![7.0, 70.0],
            },
        ];
        let stats = cluster_statistics(&vectors, &assignments).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].cluster_id, 0);
        assert_eq!(stats[0].count, 2);
        assert_eq!(
            stats[0].features[1],
            FeatureSummary {
                feature: "feature_1".to_string(),
                mean: 20.0,
                min: 10.0,
                max: 30.0,
            }
        );
        assert_eq!(stats[1].cluster_id, 2);

        assert!(cluster_statistics(&vectors, &assignments[..1]).is_err());
    }

    #[test]
    fn test_session_features_vector_order() {
        let s = SessionFeatures {
            typing_rhythm: 1.0,
            tab_switches: 2.0,
            errors: 3.0,
            debugging: 4.0,
            active_file_duration: 5.0,
            idle_time: 6.0,
        };
        assert_eq!(s.to_vector(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}

//! Latent Dirichlet allocation
//!
//! Batch variational Bayes over a non-negative document-term matrix (TF-IDF
//! rows are accepted as fractional counts). Priors are symmetric with
//! `alpha = eta = 1 / n_topics`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ComputeError;

/// Default number of latent topics
pub const DEFAULT_TOPICS: usize = 3;

/// Default number of EM passes over the corpus
pub const DEFAULT_MAX_ITER: usize = 20;

/// Inner iterations per document in the E-step
const MAX_DOC_UPDATE_ITER: usize = 100;

/// Mean absolute change in a document's topic weights that ends its E-step
const DOC_CONVERGENCE: f64 = 1e-3;

/// Relative change in topic-word weights that ends fitting early
const FIT_CONVERGENCE: f64 = 1e-4;

/// Guard against division by zero in the normaliser
const EPSILON: f64 = 1e-100;

/// Settings for a topic-model fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdaParams {
    pub n_topics: usize,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self {
            n_topics: DEFAULT_TOPICS,
            max_iter: DEFAULT_MAX_ITER,
            seed: 42,
        }
    }
}

/// Fitted topic model: one row of unnormalized topic-word weights per topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentDirichletAllocation {
    components: Vec<Vec<f64>>,
    doc_topic_prior: f64,
    topic_word_prior: f64,
}

impl LatentDirichletAllocation {
    /// Fit on a document-term matrix.
    ///
    /// Requires at least `n_topics` documents.
    pub fn fit(matrix: &[Vec<f64>], params: LdaParams) -> Result<Self, ComputeError> {
        if params.n_topics == 0 {
            return Err(ComputeError::invalid_field("n_topics"));
        }
        if matrix.len() < params.n_topics {
            return Err(ComputeError::InsufficientData {
                required: params.n_topics,
                actual: matrix.len(),
            });
        }
        let n_words = matrix[0].len();
        if n_words == 0 || matrix.iter().any(|row| row.len() != n_words) {
            return Err(ComputeError::invalid_field("matrix"));
        }
        if matrix.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ComputeError::invalid_field("matrix"));
        }

        let prior = 1.0 / params.n_topics as f64;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let components: Vec<Vec<f64>> = (0..params.n_topics)
            .map(|_| (0..n_words).map(|_| rng.gen_range(0.5..1.5)).collect())
            .collect();

        let mut model = Self {
            components,
            doc_topic_prior: prior,
            topic_word_prior: prior,
        };

        for iteration in 0..params.max_iter {
            let exp_elog_beta = model.exp_elog_beta();
            let mut sstats = vec![vec![0.0; n_words]; params.n_topics];
            for row in matrix {
                model.infer_document(row, &exp_elog_beta, Some(&mut sstats));
            }

            let mut change = 0.0;
            let mut total = 0.0;
            for k in 0..params.n_topics {
                for w in 0..n_words {
                    let updated = model.topic_word_prior + sstats[k][w] * exp_elog_beta[k][w];
                    change += (updated - model.components[k][w]).abs();
                    total += updated.abs();
                    model.components[k][w] = updated;
                }
            }

            let relative = if total > 0.0 { change / total } else { 0.0 };
            debug!(iteration, relative_change = relative, "lda em pass");
            if relative < FIT_CONVERGENCE {
                break;
            }
        }

        Ok(model)
    }

    /// Build a model from known topic-word weights
    pub fn from_components(components: Vec<Vec<f64>>) -> Result<Self, ComputeError> {
        let n_topics = components.len();
        if n_topics == 0 {
            return Err(ComputeError::invalid_field("components"));
        }
        let width = components[0].len();
        if width == 0 || components.iter().any(|c| c.len() != width) {
            return Err(ComputeError::invalid_field("components"));
        }
        let prior = 1.0 / n_topics as f64;
        Ok(Self {
            components,
            doc_topic_prior: prior,
            topic_word_prior: prior,
        })
    }

    /// Normalized topic distribution for each document
    pub fn transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ComputeError> {
        let width = self.n_words();
        if matrix.iter().any(|row| row.len() != width) {
            return Err(ComputeError::invalid_field("matrix"));
        }
        let exp_elog_beta = self.exp_elog_beta();
        Ok(matrix
            .iter()
            .map(|row| {
                let gamma = self.infer_document(row, &exp_elog_beta, None);
                let sum: f64 = gamma.iter().sum();
                gamma.iter().map(|g| g / sum).collect()
            })
            .collect())
    }

    pub fn n_topics(&self) -> usize {
        self.components.len()
    }

    pub fn n_words(&self) -> usize {
        self.components.first().map(Vec::len).unwrap_or(0)
    }

    /// Topic-word weights normalized to sum to one per topic
    pub fn topic_word_distribution(&self, topic: usize) -> Option<Vec<f64>> {
        let row = self.components.get(topic)?;
        let sum: f64 = row.iter().sum();
        Some(row.iter().map(|v| v / sum).collect())
    }

    /// Column indices of the `n` heaviest terms of a topic, heaviest first
    pub fn top_term_indices(&self, topic: usize, n: usize) -> Vec<usize> {
        let Some(row) = self.components.get(topic) else {
            return Vec::new();
        };
        let mut indices: Vec<usize> = (0..row.len()).collect();
        indices.sort_by(|&a, &b| {
            row[b]
                .partial_cmp(&row[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        indices.truncate(n);
        indices
    }

    fn exp_elog_beta(&self) -> Vec<Vec<f64>> {
        self.components
            .iter()
            .map(|row| {
                let total = digamma(row.iter().sum());
                row.iter().map(|v| (digamma(*v) - total).exp()).collect()
            })
            .collect()
    }

    /// Variational E-step for a single document. Returns its topic weights
    /// (gamma) and accumulates sufficient statistics when asked to.
    fn infer_document(
        &self,
        row: &[f64],
        exp_elog_beta: &[Vec<f64>],
        sstats: Option<&mut Vec<Vec<f64>>>,
    ) -> Vec<f64> {
        let n_topics = self.n_topics();
        let words: Vec<(usize, f64)> = row
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0.0)
            .map(|(w, c)| (w, *c))
            .collect();

        if words.is_empty() {
            return vec![self.doc_topic_prior; n_topics];
        }

        let mut gamma = vec![1.0; n_topics];
        let mut exp_elog_theta = exp_dirichlet_expectation(&gamma);

        for _ in 0..MAX_DOC_UPDATE_ITER {
            let previous = gamma.clone();
            let phinorm = phi_normalizer(&words, &exp_elog_theta, exp_elog_beta);

            for k in 0..n_topics {
                let dot: f64 = words
                    .iter()
                    .zip(&phinorm)
                    .map(|((w, c), norm)| c / norm * exp_elog_beta[k][*w])
                    .sum();
                gamma[k] = self.doc_topic_prior + exp_elog_theta[k] * dot;
            }
            exp_elog_theta = exp_dirichlet_expectation(&gamma);

            let mean_change = gamma
                .iter()
                .zip(&previous)
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                / n_topics as f64;
            if mean_change < DOC_CONVERGENCE {
                break;
            }
        }

        if let Some(stats) = sstats {
            let phinorm = phi_normalizer(&words, &exp_elog_theta, exp_elog_beta);
            for k in 0..n_topics {
                for ((w, c), norm) in words.iter().zip(&phinorm) {
                    stats[k][*w] += exp_elog_theta[k] * c / norm;
                }
            }
        }

        gamma
    }
}

fn phi_normalizer(
    words: &[(usize, f64)],
    exp_elog_theta: &[f64],
    exp_elog_beta: &[Vec<f64>],
) -> Vec<f64> {
    words
        .iter()
        .map(|(w, _)| {
            exp_elog_theta
                .iter()
                .zip(exp_elog_beta)
                .map(|(theta, beta)| theta * beta[*w])
                .sum::<f64>()
                + EPSILON
        })
        .collect()
}

fn exp_dirichlet_expectation(alpha: &[f64]) -> Vec<f64> {
    let total = digamma(alpha.iter().sum());
    alpha.iter().map(|a| (digamma(*a) - total).exp()).collect()
}

/// Digamma function for positive arguments
pub fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    result + x.ln() - 0.5 * inv
        - inv2
            * (1.0 / 12.0
                - inv2 * (1.0 / 120.0 - inv2 * (1.0 / 252.0 - inv2 * (1.0 / 240.0 - inv2 / 132.0))))
}

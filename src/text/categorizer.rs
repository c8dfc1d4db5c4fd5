//! Error categorization
//!
//! Fits a topic model on a batch of error messages and reports how many
//! messages fall into each labelled category.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::lda::{LatentDirichletAllocation, LdaParams};
use super::preprocess::{clean, clean_corpus};
use super::tfidf::{TfidfVectorizer, DEFAULT_MAX_FEATURES};
use crate::error::ComputeError;
use crate::types::TopicAssignment;

/// Default label per topic index
pub const POSITIONAL_LABELS: [&str; 3] = ["Syntax Errors", "Warnings", "Runtime Problems"];

/// Seed terms describing one category, used to bind a label to a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSeeds {
    pub label: String,
    pub terms: Vec<String>,
}

impl LabelSeeds {
    pub fn new(label: impl Into<String>, terms: &[&str]) -> Self {
        Self {
            label: label.into(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Seed terms for the three default categories
pub fn default_seeds() -> Vec<LabelSeeds> {
    vec![
        LabelSeeds::new(
            POSITIONAL_LABELS[0],
            &[
                "syntax", "unexpected", "token", "parse", "missing", "expected", "semicolon",
                "bracket", "indent",
            ],
        ),
        LabelSeeds::new(
            POSITIONAL_LABELS[1],
            &["warning", "unused", "deprecated", "variable", "import", "lint", "shadow"],
        ),
        LabelSeeds::new(
            POSITIONAL_LABELS[2],
            &[
                "runtime", "exception", "null", "undefined", "overflow", "crash", "timeout",
                "memory", "reference", "pointer",
            ],
        ),
    ]
}

/// Mapping from topic index to category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicLabels {
    labels: Vec<String>,
}

impl TopicLabels {
    /// Topic 0 is "Syntax Errors", 1 "Warnings", 2 "Runtime Problems"
    pub fn positional() -> Self {
        Self::new(POSITIONAL_LABELS.iter().map(|l| l.to_string()).collect())
    }

    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Bind labels to topics by how much weight each topic puts on a label's
    /// seed terms.
    ///
    /// Pairs are taken greedily, highest score first; ties go to the lower
    /// label then the lower topic. Topics left without a label fall back to
    /// `Topic N`. Fails when the model and vectorizer disagree on vocabulary
    /// width.
    pub fn calibrate(
        model: &LatentDirichletAllocation,
        vectorizer: &TfidfVectorizer,
        seeds: &[LabelSeeds],
    ) -> Result<Self, ComputeError> {
        check_vocabulary(model, vectorizer)?;
        let n_topics = model.n_topics();
        let distributions: Vec<Vec<f64>> = (0..n_topics)
            .filter_map(|t| model.topic_word_distribution(t))
            .collect();

        let mut scored = Vec::with_capacity(seeds.len() * n_topics);
        for (label_idx, seed) in seeds.iter().enumerate() {
            let mut columns = Vec::new();
            for term in &seed.terms {
                columns.extend(clean(term)?.iter().filter_map(|t| vectorizer.column_of(t)));
            }
            for (topic, dist) in distributions.iter().enumerate() {
                let score: f64 = columns.iter().map(|&c| dist[c]).sum();
                scored.push((score, label_idx, topic));
            }
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut bound: Vec<Option<String>> = vec![None; n_topics];
        let mut used_labels = vec![false; seeds.len()];
        for (score, label_idx, topic) in scored {
            if used_labels[label_idx] || bound[topic].is_some() {
                continue;
            }
            debug!(label = %seeds[label_idx].label, topic, score, "bound topic label");
            bound[topic] = Some(seeds[label_idx].label.clone());
            used_labels[label_idx] = true;
        }

        Ok(Self::new(
            bound
                .into_iter()
                .enumerate()
                .map(|(topic, label)| label.unwrap_or_else(|| format!("Topic {topic}")))
                .collect(),
        ))
    }

    pub fn label(&self, topic: usize) -> String {
        self.labels
            .get(topic)
            .cloned()
            .unwrap_or_else(|| format!("Topic {topic}"))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// How topic labels are chosen after fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStrategy {
    /// Fixed index-to-label table
    #[default]
    Positional,
    /// Match default seed terms against fitted topics
    Calibrated,
}

/// Settings for a categorization run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizerParams {
    pub max_features: usize,
    pub lda: LdaParams,
    pub labels: LabelStrategy,
}

impl Default for CategorizerParams {
    fn default() -> Self {
        Self {
            max_features: DEFAULT_MAX_FEATURES,
            lda: LdaParams::default(),
            labels: LabelStrategy::Positional,
        }
    }
}

/// Top terms of one fitted topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic: usize,
    pub label: String,
    pub top_terms: Vec<String>,
}

/// Full result of categorizing a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    /// Usable documents after cleaning
    pub documents: usize,
    pub histogram: BTreeMap<String, usize>,
    pub assignments: Vec<TopicAssignment>,
    pub topics: Vec<TopicSummary>,
}

/// Vectorizer, topic model and labels fitted on one corpus
#[derive(Debug, Clone)]
pub struct ErrorCategorizer {
    vectorizer: TfidfVectorizer,
    model: LatentDirichletAllocation,
    labels: TopicLabels,
}

impl ErrorCategorizer {
    /// Fit on an already cleaned corpus
    pub fn fit(corpus: &[Vec<String>], params: &CategorizerParams) -> Result<Self, ComputeError> {
        if corpus.len() < params.lda.n_topics {
            return Err(ComputeError::InsufficientData {
                required: params.lda.n_topics,
                actual: corpus.len(),
            });
        }

        let vectorizer = TfidfVectorizer::fit(corpus, params.max_features)?;
        let matrix = vectorizer.transform(corpus);
        let model = LatentDirichletAllocation::fit(&matrix, params.lda)?;
        let labels = match params.labels {
            LabelStrategy::Positional => TopicLabels::positional(),
            LabelStrategy::Calibrated => {
                TopicLabels::calibrate(&model, &vectorizer, &default_seeds())?
            }
        };

        debug!(
            documents = corpus.len(),
            vocabulary = vectorizer.vocabulary().len(),
            topics = model.n_topics(),
            "fitted error categorizer"
        );

        Self::from_parts(vectorizer, model, labels)
    }

    /// Assemble a categorizer from separately stored parts. The model must
    /// have one column per vocabulary term.
    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        model: LatentDirichletAllocation,
        labels: TopicLabels,
    ) -> Result<Self, ComputeError> {
        check_vocabulary(&model, &vectorizer)?;
        Ok(Self {
            vectorizer,
            model,
            labels,
        })
    }

    /// Assign each document its dominant topic (ties go to the lower index)
    pub fn assign(&self, corpus: &[Vec<String>]) -> Result<Vec<TopicAssignment>, ComputeError> {
        let matrix = self.vectorizer.transform(corpus);
        let theta = self.model.transform(&matrix)?;
        Ok(theta
            .iter()
            .enumerate()
            .map(|(document, dist)| {
                let (topic, weight) = dist.iter().enumerate().fold(
                    (0, f64::NEG_INFINITY),
                    |best, (i, &w)| if w > best.1 { (i, w) } else { best },
                );
                TopicAssignment {
                    document,
                    topic,
                    label: self.labels.label(topic),
                    weight,
                }
            })
            .collect())
    }

    /// The `n` heaviest vocabulary terms of a topic
    pub fn top_terms(&self, topic: usize, n: usize) -> Vec<String> {
        let vocabulary = self.vectorizer.vocabulary();
        self.model
            .top_term_indices(topic, n)
            .into_iter()
            .map(|i| vocabulary[i].clone())
            .collect()
    }

    pub fn labels(&self) -> &TopicLabels {
        &self.labels
    }

    pub fn n_topics(&self) -> usize {
        self.model.n_topics()
    }
}

fn check_vocabulary(
    model: &LatentDirichletAllocation,
    vectorizer: &TfidfVectorizer,
) -> Result<(), ComputeError> {
    let terms = vectorizer.vocabulary().len();
    if model.n_words() == terms {
        Ok(())
    } else {
        Err(ComputeError::InputValidation {
            fields: vec![format!(
                "model has {} term columns, vocabulary has {}",
                model.n_words(),
                terms
            )],
        })
    }
}

/// Count error messages per category.
///
/// Only labels with at least one message appear in the histogram; the counts
/// add up to the number of usable messages.
pub fn categorize_errors<'a, I>(messages: I) -> Result<BTreeMap<String, usize>, ComputeError>
where
    I: IntoIterator<Item = &'a Value>,
{
    categorize_errors_with(messages, &CategorizerParams::default(), 0).map(|r| r.histogram)
}

/// Categorize with explicit settings, also reporting per-message assignments
/// and the top `top_n` terms of every topic
pub fn categorize_errors_with<'a, I>(
    messages: I,
    params: &CategorizerParams,
    top_n: usize,
) -> Result<CategoryReport, ComputeError>
where
    I: IntoIterator<Item = &'a Value>,
{
    let corpus = clean_corpus(messages)?;
    let categorizer = ErrorCategorizer::fit(&corpus, params)?;
    let assignments = categorizer.assign(&corpus)?;

    let mut histogram = BTreeMap::new();
    for a in &assignments {
        *histogram.entry(a.label.clone()).or_insert(0) += 1;
    }

    let topics = (0..categorizer.n_topics())
        .map(|topic| TopicSummary {
            topic,
            label: categorizer.labels().label(topic),
            top_terms: categorizer.top_terms(topic, top_n),
        })
        .collect();

    Ok(CategoryReport {
        documents: corpus.len(),
        histogram,
        assignments,
        topics,
    })
}

//! TF-IDF term weighting
//!
//! Builds a capped vocabulary from the cleaned corpus and turns each document
//! into an L2-normalized term-frequency x inverse-document-frequency row.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Default cap on vocabulary size
pub const DEFAULT_MAX_FEATURES: usize = 1000;

/// Fitted TF-IDF vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    /// Vocabulary terms in column order (alphabetical)
    vocabulary: Vec<String>,
    /// Smoothed inverse document frequency per column
    idf: Vec<f64>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TfidfVectorizer {
    /// Fit vocabulary and idf weights on a tokenized corpus.
    ///
    /// The vocabulary keeps the `max_features` most frequent terms across the
    /// corpus, ties broken alphabetically.
    pub fn fit(documents: &[Vec<String>], max_features: usize) -> Result<Self, ComputeError> {
        if documents.is_empty() {
            return Err(ComputeError::EmptyInput(
                "cannot build a vocabulary from zero documents".to_string(),
            ));
        }
        if max_features == 0 {
            return Err(ComputeError::invalid_field("max_features"));
        }

        let mut term_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in documents {
            let mut seen: Vec<&str> = Vec::new();
            for term in doc {
                *term_counts.entry(term.as_str()).or_insert(0) += 1;
                if !seen.contains(&term.as_str()) {
                    seen.push(term.as_str());
                }
            }
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        if term_counts.is_empty() {
            return Err(ComputeError::EmptyInput(
                "corpus has no terms after cleaning".to_string(),
            ));
        }

        // BTreeMap iteration is alphabetical, so a stable sort by count keeps
        // alphabetical order among ties.
        let mut ranked: Vec<(&str, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(max_features);

        let mut vocabulary: Vec<String> = ranked.iter().map(|(t, _)| t.to_string()).collect();
        vocabulary.sort();

        let n_docs = documents.len() as f64;
        let idf = vocabulary
            .iter()
            .map(|term| {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let mut vectorizer = Self {
            max_features,
            vocabulary,
            idf,
            index: HashMap::new(),
        };
        vectorizer.rebuild_index();
        Ok(vectorizer)
    }

    /// Restore the term lookup after deserialization
    pub fn rebuild_index(&mut self) {
        self.index = self
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
    }

    /// Weight one tokenized document. Out-of-vocabulary terms are ignored; a
    /// document with no known terms yields an all-zero row.
    pub fn transform_one(&self, document: &[String]) -> Vec<f64> {
        let mut row = vec![0.0; self.vocabulary.len()];
        for term in document {
            if let Some(&col) = self.index.get(term) {
                row[col] += 1.0;
            }
        }
        for (value, idf) in row.iter_mut().zip(&self.idf) {
            *value *= idf;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut row {
                *value /= norm;
            }
        }
        row
    }

    pub fn transform(&self, documents: &[Vec<String>]) -> Vec<Vec<f64>> {
        documents.iter().map(|d| self.transform_one(d)).collect()
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn column_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }
}

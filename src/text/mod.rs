//! Error-message topic modelling
//!
//! Messages are cleaned, weighted with TF-IDF, fitted with a three-topic LDA
//! model and counted per category label.

pub mod categorizer;
pub mod lda;
pub mod preprocess;
pub mod tfidf;

pub use categorizer::{
    categorize_errors, categorize_errors_with, default_seeds, CategorizerParams, CategoryReport,
    ErrorCategorizer, LabelSeeds, LabelStrategy, TopicLabels, TopicSummary, POSITIONAL_LABELS,
};
pub use lda::{LatentDirichletAllocation, LdaParams};
pub use preprocess::{clean, clean_corpus};
pub use tfidf::TfidfVectorizer;

//! In-memory knowledge base and lexical relevance scoring.
//!
//! Scoring per document, for every query term longer than two characters
//! (contributor names excluded):
//!
//! 1. `+3` if the term occurs in the lower-cased title
//! 2. `+0.5` per literal occurrence of the term in the lower-cased content
//!
//! The sum is doubled for each contributor named in the query that matches the
//! document, multiplied by `1.5` for each topic keyword in the query whose
//! doc types include the document's, then normalized as `min(raw / 20, 1)`.
//! Raw scores of 20 and above all normalize to `1.0`.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::{
    document::{Contributor, DocType, KnowledgeDocument, ScoredDocument},
    kb_dir::KbDir,
    loader::{self, LoadReport},
};

/// Number of documents returned when the caller does not say.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

const TITLE_MATCH_WEIGHT: f64 = 3.0;
const CONTENT_OCCURRENCE_WEIGHT: f64 = 0.5;
const CONTRIBUTOR_BOOST: f64 = 2.0;
const TOPIC_BOOST: f64 = 1.5;
const NORMALIZATION_DIVISOR: f64 = 20.0;

/// Query terms this short are treated as noise.
const MIN_TERM_LEN: usize = 3;

/// Query keyword and the doc types it boosts.
const TOPIC_BOOSTS: &[(&str, &[DocType])] = &[
    ("feature", &[DocType::FeatureEngineering]),
    ("model", &[DocType::Modeling]),
    ("data", &[DocType::DataExploration]),
    ("imputation", &[DocType::DataCleaning, DocType::ImputationLog]),
    ("pipeline", &[DocType::Methodology]),
    ("log", &[DocType::ImputationLog, DocType::TrainingLog]),
    ("prediction", &[DocType::Predictions]),
];

/// An immutable snapshot of every loaded document.
///
/// Built once, then shared read-only (cheaply clonable). Searches never
/// mutate it, so concurrent queries need no coordination.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    inner: Arc<Snapshot>,
}

#[derive(Debug, Default)]
struct Snapshot {
    documents: Vec<KnowledgeDocument>,
    report: LoadReport,
}

impl KnowledgeBase {
    /// Load all source groups under `kb`. Never fails; see
    /// [`KnowledgeBase::report`] for what was skipped.
    pub fn load(kb: &KbDir) -> Self {
        let (documents, report) = loader::load_documents(kb);
        Self {
            inner: Arc::new(Snapshot { documents, report }),
        }
    }

    /// Build a knowledge base from already constructed documents.
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self {
            inner: Arc::new(Snapshot {
                documents,
                report: LoadReport::default(),
            }),
        }
    }

    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.inner.documents
    }

    pub fn report(&self) -> &LoadReport {
        &self.inner.report
    }

    pub fn get(&self, id: u32) -> Option<&KnowledgeDocument> {
        self.inner.documents.iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.inner.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.documents.is_empty()
    }

    /// Rank documents against `query`.
    ///
    /// Returns at most `limit` documents with a score above zero, best first.
    /// Equal scores keep load order. An empty result means nothing relevant
    /// was found.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredDocument<'_>> {
        let query = ParsedQuery::new(query);

        let mut scored: Vec<ScoredDocument<'_>> = self
            .inner
            .documents
            .iter()
            .map(|document| ScoredDocument {
                document,
                relevance_score: query.score(document),
            })
            .filter(|s| s.relevance_score > 0.0)
            .collect();

        // sort_by is stable, so ties stay in load order.
        scored.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        scored.truncate(limit);
        scored
    }
}

/// A lower-cased query split into scoring terms and boost intents.
#[derive(Debug)]
struct ParsedQuery {
    lowered: String,
    terms: Vec<Term>,
    wants: Vec<Contributor>,
}

#[derive(Debug)]
struct Term {
    text: String,
    /// `None` when the escaped literal is too large to compile.
    pattern: Option<Regex>,
}

impl Term {
    fn new(text: &str) -> Self {
        let pattern = Regex::new(&regex::escape(text))
            .inspect_err(|e| {
                debug!(error = %e, "counting term occurrences without regex")
            })
            .ok();
        Self {
            text: text.to_string(),
            pattern,
        }
    }

    /// Non-overlapping occurrences in already lower-cased `content`.
    fn occurrences(&self, content: &str) -> usize {
        match &self.pattern {
            Some(pattern) => pattern.find_iter(content).count(),
            None => content.matches(self.text.as_str()).count(),
        }
    }
}

impl ParsedQuery {
    fn new(query: &str) -> Self {
        let lowered = query.to_lowercase();

        let wants = Contributor::ALL
            .into_iter()
            .filter(|c| lowered.contains(c.query_token()))
            .collect();

        let terms = lowered
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TERM_LEN)
            .filter(|t| !Contributor::ALL.iter().any(|c| c.query_token() == *t))
            .map(Term::new)
            .collect();

        Self {
            lowered,
            terms,
            wants,
        }
    }

    fn score(&self, document: &KnowledgeDocument) -> f64 {
        let title = document.title.to_lowercase();
        let content = document.content.to_lowercase();

        let mut score = 0.0;
        for term in &self.terms {
            if title.contains(&term.text) {
                score += TITLE_MATCH_WEIGHT;
            }
            let occurrences = term.occurrences(&content);
            score += occurrences as f64 * CONTENT_OCCURRENCE_WEIGHT;
        }

        for contributor in &self.wants {
            if document.contributor == *contributor {
                score *= CONTRIBUTOR_BOOST;
            }
        }

        for (keyword, doc_types) in TOPIC_BOOSTS {
            if self.lowered.contains(keyword)
                && doc_types.contains(&document.doc_type)
            {
                score *= TOPIC_BOOST;
            }
        }

        (score / NORMALIZATION_DIVISOR).min(1.0)
    }
}

//! Knowledge base document records.
//!
//! A [`KnowledgeDocument`] is the unit of retrieval. Documents are built once
//! by the [loader](crate::loader) and never mutated afterwards; a
//! [`ScoredDocument`] is the per-query view produced by
//! [`KnowledgeBase::search`](crate::search::KnowledgeBase::search).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The team member whose work a document represents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Contributor {
    /// Phases 4-7, built on top of Victoria's phases 1-3.
    Maria,
    /// The complete pipeline notebook, its logs and predictions.
    Victoria,
}

impl Contributor {
    pub const ALL: [Contributor; 2] = [Contributor::Maria, Contributor::Victoria];

    pub fn as_str(self) -> &'static str {
        match self {
            Contributor::Maria => "Maria",
            Contributor::Victoria => "Victoria",
        }
    }

    /// Lower-cased name looked for in queries to request this contributor.
    pub fn query_token(self) -> &'static str {
        match self {
            Contributor::Maria => "maria",
            Contributor::Victoria => "victoria",
        }
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Contributor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Contributor::ALL
            .into_iter()
            .find(|c| c.query_token().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown contributor '{s}'"))
    }
}

/// Topic category of a document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Methodology,
    DataExploration,
    Analysis,
    DataCleaning,
    ImputationLog,
    TrainingLog,
    Predictions,
    FeatureEngineering,
    Modeling,
    Setup,
    Summary,
    Documentation,
}

impl DocType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocType::Methodology => "methodology",
            DocType::DataExploration => "data-exploration",
            DocType::Analysis => "analysis",
            DocType::DataCleaning => "data-cleaning",
            DocType::ImputationLog => "imputation-log",
            DocType::TrainingLog => "training-log",
            DocType::Predictions => "predictions",
            DocType::FeatureEngineering => "feature-engineering",
            DocType::Modeling => "modeling",
            DocType::Setup => "setup",
            DocType::Summary => "summary",
            DocType::Documentation => "documentation",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single retrievable document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: u32,
    pub title: String,
    pub content: String,
    pub doc_type: DocType,
    /// File name the document was derived from.
    pub source: String,
    pub contributor: Contributor,
}

/// A document paired with its relevance for one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDocument<'a> {
    pub document: &'a KnowledgeDocument,
    /// Normalized score in `(0, 1]`.
    pub relevance_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_serializes_kebab_case() {
        let json = serde_json::to_string(&DocType::FeatureEngineering).unwrap();
        assert_eq!(json, "\"feature-engineering\"");
        assert_eq!(
            serde_json::to_string(&DocType::ImputationLog).unwrap(),
            format!("\"{}\"", DocType::ImputationLog.as_str())
        );
    }

    #[test]
    fn contributor_parses_case_insensitively() {
        assert_eq!("maria".parse::<Contributor>(), Ok(Contributor::Maria));
        assert_eq!(
            "Victoria".parse::<Contributor>(),
            Ok(Contributor::Victoria)
        );
        assert!("bob".parse::<Contributor>().is_err());
    }

    #[test]
    fn document_serializes_camel_case() {
        let doc = KnowledgeDocument {
            id: 7,
            title: "Training".to_string(),
            content: "body".to_string(),
            doc_type: DocType::TrainingLog,
            source: "model_training_log.txt".to_string(),
            contributor: Contributor::Victoria,
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["docType"], "training-log");
        assert_eq!(value["contributor"], "Victoria");
        assert_eq!(value["id"], 7);
    }
}

//! Turning retrieved documents into an answer.
//!
//! The composer ranks the knowledge base against the question, builds a
//! bounded prompt from the best matches and hands it to a [`Generator`]. When
//! nothing relevant is retrieved the generator is not called at all and a
//! fixed fallback answer is returned.

use std::{collections::BTreeMap, sync::Arc};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    document::{Contributor, DocType, ScoredDocument},
    error::{Error, Result},
    generator::Generator,
    search::{DEFAULT_SEARCH_LIMIT, KnowledgeBase},
    text_util::truncate_chars,
};

/// Characters of each document included in the prompt.
pub const MAX_DOCUMENT_CHARS: usize = 3000;

/// Separator between document blocks in the prompt context.
pub const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Returned when no document matches the question.
pub const FALLBACK_ANSWER: &str = "I don't have specific information about \
    that in the pipeline documentation. Please ask about the data science \
    pipeline, feature engineering, model training, or specific phases of the \
    project.";

/// Used when the generator answers with no text.
pub const EMPTY_ANSWER: &str = "No answer generated.";

/// Static instructions placed before every prompt.
pub const SYSTEM_PROMPT: &str = "\
You are a Data Science Pipeline Assistant for an emissions prediction project.
The documentation below comes from two team members.

VICTORIA is the primary source. She completed the full pipeline (phases 1-7),
including the notebook, the imputation and training logs and the test
predictions. Always lead with Victoria's work.

MARIA is a secondary source. She built an alternative approach to phases 4-7
on top of Victoria's phases 1-3. Mention Maria's work only when it adds
context Victoria's material does not cover, or to compare approaches, for
example: \"Victoria used XGBoost; for comparison, Maria explored CatBoost.\"

Attribution rules:
1. Every fact must say whose work it comes from (\"Victoria's training log
   shows...\"), never a bare claim.
2. Never merge both contributors' findings without saying who did what.
3. Be specific: cite phases, methods, metrics and the source document.

Adapt to the [Expertise Level] given in the question:
- Beginner: plain language, define necessary terms, focus on what and why,
  avoid analogies.
- Intermediate: standard data science terminology, some implementation detail.
- Advanced: precise terminology, hyperparameters, metrics and trade-offs.

Format answers in Markdown: headings for longer answers, bullet or numbered
lists, **bold** key terms and `code` for identifiers.";

/// Optional dashboard state sent along with a question.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct QueryContext {
    /// Entity currently selected in the dashboard.
    pub entity_id: Option<String>,
    /// Active dashboard filters. Accepted but not used for retrieval.
    pub filters: Option<BTreeMap<String, serde_json::Value>>,
    /// Chart currently shown in the dashboard.
    pub chart_type: Option<String>,
}

/// A question for the knowledge base.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryRequest {
    /// The natural-language question.
    pub question: String,
    pub context: Option<QueryContext>,
    /// Reserved.
    pub include_numeric_data: Option<bool>,
}

impl RagQueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }
}

/// A retrieved document cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub doc_id: u32,
    pub title: String,
    pub doc_type: DocType,
    pub relevance_score: f64,
    pub contributor: Contributor,
}

impl From<&ScoredDocument<'_>> for SourceRef {
    fn from(scored: &ScoredDocument<'_>) -> Self {
        Self {
            doc_id: scored.document.id,
            title: scored.document.title.clone(),
            doc_type: scored.document.doc_type,
            relevance_score: scored.relevance_score,
            contributor: scored.document.contributor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

/// Answers questions from a knowledge base through a generator.
#[derive(Clone)]
pub struct AnswerComposer {
    knowledge_base: KnowledgeBase,
    generator: Arc<dyn Generator>,
}

impl AnswerComposer {
    pub fn new(
        knowledge_base: KnowledgeBase,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            knowledge_base,
            generator,
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    /// Retrieve, compose and generate an answer for `request`.
    ///
    /// Generator failures are returned as errors; the knowledge base is not
    /// affected by them.
    pub async fn answer(
        &self,
        request: &RagQueryRequest,
    ) -> Result<RagQueryResponse> {
        if request.question.trim().is_empty() {
            return Err(Error::InvalidRequest("question is empty".into()));
        }

        info!(question = %request.question, "processing query");
        let docs = self
            .knowledge_base
            .search(&request.question, DEFAULT_SEARCH_LIMIT);
        info!(retrieved = docs.len(), "retrieved documents");

        if docs.is_empty() {
            return Ok(RagQueryResponse {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
                tokens_used: Some(0),
            });
        }

        let prompt = compose_prompt(&docs, request);
        debug!(prompt_chars = prompt.chars().count(), "composed prompt");

        let generation = self.generator.generate(&prompt).await?;
        let answer = if generation.text.is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            generation.text
        };

        Ok(RagQueryResponse {
            answer,
            sources: docs.iter().map(SourceRef::from).collect(),
            tokens_used: generation.tokens_used,
        })
    }
}

/// One block per document: a `[contributor - docType] title:` header and the
/// first [`MAX_DOCUMENT_CHARS`] characters of its content.
pub fn build_context_block(docs: &[ScoredDocument<'_>]) -> String {
    docs.iter()
        .map(|scored| {
            let doc = scored.document;
            format!(
                "[{} - {}] {}:\n{}",
                doc.contributor,
                doc.doc_type,
                doc.title,
                truncate_chars(&doc.content, MAX_DOCUMENT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// The question-specific part of the prompt.
pub fn build_user_prompt(
    docs: &[ScoredDocument<'_>],
    request: &RagQueryRequest,
) -> String {
    let mut prompt =
        format!("Context Documents:\n{}\n\n", build_context_block(docs));

    if let Some(context) = &request.context {
        if let Some(entity_id) =
            context.entity_id.as_deref().filter(|s| !s.is_empty())
        {
            prompt.push_str(&format!("Current Entity Context: {entity_id}\n"));
        }
        if let Some(chart_type) =
            context.chart_type.as_deref().filter(|s| !s.is_empty())
        {
            prompt.push_str(&format!("Current Chart: {chart_type}\n"));
        }
    }

    prompt.push_str(&format!(
        "\nUser Question: {}\n\n\
         Answer (be specific and cite the documentation):",
        request.question
    ));
    prompt
}

/// [`SYSTEM_PROMPT`] followed by the user prompt.
pub fn compose_prompt(
    docs: &[ScoredDocument<'_>],
    request: &RagQueryRequest,
) -> String {
    format!("{SYSTEM_PROMPT}\n\n{}", build_user_prompt(docs, request))
}

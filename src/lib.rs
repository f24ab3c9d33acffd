//! pipeline-kb - question answering over the emissions pipeline documentation.
//!
//! The knowledge base is a fixed set of files (Victoria's notebook, logs and
//! predictions, Maria's methodology write-up and supporting analyses) loaded
//! once into memory. Questions are matched against it with a weighted lexical
//! score and the best documents are handed to a language model together with
//! attribution rules for the two contributors.
//!
//! # Quick start
//!
//! ```no_run
//! use pipeline_kb::{KbDir, KnowledgeBase};
//!
//! let kb_dir = KbDir::resolve(None).unwrap();
//! let kb = KnowledgeBase::load(&kb_dir);
//!
//! for r in kb.search("victoria imputation log", 5) {
//!     println!(
//!         "#{} [{:.3}] {} ({})",
//!         r.document.id, r.relevance_score, r.document.title, r.document.contributor
//!     );
//! }
//! ```

pub mod cli;
pub mod composer;
pub mod config;
pub mod document;
pub mod error;
pub mod generator;
pub mod kb_dir;
pub mod loader;
pub mod mcp;
pub mod notebook;
pub mod search;
pub mod text_util;

pub use composer::{AnswerComposer, RagQueryRequest, RagQueryResponse};
pub use document::{Contributor, DocType, KnowledgeDocument, ScoredDocument};
pub use error::{Error, Result};
pub use generator::{GeminiGenerator, Generator};
pub use kb_dir::KbDir;
pub use search::KnowledgeBase;

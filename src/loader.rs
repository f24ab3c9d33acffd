//! Building the document set from the knowledge base directory.
//!
//! Three source groups are read, each from its own subdirectory and each with
//! its own id range so ids never collide without a shared counter. A missing,
//! empty or unparsable source only costs the documents it would have produced:
//! the problem is logged, recorded as a [`LoadDiagnostic`] and loading moves
//! on.

use std::{
    io,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    document::{Contributor, DocType, KnowledgeDocument},
    kb_dir::KbDir,
    notebook::Notebook,
};

/// Number of data rows kept in the predictions summary.
pub const PREDICTION_SAMPLE_ROWS: usize = 10;

const MARIA_PIPELINE: FileSource = FileSource {
    file: "MariasFindingPipeline.md",
    title: "Maria's Pipeline: Phases 4-7 (Built on Victoria's Phase 1-3)",
    doc_type: DocType::Methodology,
};

const VICTORIA_NOTEBOOK: &str = "fitch_codeathon_pipeline.ipynb";

const VICTORIA_LOGS: &[FileSource] = &[
    FileSource {
        file: "knn_sdg_imputation_log.txt",
        title: "Victoria's KNN SDG Imputation Log",
        doc_type: DocType::ImputationLog,
    },
    FileSource {
        file: "model_training_log.txt",
        title: "Victoria's Model Training Log",
        doc_type: DocType::TrainingLog,
    },
];

const VICTORIA_PREDICTIONS: FileSource = FileSource {
    file: "test_predictions.csv",
    title: "Victoria's Test Predictions",
    doc_type: DocType::Predictions,
};

const SUPPORTING_FILES: &[FileSource] = &[
    FileSource {
        file: "dataset_summary.txt",
        title: "Dataset Summary Analysis",
        doc_type: DocType::DataExploration,
    },
    FileSource {
        file: "trend_n_dist_analysis.txt",
        title: "Trend & Distribution Analysis",
        doc_type: DocType::Analysis,
    },
    FileSource {
        file: "outlier_treatment_output.txt",
        title: "Outlier Treatment Output",
        doc_type: DocType::DataCleaning,
    },
    FileSource {
        file: "gb_env_imputation_log.txt",
        title: "GradientBoosting Environmental Imputation Log",
        doc_type: DocType::ImputationLog,
    },
];

/// A file loaded as a single whole-file document.
#[derive(Debug, Clone, Copy)]
struct FileSource {
    file: &'static str,
    title: &'static str,
    doc_type: DocType,
}

/// The three independent source groups, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceGroup {
    Maria,
    Victoria,
    Supporting,
}

impl SourceGroup {
    pub const ALL: [SourceGroup; 3] =
        [SourceGroup::Maria, SourceGroup::Victoria, SourceGroup::Supporting];

    /// First id handed out to documents of this group.
    pub fn id_start(self) -> u32 {
        match self {
            SourceGroup::Maria => 1,
            SourceGroup::Victoria => 1000,
            SourceGroup::Supporting => 2000,
        }
    }

    /// Supporting analyses are part of Victoria's work.
    pub fn contributor(self) -> Contributor {
        match self {
            SourceGroup::Maria => Contributor::Maria,
            SourceGroup::Victoria | SourceGroup::Supporting => {
                Contributor::Victoria
            }
        }
    }

    fn dir(self, kb: &KbDir) -> PathBuf {
        match self {
            SourceGroup::Maria => kb.maria_dir(),
            SourceGroup::Victoria => kb.victoria_dir(),
            SourceGroup::Supporting => kb.supporting_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// The file or group directory does not exist.
    Missing,
    /// The file exists but could not be read.
    Unreadable,
    /// The file was read but could not be parsed.
    Malformed,
    /// The file produced no content.
    Empty,
}

/// A source that contributed fewer documents than expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostic {
    pub group: SourceGroup,
    pub source: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group: SourceGroup,
    pub documents: usize,
}

/// What a load produced, for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub root: PathBuf,
    pub groups: Vec<GroupSummary>,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl LoadReport {
    pub fn documents_in(&self, group: SourceGroup) -> usize {
        self.groups
            .iter()
            .filter(|g| g.group == group)
            .map(|g| g.documents)
            .sum()
    }
}

/// Load every source group under `kb`.
///
/// Documents come back in group order (Maria, Victoria, supporting), and in
/// source order within a group. This never fails: problems are reported in
/// the returned [`LoadReport`].
pub fn load_documents(kb: &KbDir) -> (Vec<KnowledgeDocument>, LoadReport) {
    let mut documents = Vec::new();
    let mut report = LoadReport {
        root: kb.root().to_path_buf(),
        ..LoadReport::default()
    };

    for group in SourceGroup::ALL {
        let mut load = GroupLoad::new(group, group.dir(kb));
        if load.check_dir() {
            match group {
                SourceGroup::Maria => load_maria(&mut load),
                SourceGroup::Victoria => load_victoria(&mut load),
                SourceGroup::Supporting => load_supporting(&mut load),
            }
        }

        info!(
            group = ?group,
            documents = load.documents.len(),
            skipped = load.diagnostics.len(),
            "loaded source group"
        );
        report.groups.push(GroupSummary {
            group,
            documents: load.documents.len(),
        });
        report.diagnostics.append(&mut load.diagnostics);
        documents.append(&mut load.documents);
    }

    info!(
        total = documents.len(),
        maria = count_for(&documents, Contributor::Maria),
        victoria = count_for(&documents, Contributor::Victoria),
        "knowledge base loaded"
    );

    (documents, report)
}

fn count_for(documents: &[KnowledgeDocument], contributor: Contributor) -> usize {
    documents
        .iter()
        .filter(|d| d.contributor == contributor)
        .count()
}

fn load_maria(load: &mut GroupLoad) {
    load.load_whole_files(&[MARIA_PIPELINE]);
}

fn load_victoria(load: &mut GroupLoad) {
    if let Some(raw) = load.read(VICTORIA_NOTEBOOK) {
        match Notebook::parse(&raw) {
            Ok(notebook) => {
                let sections = notebook.sections();
                if sections.is_empty() {
                    load.diagnose(
                        VICTORIA_NOTEBOOK,
                        DiagnosticKind::Empty,
                        "notebook has no headed markdown sections".into(),
                    );
                }
                for section in sections {
                    load.push(
                        format!("Victoria's Notebook: {}", section.title),
                        section.content,
                        section.doc_type,
                        VICTORIA_NOTEBOOK,
                    );
                }
            }
            Err(e) => load.diagnose(
                VICTORIA_NOTEBOOK,
                DiagnosticKind::Malformed,
                e.to_string(),
            ),
        }
    }

    load.load_whole_files(VICTORIA_LOGS);

    let predictions = VICTORIA_PREDICTIONS;
    if let Some(csv) = load.read(predictions.file) {
        load.push(
            predictions.title.to_string(),
            summarize_predictions(&csv),
            predictions.doc_type,
            predictions.file,
        );
    }
}

fn load_supporting(load: &mut GroupLoad) {
    load.load_whole_files(SUPPORTING_FILES);
}

/// Condense the predictions CSV into a short text document.
///
/// Keeps the header line and the first [`PREDICTION_SAMPLE_ROWS`] data lines
/// verbatim, and states the total number of data rows in the whole file.
/// Rows are not validated; ragged lines are kept as they are. The total is
/// the number of `\n`-separated lines minus the header, so a trailing newline
/// counts as one more row.
///
/// # Examples
///
/// ```
/// use pipeline_kb::loader::summarize_predictions;
///
/// let summary = summarize_predictions("id,scope_1\na,1.0\nb,2.0");
/// assert!(summary.contains("Header: id,scope_1"));
/// assert!(summary.contains("Total predictions: 2 rows"));
/// ```
pub fn summarize_predictions(csv: &str) -> String {
    let lines: Vec<&str> = csv.split('\n').collect();
    let header = lines[0];
    let sample = lines
        .iter()
        .skip(1)
        .take(PREDICTION_SAMPLE_ROWS)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    let total = lines.len().saturating_sub(1);

    format!(
        "Victoria's Test Predictions (CSV)\n\n\
         Header: {header}\n\n\
         Sample Data (first {PREDICTION_SAMPLE_ROWS} rows):\n{sample}\n\n\
         Total predictions: {total} rows"
    )
}

/// Per-group loading state: id allocation, documents and diagnostics.
struct GroupLoad {
    group: SourceGroup,
    dir: PathBuf,
    next_id: u32,
    documents: Vec<KnowledgeDocument>,
    diagnostics: Vec<LoadDiagnostic>,
}

impl GroupLoad {
    fn new(group: SourceGroup, dir: PathBuf) -> Self {
        Self {
            group,
            dir,
            next_id: group.id_start(),
            documents: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Returns false (and records why) when the group directory is unusable.
    fn check_dir(&mut self) -> bool {
        let source = self.dir.display().to_string();
        match std::fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => true,
            Ok(_) => {
                self.diagnose(
                    &source,
                    DiagnosticKind::Unreadable,
                    "not a directory".into(),
                );
                false
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.diagnose(
                    &source,
                    DiagnosticKind::Missing,
                    "group directory not found".into(),
                );
                false
            }
            Err(e) => {
                self.diagnose(&source, DiagnosticKind::Unreadable, e.to_string());
                false
            }
        }
    }

    fn read(&mut self, file: &str) -> Option<String> {
        let result = read_source(&self.dir.join(file));
        self.accept(file, result)
    }

    fn accept(
        &mut self,
        file: &str,
        result: Result<String, (DiagnosticKind, String)>,
    ) -> Option<String> {
        match result {
            Ok(text) => Some(text),
            Err((kind, message)) => {
                self.diagnose(file, kind, message);
                None
            }
        }
    }

    /// Read the files in parallel, then add them in the given order.
    fn load_whole_files(&mut self, sources: &[FileSource]) {
        let dir = &self.dir;
        let loaded: Vec<_> = sources
            .par_iter()
            .map(|source| (source, read_source(&dir.join(source.file))))
            .collect();

        for (source, result) in loaded {
            if let Some(content) = self.accept(source.file, result) {
                self.push(
                    source.title.to_string(),
                    content,
                    source.doc_type,
                    source.file,
                );
            }
        }
    }

    fn push(
        &mut self,
        title: String,
        content: String,
        doc_type: DocType,
        source: &str,
    ) {
        let id = self.next_id;
        self.next_id += 1;
        self.documents.push(KnowledgeDocument {
            id,
            title,
            content,
            doc_type,
            source: source.to_string(),
            contributor: self.group.contributor(),
        });
    }

    fn diagnose(&mut self, source: &str, kind: DiagnosticKind, message: String) {
        warn!(
            group = ?self.group,
            source,
            ?kind,
            "skipping source: {message}"
        );
        self.diagnostics.push(LoadDiagnostic {
            group: self.group,
            source: source.to_string(),
            kind,
            message,
        });
    }
}

fn read_source(path: &Path) -> Result<String, (DiagnosticKind, String)> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => {
            Err((DiagnosticKind::Empty, "file is empty".into()))
        }
        Ok(text) => Ok(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err((DiagnosticKind::Missing, "file not found".into()))
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Err((DiagnosticKind::Malformed, e.to_string()))
        }
        Err(e) => Err((DiagnosticKind::Unreadable, e.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const NOTEBOOK: &str = r###"{
        "cells": [
            {"cell_type": "markdown", "source": ["# Phase 1: Data Familiarization\n", "Load the raw data"]},
            {"cell_type": "code", "source": ["import pandas as pd"]},
            {"cell_type": "markdown", "source": "The training set has 429 rows"},
            {"cell_type": "markdown", "source": "## Phase 6: Model Training"},
            {"cell_type": "markdown", "source": "XGBoost reached an RMSE of 0.394"}
        ]
    }"###;

    /// Write a complete knowledge base under `root`.
    pub(crate) fn write_fixture(root: &Path) {
        let maria = root.join("maria");
        let victoria = root.join("victoria");
        let supporting = root.join("supporting");
        for dir in [&maria, &victoria, &supporting] {
            std::fs::create_dir_all(dir).unwrap();
        }

        std::fs::write(
            maria.join("MariasFindingPipeline.md"),
            "# Maria's Pipeline\n\nCatBoost model with target encoding.",
        )
        .unwrap();

        std::fs::write(victoria.join(VICTORIA_NOTEBOOK), NOTEBOOK).unwrap();
        std::fs::write(
            victoria.join("knn_sdg_imputation_log.txt"),
            "KNN imputation filled 37 missing SDG values",
        )
        .unwrap();
        std::fs::write(
            victoria.join("model_training_log.txt"),
            "epoch 1 rmse 0.51\nepoch 2 rmse 0.39",
        )
        .unwrap();
        std::fs::write(victoria.join("test_predictions.csv"), csv_with_rows(3))
            .unwrap();

        for source in SUPPORTING_FILES {
            std::fs::write(
                supporting.join(source.file),
                format!("{} contents", source.title),
            )
            .unwrap();
        }
    }

    fn csv_with_rows(rows: usize) -> String {
        let mut lines = vec!["entity_id,scope_1,scope_2".to_string()];
        for i in 1..=rows {
            lines.push(format!("E{i},{i}.0,{}.5", i * 2));
        }
        lines.join("\n")
    }

    #[test]
    fn loads_all_groups_in_order_with_id_ranges() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());

        let (docs, report) = load_documents(&KbDir::new(tmp.path()));

        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        // 1 methodology + 2 notebook sections + 2 logs + predictions + 4
        assert_eq!(docs.len(), 10);

        assert_eq!(docs[0].id, 1);
        assert_eq!(docs[0].contributor, Contributor::Maria);
        assert_eq!(docs[0].doc_type, DocType::Methodology);

        let ids: Vec<u32> = docs.iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![1, 1000, 1001, 1002, 1003, 1004, 2000, 2001, 2002, 2003]
        );

        assert_eq!(
            docs[1].title,
            "Victoria's Notebook: Phase 1: Data Familiarization"
        );
        assert_eq!(docs[1].doc_type, DocType::DataExploration);
        assert!(docs[1].content.contains("429 rows"));
        assert!(!docs[1].content.contains("import pandas"));
        assert_eq!(docs[2].doc_type, DocType::Modeling);
        assert_eq!(docs[3].doc_type, DocType::ImputationLog);
        assert_eq!(docs[4].doc_type, DocType::TrainingLog);
        assert_eq!(docs[5].doc_type, DocType::Predictions);
        assert_eq!(docs[5].source, "test_predictions.csv");

        for doc in &docs[1..] {
            assert_eq!(doc.contributor, Contributor::Victoria);
        }
        assert_eq!(report.documents_in(SourceGroup::Victoria), 5);
        assert_eq!(report.documents_in(SourceGroup::Supporting), 4);
    }

    #[test]
    fn missing_group_directory_keeps_other_groups() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        std::fs::remove_dir_all(tmp.path().join("victoria")).unwrap();

        let (docs, report) = load_documents(&KbDir::new(tmp.path()));

        assert_eq!(docs.len(), 5);
        assert_eq!(report.documents_in(SourceGroup::Victoria), 0);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].group, SourceGroup::Victoria);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Missing);
    }

    #[test]
    fn missing_root_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (docs, report) =
            load_documents(&KbDir::new(tmp.path().join("absent")));

        assert!(docs.is_empty());
        assert_eq!(report.diagnostics.len(), 3);
    }

    #[test]
    fn malformed_notebook_skips_only_the_notebook() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        std::fs::write(
            tmp.path().join("victoria").join(VICTORIA_NOTEBOOK),
            "{ \"cells\": [",
        )
        .unwrap();

        let (docs, report) = load_documents(&KbDir::new(tmp.path()));

        assert_eq!(report.documents_in(SourceGroup::Victoria), 3);
        assert_eq!(docs[1].id, 1000);
        assert_eq!(docs[1].doc_type, DocType::ImputationLog);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Malformed);
        assert_eq!(report.diagnostics[0].source, VICTORIA_NOTEBOOK);
    }

    #[test]
    fn missing_and_empty_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let supporting = tmp.path().join("supporting");
        std::fs::remove_file(supporting.join("dataset_summary.txt")).unwrap();
        std::fs::write(supporting.join("trend_n_dist_analysis.txt"), "  \n")
            .unwrap();

        let (docs, report) = load_documents(&KbDir::new(tmp.path()));

        let supporting_docs: Vec<_> =
            docs.iter().filter(|d| d.id >= 2000).collect();
        assert_eq!(supporting_docs.len(), 2);
        assert_eq!(supporting_docs[0].id, 2000);
        assert_eq!(supporting_docs[0].title, "Outlier Treatment Output");
        assert!(docs.iter().all(|d| !d.content.trim().is_empty()));

        let kinds: Vec<_> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Missing, DiagnosticKind::Empty]);
    }

    #[test]
    fn predictions_summary_keeps_ten_rows_and_true_total() {
        let csv = csv_with_rows(14);
        let summary = summarize_predictions(&csv);

        assert!(summary.contains("Header: entity_id,scope_1,scope_2"));
        for i in 1..=10 {
            assert!(summary.contains(&format!("E{i},{i}.0,")), "row {i}");
        }
        for i in 11..=14 {
            assert!(!summary.contains(&format!("E{i},")), "row {i}");
        }
        assert!(summary.ends_with("Total predictions: 14 rows"));
    }

    #[test]
    fn predictions_summary_counts_trailing_newline_as_a_row() {
        let csv = format!("{}\n", csv_with_rows(14));
        let summary = summarize_predictions(&csv);
        assert!(summary.ends_with("Total predictions: 15 rows"));
    }

    #[test]
    fn notebook_fixture_has_both_sections() {
        let notebook = Notebook::parse(NOTEBOOK).unwrap();
        let titles: Vec<_> =
            notebook.sections().into_iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            vec!["Phase 1: Data Familiarization", "Phase 6: Model Training"]
        );
    }

    #[test]
    fn ids_are_unique() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());

        let (docs, _) = load_documents(&KbDir::new(tmp.path()));
        let mut ids: Vec<u32> = docs.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), docs.len());
    }
}

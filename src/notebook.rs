//! Splitting a Jupyter notebook export into titled, classified sections.
//!
//! Only markdown cells carry retrievable prose. A markdown cell starting with
//! `# ` or `## ` opens a new section; every following markdown cell up to the
//! next heading is appended to it. Prose that appears before the first heading
//! has no section to land in and is dropped.

use serde::Deserialize;

use crate::{document::DocType, error::Result};

/// Separator placed between the fragments of one section.
const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Title keywords, checked in order. The first rule with a matching keyword
/// decides the section's type; titles matching nothing are documentation.
const SECTION_RULES: &[(DocType, &[&str])] = &[
    (DocType::DataExploration, &["data familiarization", "dataset summary"]),
    (DocType::Analysis, &["distribution", "trend"]),
    (DocType::DataCleaning, &["outlier", "missing", "imputation"]),
    (
        DocType::FeatureEngineering,
        &["feature engineering", "feature extraction"],
    ),
    (DocType::Modeling, &["model", "training", "prediction"]),
    (DocType::Setup, &["setup", "import"]),
    (DocType::Summary, &["summary", "conclusion"]),
];

/// The subset of the `.ipynb` format needed to recover narrative cells.
#[derive(Debug, Default, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
pub struct Cell {
    pub cell_type: CellKind,
    #[serde(default)]
    pub source: CellSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Markdown,
    Code,
    Raw,
    #[serde(other)]
    Other,
}

/// Cell text is stored either as one string or as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    pub fn text(&self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Text(text) => text.clone(),
        }
    }
}

impl Notebook {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Text of every markdown cell, in notebook order.
    pub fn markdown_cells(&self) -> Vec<String> {
        self.cells
            .iter()
            .filter(|cell| cell.cell_type == CellKind::Markdown)
            .map(|cell| cell.source.text())
            .collect()
    }

    pub fn sections(&self) -> Vec<Section> {
        split_sections(self.markdown_cells())
    }
}

/// A titled run of markdown cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
    pub doc_type: DocType,
}

struct OpenSection {
    title: String,
    fragments: Vec<String>,
}

impl OpenSection {
    fn finish(self) -> Option<Section> {
        if self.fragments.is_empty() {
            return None;
        }
        let doc_type = categorize_section(&self.title);
        Some(Section {
            content: self.fragments.join(FRAGMENT_SEPARATOR),
            title: self.title,
            doc_type,
        })
    }
}

/// Whether a cell opens a new section (level-1 or level-2 heading).
pub fn is_heading(text: &str) -> bool {
    text.starts_with("# ") || text.starts_with("## ")
}

/// First line of a heading cell with the `#` markers removed.
fn heading_title(text: &str) -> String {
    text.trim_start_matches('#')
        .trim_start()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Group markdown cell texts into sections.
///
/// # Examples
///
/// ```
/// use pipeline_kb::notebook::split_sections;
///
/// let sections = split_sections(["# Setup", "Install the tools"]);
/// assert_eq!(sections.len(), 1);
/// assert_eq!(sections[0].title, "Setup");
/// assert_eq!(sections[0].content, "# Setup\n\nInstall the tools");
/// ```
pub fn split_sections<I, S>(cells: I) -> Vec<Section>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut sections = Vec::new();
    let mut current: Option<OpenSection> = None;

    for cell in cells {
        let text: String = cell.into();
        if is_heading(&text) {
            if let Some(section) = current.take().and_then(OpenSection::finish)
            {
                sections.push(section);
            }
            current = Some(OpenSection {
                title: heading_title(&text),
                fragments: vec![text],
            });
        } else if let Some(open) = current.as_mut() {
            open.fragments.push(text);
        }
    }

    if let Some(section) = current.and_then(OpenSection::finish) {
        sections.push(section);
    }

    sections
}

/// Classify a section by keywords in its title.
pub fn categorize_section(title: &str) -> DocType {
    let lower = title.to_lowercase();
    SECTION_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or(DocType::Documentation, |(doc_type, _)| *doc_type)
}

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Location of the knowledge base source files.
///
/// The root holds one subdirectory per source group. Nothing here is created
/// or written: a missing root simply yields an empty load.
#[derive(Debug, Clone)]
pub struct KbDir {
    root: PathBuf,
}

impl KbDir {
    /// Resolve the knowledge base root from, in order of priority:
    /// 1. An explicit path (from --kb-dir)
    /// 2. The PIPELINE_KB_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/pipeline-kb/knowledge-base/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("PIPELINE_KB_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("pipeline-kb")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
                .join("knowledge-base")
        };

        if root.exists() && !root.is_dir() {
            return Err(Error::KnowledgeDir(root));
        }

        Ok(Self { root })
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maria's methodology write-up.
    pub fn maria_dir(&self) -> PathBuf {
        self.root.join("maria")
    }

    /// Victoria's notebook, logs and predictions.
    pub fn victoria_dir(&self) -> PathBuf {
        self.root.join("victoria")
    }

    /// Supporting analysis outputs.
    pub fn supporting_dir(&self) -> PathBuf {
        self.root.join("supporting")
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Configuration for the notebook reader.
///
/// Read once from `[preprocessor.ipynb]` before the first document is
/// processed and handed to [`NotebookReader::new`](crate::reader::NotebookReader::new);
/// it is never mutated after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Word count past which the summary is cut at the next closed block
    pub summary_max_length: usize,

    /// Name of the syntect theme used for code cell highlighting
    pub highlight_theme: String,

    /// If true, embed image outputs as data URLs instead of saving to files
    pub embed_images: bool,

    /// Where image outputs are written when they are not embedded
    pub assets_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            summary_max_length: 50,
            highlight_theme: "InspiredGitHub".to_string(),
            embed_images: true,
            assets_dir: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.summary_max_length == 0 {
            return Err(Error::InvalidSettings(
                "summary-max-length must be a positive integer".to_string(),
            ));
        }
        if !self.embed_images && self.assets_dir.is_none() {
            return Err(Error::InvalidSettings(
                "assets-dir is required when embed-images is false".to_string(),
            ));
        }
        Ok(())
    }
}

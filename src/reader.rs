//! Reads notebook documents into `(body, metadata)` pairs.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::converter::{Converter, ImageMode};
use crate::error::{Error, Result};
use crate::highlight::Highlighter;
use crate::metadata::{
    parse_metadata_text, Metadata, MetadataNormalizer, MetadataValue, StandardNormalizer, NOTEBOOK_FLAG_KEY,
    SUMMARY_KEY,
};
use crate::notebook::Notebook;
use crate::settings::Settings;
use crate::style::build_styles;
use crate::summary::scan;

/// Extension of sidecar metadata files
pub const METADATA_EXTENSION: &str = "ipynb-meta";

/// A reader the host registers for one or more file extensions.
pub trait ContentReader {
    /// Extensions (without the dot) this reader handles
    fn file_extensions(&self) -> &[&str];

    /// Read the document at `path` into an HTML body and its metadata.
    fn read(&self, path: &Path) -> Result<(String, Metadata)>;

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.file_extensions().contains(&ext))
    }
}

/// Reader for Jupyter notebooks.
///
/// Settings are fixed at construction; each [`read`](ContentReader::read)
/// works on its own buffers and shares nothing with other documents.
pub struct NotebookReader {
    settings: Settings,
    highlighter: Highlighter,
    normalizer: Box<dyn MetadataNormalizer>,
}

impl NotebookReader {
    /// Build a reader with the standard metadata normalizer.
    ///
    /// Fails if the settings are invalid or the highlight theme is not
    /// available.
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_normalizer(settings, Box::new(StandardNormalizer))
    }

    pub fn with_normalizer(settings: Settings, normalizer: Box<dyn MetadataNormalizer>) -> Result<Self> {
        settings.validate()?;
        let highlighter = Highlighter::new(&settings.highlight_theme)?;
        Ok(NotebookReader {
            settings,
            highlighter,
            normalizer,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn image_mode(&self) -> ImageMode {
        match (&self.settings.assets_dir, self.settings.embed_images) {
            (Some(dir), false) => ImageMode::Files(dir.clone()),
            _ => ImageMode::Embed,
        }
    }

    /// Metadata from the sidecar file when one exists, otherwise from the
    /// notebook's own metadata block. The two are never merged.
    pub fn read_metadata(&self, path: &Path) -> Result<Metadata> {
        let sidecar = sidecar_path(path);
        if sidecar.is_file() {
            debug!(path = %sidecar.display(), "reading sidecar metadata");
            let text = fs::read_to_string(&sidecar).map_err(|e| Error::io(&sidecar, e))?;
            let pairs = parse_metadata_text(&text)?;
            return Metadata::from_pairs(
                pairs.into_iter().map(|(key, value)| (key, Value::String(value))),
                self.normalizer.as_ref(),
            );
        }

        let notebook = Notebook::load(path)?;
        let mut metadata = Metadata::from_pairs(notebook.metadata, self.normalizer.as_ref())?;
        metadata.insert(NOTEBOOK_FLAG_KEY, MetadataValue::Bool(true));
        Ok(metadata)
    }
}

impl ContentReader for NotebookReader {
    fn file_extensions(&self) -> &[&str] {
        &["ipynb"]
    }

    fn read(&self, path: &Path) -> Result<(String, Metadata)> {
        let mut metadata = self.read_metadata(path)?;

        let fragment = Converter::new(&self.highlighter, self.image_mode()).convert_file(path)?;
        let document = format!("<body>{}</body>", fragment.html);
        let scanned = scan(&document, self.settings.summary_max_length);

        match scanned.summary {
            Some(summary) => {
                metadata.insert(SUMMARY_KEY, MetadataValue::Text(summary));
            }
            None => {
                debug!(path = %path.display(), "no summary captured");
                metadata.remove(SUMMARY_KEY);
            }
        }

        let body = build_styles(fragment.inlined_css.as_slice()) + &scanned.body;
        Ok((body, metadata))
    }
}

/// `dir/name.ipynb-meta` for `dir/name.ipynb`, where `name` is the file
/// name up to its first dot.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let base = file_name.split('.').next().unwrap_or_default();
    path.with_file_name(format!("{base}.{METADATA_EXTENSION}"))
}

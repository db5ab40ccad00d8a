pub mod cli;
pub mod converter;
pub mod error;
pub mod highlight;
pub mod markup;
pub mod metadata;
pub mod notebook;
pub mod reader;
pub mod settings;
pub mod style;
pub mod summary;

use mdbook::book::{Book, BookItem};
use mdbook::errors::Error;
use mdbook::preprocess::{Preprocessor, PreprocessorContext};
use tracing::{debug, error, info};

pub use crate::metadata::{Metadata, MetadataValue};
pub use crate::reader::{ContentReader, NotebookReader};
pub use crate::settings::Settings;

/// Notebook reader for mdbook
pub struct IpynbPreprocessor;

impl IpynbPreprocessor {
    pub fn new() -> Self {
        IpynbPreprocessor
    }

    /// Reader settings from `[preprocessor.ipynb]`, with the image directory
    /// defaulting to the html build's assets folder.
    pub fn settings(&self, ctx: &PreprocessorContext) -> Result<Settings, Error> {
        let key = format!("preprocessor.{}", self.name());
        let mut settings: Settings = ctx.config.get_deserialized_opt(&key)?.unwrap_or_default();

        settings.assets_dir = Some(match settings.assets_dir.take() {
            Some(dir) => ctx.root.join(dir),
            None => ctx.root.join(&ctx.config.build.build_dir).join("html/assets"),
        });

        Ok(settings)
    }
}

impl Default for IpynbPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor for IpynbPreprocessor {
    fn name(&self) -> &str {
        "ipynb"
    }

    fn run(&self, ctx: &PreprocessorContext, mut book: Book) -> Result<Book, Error> {
        info!("Running notebook reader");
        // a reader that cannot be built fails the whole run
        let reader = NotebookReader::new(self.settings(ctx)?)?;
        let src_dir = ctx.root.join(&ctx.config.book.src);

        book.for_each_mut(|item| {
            let BookItem::Chapter(chapter) = item else {
                return;
            };
            let Some(path) = chapter.path.clone() else {
                return;
            };
            if !reader.handles(&path) {
                return;
            }

            match reader.read(&src_dir.join(&path)) {
                Ok((body, metadata)) => {
                    if let Some(title) = metadata.text("title") {
                        chapter.name = title.to_string();
                    }
                    debug!(
                        path = %path.display(),
                        summary = metadata.text(crate::metadata::SUMMARY_KEY).unwrap_or_default(),
                        "read notebook"
                    );
                    chapter.content = body;
                }
                Err(e) => {
                    // one broken notebook must not take the rest of the book down
                    error!("Error reading notebook '{}': {}", path.display(), e);

                    chapter.content = format!(
                        "<!-- mdbook-ipynb: read error -->\n\n> **Notebook could not be read**: `{}`\n\n```\n{}\n```\n",
                        path.display(),
                        e
                    );
                }
            }
        });

        Ok(book)
    }

    fn supports_renderer(&self, renderer: &str) -> bool {
        renderer == "html" || renderer == "markdown"
    }
}

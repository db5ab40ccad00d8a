use anyhow::{anyhow, Context};
use mdbook::preprocess::Preprocessor;
use semver::{Version, VersionReq};
use std::fs;
use std::path::Path;
use tracing::warn;

const PREPROCESSOR_TABLE: &str = "[preprocessor.ipynb]";

/// Handle the install command to add preprocessor config to book.toml
pub fn handle_install() -> anyhow::Result<()> {
    let book_dir = std::env::current_dir()?;
    if install_into(&book_dir)? {
        println!("Added {} to book.toml", PREPROCESSOR_TABLE);
    } else {
        println!("{} already exists in book.toml", PREPROCESSOR_TABLE);
    }
    Ok(())
}

/// Append the preprocessor table to `book_dir/book.toml`.
/// Returns false if it was already there.
pub fn install_into(book_dir: &Path) -> anyhow::Result<bool> {
    let config_path = book_dir.join("book.toml");

    if !config_path.exists() {
        return Err(anyhow!(
            "book.toml not found in {}. \
             Make sure you are in the root of your mdbook project.",
            book_dir.display()
        ));
    }

    let mut config_str = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    if config_str.contains(PREPROCESSOR_TABLE) {
        return Ok(false);
    }

    config_str.push_str(&format!("\n{}\nsummary-max-length = 50\n", PREPROCESSOR_TABLE));
    fs::write(&config_path, config_str)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(true)
}

/// Check version compatibility with mdbook. A mismatch only warns.
pub fn check_version_compatibility(mdbook_version: &str) -> anyhow::Result<()> {
    let version_req = VersionReq::parse(&format!("^{}", mdbook::MDBOOK_VERSION))
        .context("MDBOOK_VERSION is not a valid version requirement")?;
    let version = Version::parse(mdbook_version)
        .with_context(|| format!("mdbook reported an invalid version '{}'", mdbook_version))?;

    if !version_req.matches(&version) {
        warn!(
            "The ipynb preprocessor was built against mdbook version {}, \
             but we're being called from version {}",
            mdbook::MDBOOK_VERSION,
            mdbook_version
        );
    }

    Ok(())
}

/// Handle the supports command
pub fn handle_supports<P: Preprocessor>(preprocessor: &P, renderer: &str) -> bool {
    preprocessor.supports_renderer(renderer)
}

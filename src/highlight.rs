//! Syntax highlighting for code cells.
//!
//! Classes are emitted with the `highlight-ipynb-` prefix so the stylesheet
//! generated here cannot collide with the host theme's own highlighting
//! rules, and highlighted blocks are wrapped as
//! `<div class="highlight-ipynb"><pre class="ipynb">...</pre></div>`.

use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::error::{Error, Result};

/// CSS class on the wrapper `div` of every highlighted block
pub const HIGHLIGHT_CLASS: &str = "highlight-ipynb";

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed {
    prefix: "highlight-ipynb-",
};

pub struct Highlighter {
    syntaxes: SyntaxSet,
    stylesheet: String,
}

impl Highlighter {
    /// Load the bundled syntaxes and the stylesheet for `theme`.
    ///
    /// Fails when the theme is not bundled, so a misconfigured reader is
    /// rejected before any document is read.
    pub fn new(theme: &str) -> Result<Self> {
        let themes = ThemeSet::load_defaults();
        let theme_def = themes
            .themes
            .get(theme)
            .ok_or_else(|| Error::MissingTheme(theme.to_string()))?;
        let stylesheet = css_for_theme_with_class_style(theme_def, CLASS_STYLE)?;

        Ok(Highlighter {
            syntaxes: SyntaxSet::load_defaults_newlines(),
            stylesheet,
        })
    }

    /// Stylesheet for the highlight classes, as generated from the theme
    pub fn stylesheet(&self) -> &str {
        &self.stylesheet
    }

    pub fn highlight(&self, source: &str, language: &str) -> Result<String> {
        let syntax = self
            .syntaxes
            .find_syntax_by_token(syntax_token(language))
            .ok_or_else(|| Error::UnknownLanguage(language.to_string()))?;

        let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &self.syntaxes, CLASS_STYLE);
        for line in LinesWithEndings::from(source) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }

        Ok(format!(
            "<div class=\"{}\"><pre class=\"ipynb\">{}</pre></div>",
            HIGHLIGHT_CLASS,
            generator.finalize()
        ))
    }
}

/// Map kernel language names to syntect tokens.
fn syntax_token(language: &str) -> &str {
    match language {
        "ipython" | "ipython2" | "ipython3" | "python2" | "python3" => "python",
        "bash" | "sh" | "shell" => "bash",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highlights_python_with_prefixed_classes() {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let html = highlighter.highlight("print(1)\n", "ipython3").unwrap();

        assert!(html.starts_with("<div class=\"highlight-ipynb\"><pre class=\"ipynb\">"));
        assert!(html.ends_with("</pre></div>"));
        assert!(html.contains("class=\"highlight-ipynb-"));
        assert!(html.contains("print"));
    }

    #[test]
    fn stylesheet_uses_the_prefix() {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        assert!(highlighter.stylesheet().contains(".highlight-ipynb-"));
    }

    #[test]
    fn unknown_theme_fails_fast() {
        let err = Highlighter::new("no-such-theme").err().unwrap();
        assert!(matches!(err, Error::MissingTheme(_)));
    }

    #[test]
    fn unknown_language_is_an_error() {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let err = highlighter.highlight("+++", "brainfudge").unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
    }

    #[test]
    fn source_is_escaped() {
        let highlighter = Highlighter::new("InspiredGitHub").unwrap();
        let html = highlighter.highlight("a < b\n", "python").unwrap();
        assert!(html.contains("&lt;"));
    }
}

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pulldown_cmark::{html, Options, Parser};
use serde_json::{Map, Value};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::highlight::Highlighter;
use crate::markup::escape_html;
use crate::notebook::{value_to_text, Cell, Notebook, Output};

/// Base layout rules for rendered notebooks, one rule per line
pub const NOTEBOOK_CSS: &str = r#".rendered_html { color: #000; font-size: 100%; }
.rendered_html h1 { font-size: 185.7%; margin: 1.08em 0 0 0; font-weight: bold; line-height: 1.0; }
h1 { font-size: 2em; margin: 0.67em 0; }
h2 { font-size: 1.5em; }
p { margin: 0 0 10px; }
a { color: #337ab7; text-decoration: none; }
ul, ol { margin-top: 0; margin-bottom: 10px; }
@media (max-width: 540px) { div.input_prompt, div.output_prompt { display: none; } }
div.cell { border: 1px solid transparent; display: flex; flex-direction: column; align-items: stretch; padding: 5px; margin: 0; width: 100%; }
div.input { page-break-inside: avoid; display: flex; flex-direction: row; align-items: stretch; }
div.prompt { min-width: 14ex; padding: 0.4em; margin: 0; font-family: monospace; text-align: right; line-height: 1.21429em; }
div.input_prompt { color: #303f9f; border-top: 1px solid transparent; }
div.output_prompt { color: #d84315; }
div.inner_cell { min-width: 0; display: flex; flex-direction: column; align-items: stretch; flex: 1; }
div.input_area { border: 1px solid #cfcfcf; border-radius: 2px; background: #f7f7f7; line-height: 1.21429em; }
div.output_wrapper { position: relative; display: flex; flex-direction: column; align-items: stretch; }
div.output_area { padding: 0; page-break-inside: avoid; display: flex; flex-direction: row; align-items: stretch; }
div.output_area pre { margin: 0; padding: 1px 0; border: 0; vertical-align: baseline; color: black; background-color: transparent; border-radius: 0; }
div.output_subarea { overflow-x: auto; padding: 0.4em; flex: 1; max-width: calc(100% - 14ex); }
div.output_area img, div.output_area svg { max-width: 100%; height: auto; }
div.text_cell_render { outline: none; resize: none; width: inherit; border-style: none; padding: 0.5em 0.5em 0.5em 0.4em; box-sizing: border-box; }
.ansi-red-fg { color: #e75c58; }
.ansi-green-fg { color: #00a250; }"#;

/// HTML produced from a notebook, with the stylesheets that accompany it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFragment {
    pub html: String,
    /// Stylesheets to inline ahead of the body, in order
    pub inlined_css: Vec<String>,
}

/// Where image outputs end up
#[derive(Debug, Clone)]
pub enum ImageMode {
    /// Embed as base64 data URLs
    Embed,
    /// Decode and write into the directory, referencing them by file name
    Files(PathBuf),
}

pub struct Converter<'a> {
    highlighter: &'a Highlighter,
    images: ImageMode,
}

impl<'a> Converter<'a> {
    pub fn new(highlighter: &'a Highlighter, images: ImageMode) -> Self {
        Converter { highlighter, images }
    }

    /// Converts the notebook at `path` to an HTML fragment
    pub fn convert_file(&self, path: &Path) -> Result<ConvertedFragment> {
        let notebook = Notebook::load(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "notebook".to_string());
        self.convert(notebook, &stem)
    }

    /// Converts a parsed notebook. `stem` prefixes the names of written image files.
    pub fn convert(&self, notebook: Notebook, stem: &str) -> Result<ConvertedFragment> {
        let language = notebook.language().to_string();

        if let ImageMode::Files(dir) = &self.images {
            create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }

        let mut out = String::new();
        let mut images = ImageWriter {
            mode: &self.images,
            stem,
            counter: 0,
        };

        for cell in notebook.cells.into_iter() {
            self.render_cell(&mut out, cell, &language, &mut images)?;
        }
        debug!(cells_html = out.len(), images = images.counter, "converted notebook");

        Ok(ConvertedFragment {
            html: out,
            inlined_css: vec![NOTEBOOK_CSS.to_string(), self.highlighter.stylesheet().to_string()],
        })
    }

    fn render_cell(&self, out: &mut String, cell: Cell, language: &str, images: &mut ImageWriter) -> Result<()> {
        match cell {
            Cell::Markdown { source, .. } => {
                out.push_str("<div class=\"text_cell_render border-box-sizing rendered_html\">\n");
                out.push_str(&markdown_to_html(&source.into_string()));
                out.push_str("</div>\n");
            }
            Cell::Code { source, outputs, execution_count, .. } => {
                let count = execution_count.map(|n| n.to_string()).unwrap_or_else(|| "&nbsp;".to_string());
                out.push_str("<div class=\"cell border-box-sizing code_cell rendered\">\n");
                out.push_str("<div class=\"input\">\n");
                out.push_str(&format!("<div class=\"prompt input_prompt\">In&nbsp;[{count}]:</div>\n"));
                out.push_str("<div class=\"inner_cell\">\n<div class=\"input_area\">\n");
                out.push_str(&self.highlighter.highlight(&source.into_string(), language)?);
                out.push_str("\n</div>\n</div>\n</div>\n");

                if !outputs.is_empty() {
                    out.push_str("<div class=\"output_wrapper\">\n<div class=\"output\">\n");
                    for output in outputs.into_iter() {
                        render_output(out, output, images)?;
                    }
                    out.push_str("</div>\n</div>\n");
                }
                out.push_str("</div>\n");
            }
            Cell::Raw { source, metadata } => {
                let mimetype = metadata
                    .get("raw_mimetype")
                    .or_else(|| metadata.get("format"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if mimetype.is_empty() || mimetype.eq_ignore_ascii_case("text/html") {
                    out.push_str(&source.into_string());
                    out.push('\n');
                }
            }
        }

        Ok(())
    }
}

fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn render_output(out: &mut String, output: Output, images: &mut ImageWriter) -> Result<()> {
    out.push_str("<div class=\"output_area\">\n");
    match output {
        Output::Stream { name, text } => {
            let name = name.unwrap_or_else(|| "stdout".to_string());
            out.push_str("<div class=\"prompt\"></div>\n");
            out.push_str(&format!(
                "<div class=\"output_subarea output_stream output_{} output_text\">\n<pre>{}</pre>\n</div>\n",
                escape_html(&name),
                escape_html(&text.into_string())
            ));
        }
        Output::ExecuteResult { data, execution_count, .. } => {
            let count = execution_count.map(|n| n.to_string()).unwrap_or_default();
            out.push_str(&format!("<div class=\"prompt output_prompt\">Out[{count}]:</div>\n"));
            render_mime_bundle(out, &data, "output_execute_result", images)?;
        }
        Output::DisplayData { data, .. } => {
            out.push_str("<div class=\"prompt\"></div>\n");
            render_mime_bundle(out, &data, "", images)?;
        }
        Output::Error { ename, evalue, traceback } => {
            let traceback = strip_ansi(&traceback.into_lines());
            let text = if traceback.is_empty() { format!("{ename}: {evalue}") } else { traceback };
            out.push_str("<div class=\"prompt\"></div>\n");
            out.push_str(&format!(
                "<div class=\"output_subarea output_text output_error\">\n<pre>\n{}\n</pre>\n</div>\n",
                escape_html(&text)
            ));
        }
    }
    out.push_str("</div>\n");

    Ok(())
}

fn render_mime_bundle(out: &mut String, data: &Map<String, Value>, extra_class: &str, images: &mut ImageWriter) -> Result<()> {
    let text = |mime: &str| data.get(mime).and_then(value_to_text);
    let subarea = |kind: &str| {
        let mut class = format!("output_{kind} output_subarea");
        if !extra_class.is_empty() {
            class.push(' ');
            class.push_str(extra_class);
        }
        class
    };

    if let Some(html) = text("text/html") {
        out.push_str(&format!("<div class=\"{}\">\n{}\n</div>\n", subarea("html rendered_html"), html));
    } else if let Some(svg) = text("image/svg+xml") {
        out.push_str(&format!("<div class=\"{}\">\n{}\n</div>\n", subarea("svg"), svg));
    } else if let Some(png) = text("image/png") {
        let src = images.source(&png, "png")?;
        out.push_str(&format!("<div class=\"{}\">\n<img src=\"{}\">\n</div>\n", subarea("png"), src));
    } else if let Some(jpeg) = text("image/jpeg") {
        let src = images.source(&jpeg, "jpeg")?;
        out.push_str(&format!("<div class=\"{}\">\n<img src=\"{}\">\n</div>\n", subarea("jpeg"), src));
    } else if let Some(md) = text("text/markdown") {
        out.push_str(&format!("<div class=\"{}\">\n{}</div>\n", subarea("markdown rendered_html"), markdown_to_html(&md)));
    } else if let Some(latex) = text("text/latex") {
        out.push_str(&format!("<div class=\"{}\">\n{}\n</div>\n", subarea("latex"), escape_html(&latex)));
    } else if let Some(plain) = text("text/plain") {
        out.push_str(&format!("<div class=\"{}\">\n<pre>{}</pre>\n</div>\n", subarea("text"), escape_html(&plain)));
    }

    Ok(())
}

struct ImageWriter<'a> {
    mode: &'a ImageMode,
    stem: &'a str,
    counter: u32,
}

impl ImageWriter<'_> {
    /// `src` attribute value for a base64 image of the given subtype
    fn source(&mut self, b64: &str, subtype: &str) -> Result<String> {
        // notebooks wrap long base64 payloads across lines
        let b64: String = b64.split_whitespace().collect();
        match self.mode {
            ImageMode::Embed => Ok(format!("data:image/{subtype};base64,{b64}")),
            ImageMode::Files(dir) => {
                let decoded = STANDARD.decode(&b64)?;
                let ext = if subtype == "jpeg" { "jpg" } else { subtype };
                let filename = format!("{}_output_{:03}.{}", self.stem, self.counter, ext);
                let out_path = dir.join(&filename);
                fs::write(&out_path, &decoded).map_err(|e| Error::io(&out_path, e))?;
                self.counter += 1;

                match dir.file_name().map(|s| s.to_string_lossy()) {
                    Some(dirname) => Ok(format!("{}/{}", dirname, filename)),
                    None => Ok(filename),
                }
            }
        }
    }
}

/// Remove ANSI color escapes, which tracebacks are full of.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            // parameters and intermediates run up to the final byte
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notebook(value: Value) -> Notebook {
        Notebook::from_json(Path::new("t.ipynb"), &value.to_string()).unwrap()
    }

    fn highlighter() -> Highlighter {
        Highlighter::new("InspiredGitHub").unwrap()
    }

    #[test]
    fn markdown_cells_have_no_cell_marker() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [{"cell_type": "markdown", "metadata": {}, "source": "Hello *world*"}]}));
        let fragment = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap();
        assert_eq!(
            fragment.html,
            "<div class=\"text_cell_render border-box-sizing rendered_html\">\n<p>Hello <em>world</em></p>\n</div>\n"
        );
    }

    #[test]
    fn code_cells_are_highlighted_and_wrapped() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 3, "source": "print(1)",
            "outputs": [
                {"output_type": "stream", "name": "stdout", "text": "1\n"},
                {"output_type": "execute_result", "execution_count": 3, "metadata": {}, "data": {"text/plain": "2 < 3"}}
            ]
        }]}));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;

        assert!(html.starts_with("<div class=\"cell border-box-sizing code_cell rendered\">"));
        assert!(html.contains("In&nbsp;[3]:"));
        assert!(html.contains("<pre class=\"ipynb\">"));
        assert!(html.contains("output_stream output_stdout"));
        assert!(html.contains("Out[3]:"));
        assert!(html.contains("<pre>2 &lt; 3</pre>"));
    }

    #[test]
    fn html_output_wins_over_plain_text() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 1, "source": "df",
            "outputs": [{"output_type": "display_data", "metadata": {},
                "data": {"text/plain": "plain", "text/html": ["<table class=\"dataframe\">", "</table>"]}}]
        }]}));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;
        assert!(html.contains("<table class=\"dataframe\"></table>"));
        assert!(!html.contains("plain</pre>"));
    }

    #[test]
    fn images_embed_as_data_urls() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 1, "source": "plot()",
            "outputs": [{"output_type": "display_data", "metadata": {}, "data": {"image/png": "iVBORw0KGgo=\n"}}]
        }]}));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;
        assert!(html.contains("<img src=\"data:image/png;base64,iVBORw0KGgo=\">"));
    }

    #[test]
    fn images_written_to_assets_dir() {
        let hl = highlighter();
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 1, "source": "plot()",
            "outputs": [{"output_type": "display_data", "metadata": {}, "data": {"image/png": "aGVsbG8="}}]
        }]}));
        let html = Converter::new(&hl, ImageMode::Files(assets.clone())).convert(nb, "demo").unwrap().html;

        assert!(html.contains("<img src=\"assets/demo_output_000.png\">"));
        assert_eq!(fs::read(assets.join("demo_output_000.png")).unwrap(), b"hello");
    }

    #[test]
    fn invalid_base64_fails_when_writing_files() {
        let hl = highlighter();
        let dir = tempfile::tempdir().unwrap();
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 1, "source": "plot()",
            "outputs": [{"output_type": "display_data", "metadata": {}, "data": {"image/png": "!!not base64!!"}}]
        }]}));
        let err = Converter::new(&hl, ImageMode::Files(dir.path().to_path_buf())).convert(nb, "t").unwrap_err();
        assert!(matches!(err, Error::InvalidImage(_)));
    }

    #[test]
    fn tracebacks_lose_ansi_codes() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [{
            "cell_type": "code", "metadata": {}, "execution_count": 1, "source": "1/0",
            "outputs": [{"output_type": "error", "ename": "ZeroDivisionError", "evalue": "division by zero",
                "traceback": ["\u{1b}[0;31mZeroDivisionError\u{1b}[0m", "division by zero"]}]
        }]}));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;
        assert!(html.contains("<pre>\nZeroDivisionError\ndivision by zero\n</pre>"));
    }

    #[test]
    fn raw_cells_follow_their_mimetype() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": [
            {"cell_type": "raw", "metadata": {}, "source": "<b>kept</b>"},
            {"cell_type": "raw", "metadata": {"raw_mimetype": "text/latex"}, "source": "\\dropped"}
        ]}));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;
        assert_eq!(html, "<b>kept</b>\n");
    }

    #[test]
    fn unsupported_language_fails_loudly() {
        let hl = highlighter();
        let nb = notebook(json!({
            "metadata": {"language_info": {"name": "brainfudge"}},
            "cells": [{"cell_type": "code", "metadata": {}, "execution_count": 1, "source": "+++", "outputs": []}]
        }));
        let err = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
    }

    #[test]
    fn prose_only_notebook_needs_no_syntax() {
        let hl = highlighter();
        let nb = notebook(json!({
            "metadata": {"language_info": {"name": "julia"}},
            "cells": [{"cell_type": "markdown", "metadata": {}, "source": "Just prose"}]
        }));
        let html = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap().html;
        assert!(html.contains("<p>Just prose</p>"));
    }

    #[test]
    fn inlines_base_and_highlight_styles() {
        let hl = highlighter();
        let nb = notebook(json!({"cells": []}));
        let fragment = Converter::new(&hl, ImageMode::Embed).convert(nb, "t").unwrap();
        assert_eq!(fragment.inlined_css.len(), 2);
        assert_eq!(fragment.inlined_css[0], NOTEBOOK_CSS);
        assert_eq!(fragment.inlined_css[1], hl.stylesheet());
    }

    #[test]
    fn strip_ansi_keeps_plain_text() {
        assert_eq!(strip_ansi("\u{1b}[1;32mok\u{1b}[0m done"), "ok done");
    }
}

//! nbformat 4 data model.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub nbformat: Option<u32>,
    #[serde(default)]
    pub nbformat_minor: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "cell_type")]
pub enum Cell {
    #[serde(rename = "markdown")]
    Markdown {
        source: MultilineString,
        #[serde(default)]
        metadata: Map<String, Value>,
    },

    #[serde(rename = "code")]
    Code {
        source: MultilineString,
        #[serde(default)]
        outputs: Vec<Output>,
        execution_count: Option<u32>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },

    #[serde(rename = "raw")]
    Raw {
        source: MultilineString,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
}

/// MultilineString captures the fact that many fields in nbformat
/// may be a single string or an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MultilineString {
    Single(String),
    Multi(Vec<String>),
}

impl MultilineString {
    pub fn into_string(self) -> String {
        match self {
            MultilineString::Single(s) => s,
            MultilineString::Multi(v) => v.join(""),
        }
    }

    /// Joins list entries as separate lines. Tracebacks are stored one line
    /// per entry without trailing newlines.
    pub fn into_lines(self) -> String {
        match self {
            MultilineString::Single(s) => s,
            MultilineString::Multi(v) => v.join("\n"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "output_type")]
pub enum Output {
    #[serde(rename = "stream")]
    Stream { name: Option<String>, text: MultilineString },

    #[serde(rename = "display_data")]
    DisplayData { data: Map<String, Value>, metadata: Option<Value> },

    #[serde(rename = "execute_result")]
    ExecuteResult { data: Map<String, Value>, metadata: Option<Value>, execution_count: Option<u32> },

    #[serde(rename = "error")]
    Error { ename: String, evalue: String, traceback: MultilineString },
}

impl Notebook {
    /// Parse the notebook at `path`. The file handle is closed before returning.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(path, &text)
    }

    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::MalformedNotebook {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Programming language of the code cells, as declared by the kernel.
    pub fn language(&self) -> &str {
        self.metadata
            .get("language_info")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .or_else(|| {
                self.metadata
                    .get("kernelspec")
                    .and_then(|spec| spec.get("language"))
                    .and_then(Value::as_str)
            })
            .unwrap_or("python")
    }
}

/// Flatten a mime bundle entry into text; values may be strings or arrays of strings.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(arr) => {
            let mut out = String::new();
            for v in arr.iter() {
                if let Some(s) = value_to_text(v) {
                    out.push_str(&s);
                }
            }
            Some(out)
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => serde_json::to_string(o).ok(),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<Notebook> {
        Notebook::from_json(Path::new("test.ipynb"), &value.to_string())
    }

    #[test]
    fn parses_cells_of_every_kind() {
        let nb = parse(json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {"Title": "Demo"},
            "cells": [
                {"cell_type": "markdown", "metadata": {}, "source": ["# Hi\n", "there"]},
                {"cell_type": "code", "metadata": {}, "execution_count": 1, "source": "print(1)",
                 "outputs": [{"output_type": "stream", "name": "stdout", "text": ["1\n"]}]},
                {"cell_type": "raw", "metadata": {}, "source": "<b>raw</b>"}
            ]
        }))
        .unwrap();

        assert_eq!(nb.cells.len(), 3);
        assert_eq!(nb.nbformat, Some(4));
        assert_eq!(nb.metadata["Title"], "Demo");
        match &nb.cells[1] {
            Cell::Code { outputs, execution_count, .. } => {
                assert_eq!(*execution_count, Some(1));
                assert!(matches!(outputs[0], Output::Stream { .. }));
            }
            other => panic!("expected code cell, got {other:?}"),
        }
    }

    #[test]
    fn missing_cells_is_malformed() {
        let err = parse(json!({"metadata": {}})).unwrap_err();
        assert!(matches!(err, Error::MalformedNotebook { .. }));
    }

    #[test]
    fn language_prefers_language_info_then_kernelspec() {
        let nb = parse(json!({
            "cells": [],
            "metadata": {"kernelspec": {"language": "R"}, "language_info": {"name": "julia"}}
        }))
        .unwrap();
        assert_eq!(nb.language(), "julia");

        let nb = parse(json!({"cells": [], "metadata": {"kernelspec": {"language": "R"}}})).unwrap();
        assert_eq!(nb.language(), "R");

        let nb = parse(json!({"cells": []})).unwrap();
        assert_eq!(nb.language(), "python");
    }

    #[test]
    fn multiline_strings_join() {
        let lines = MultilineString::Multi(vec!["a".into(), "b".into()]);
        assert_eq!(lines.into_lines(), "a\nb");
        let text = MultilineString::Multi(vec!["a\n".into(), "b".into()]);
        assert_eq!(text.into_string(), "a\nb");
    }
}

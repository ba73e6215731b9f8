//! Builders for JSON action graphs and response files.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use std::fs;

/// MSVC compiler path used by the fixtures.
pub const CL: &str = r"C:\VS\VC\bin\amd64\cl.exe";
/// MSVC linker path used by the fixtures.
pub const LINK: &str = r"C:\VS\VC\bin\amd64\link.exe";

/// Accumulates actions and renders the JSON document the binary loads.
#[derive(Debug, Default, Clone)]
pub struct ActionsBuilder {
    actions: Vec<Value>,
}

impl ActionsBuilder {
    /// Start an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action and return its index.
    pub fn push(
        &mut self,
        kind: &str,
        executable: &str,
        arguments: &str,
        prerequisites: &[(&str, Option<usize>)],
    ) -> usize {
        let prereqs: Vec<Value> = prerequisites
            .iter()
            .map(|(path, producer)| json!({ "path": path, "producer": producer }))
            .collect();
        self.actions.push(json!({
            "kind": kind,
            "executable": executable,
            "arguments": arguments,
            "prerequisites": prereqs,
            "remote": true,
        }));
        self.actions.len() - 1
    }

    /// Append an MSVC compile of `source` into `object`.
    pub fn compile(&mut self, source: &str, object: &str) -> usize {
        self.push("compile", CL, &format!(r#"/c /nologo /Fo"{object}" "{source}""#), &[])
    }

    /// Append an MSVC link of `inputs` into `output`.
    pub fn link(&mut self, output: &str, inputs: &[(&str, Option<usize>)]) -> usize {
        let mut args = format!(r#"/NOLOGO /OUT:"{output}""#);
        for (path, _) in inputs {
            args.push_str(&format!(r#" "{path}""#));
        }
        self.push("link", LINK, &args, inputs)
    }

    /// Render the `{ "actions": [...] }` document.
    #[must_use]
    pub fn to_json(&self) -> String {
        json!({ "actions": self.actions }).to_string()
    }

    /// Write the document to `dir/actions.json`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write(&self, dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let path = dir.join("actions.json");
        fs::write(&path, self.to_json()).with_context(|| format!("write {path}"))?;
        Ok(path)
    }
}

/// Write a response file with one entry per line, creating parents.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_response_file(path: &Utf8Path, lines: &[&str]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {parent}"))?;
    }
    let mut content = lines.join("\r\n");
    content.push_str("\r\n");
    fs::write(path, content).with_context(|| format!("write {path}"))
}

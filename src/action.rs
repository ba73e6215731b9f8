//! Input model: the already-computed action graph handed to kumiki.
//!
//! Actions are immutable once loaded. Prerequisites refer to their producing
//! action by position in the owning [`ActionGraph`], so the graph can be
//! serialised as a flat JSON list.
//!
//! # Examples
//!
//! ```
//! use kumiki::action::{ActionGraph, ActionKind};
//!
//! let json = r#"{ "actions": [
//!     { "kind": "compile", "executable": "cl.exe", "arguments": "a.cpp" }
//! ] }"#;
//! let graph = ActionGraph::from_json(json).expect("parse");
//! assert_eq!(graph.actions[0].kind, ActionKind::Compile);
//! ```

use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of an action inside its [`ActionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Classification tag assigned by the upstream build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Translates one source file into an object file.
    Compile,
    /// Links or archives artefacts into a library or executable.
    Link,
    /// Anything else (code generators, copies, stamps).
    Other,
}

/// A file an action consumes, optionally produced by another action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Absolute or build-relative path of the consumed file.
    pub path: Utf8PathBuf,
    /// Action producing the file, when it is built during this invocation.
    #[serde(default)]
    pub producer: Option<ActionId>,
}

/// One compiler, linker or tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAction {
    /// Upstream classification tag.
    pub kind: ActionKind,
    /// Executable path exactly as the upstream system recorded it.
    pub executable: String,
    /// Full argument string, quoting preserved.
    pub arguments: String,
    /// Files consumed by this action, in upstream order.
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    /// Whether the action may run on a remote worker.
    #[serde(default = "default_remote")]
    pub remote: bool,
}

const fn default_remote() -> bool {
    true
}

impl RawAction {
    /// Create an action with no prerequisites that may run remotely.
    #[must_use]
    pub fn new(kind: ActionKind, executable: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            kind,
            executable: executable.into(),
            arguments: arguments.into(),
            prerequisites: Vec::new(),
            remote: true,
        }
    }

    /// Append a prerequisite file and return the action.
    #[must_use]
    pub fn with_prerequisite(mut self, path: impl Into<Utf8PathBuf>, producer: Option<ActionId>) -> Self {
        self.prerequisites.push(Prerequisite {
            path: path.into(),
            producer,
        });
        self
    }

    /// Iterate over the producers of this action's prerequisites.
    pub fn producers(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.prerequisites.iter().filter_map(|p| p.producer)
    }
}

/// Errors raised while loading an action graph document.
#[derive(Debug, Error)]
pub enum ActionGraphError {
    /// The document is not valid JSON or does not match the schema.
    #[error("invalid action graph document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A prerequisite names a producer outside the action list.
    #[error("action {action} names unknown producer {producer}")]
    UnknownProducer {
        /// Action holding the dangling reference.
        action: ActionId,
        /// Producer index that does not exist.
        producer: ActionId,
    },
}

/// All actions of one build invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionGraph {
    /// Actions in upstream order; [`ActionId`]s index this list.
    pub actions: Vec<RawAction>,
}

impl ActionGraph {
    /// Wrap a list of actions.
    #[must_use]
    pub const fn new(actions: Vec<RawAction>) -> Self {
        Self { actions }
    }

    /// Parse and validate a JSON action graph document.
    ///
    /// # Errors
    ///
    /// Returns [`ActionGraphError`] when the JSON is malformed or a producer
    /// index points outside the action list.
    pub fn from_json(json: &str) -> Result<Self, ActionGraphError> {
        let graph: Self = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Check that every producer reference resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ActionGraphError::UnknownProducer`] for the first dangling
    /// reference.
    pub fn validate(&self) -> Result<(), ActionGraphError> {
        for (action, producer) in self.iter().flat_map(|(id, a)| a.producers().map(move |p| (id, p))) {
            if self.get(producer).is_none() {
                return Err(ActionGraphError::UnknownProducer { action, producer });
            }
        }
        Ok(())
    }

    /// Look up an action by id.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<&RawAction> {
        self.actions.get(id.0)
    }

    /// Iterate over actions with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ActionId, &RawAction)> {
        self.actions.iter().enumerate().map(|(i, a)| (ActionId(i), a))
    }

    /// Number of actions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the graph holds no actions.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

//! Error types for the translation pipeline.
//!
//! Every variant aborts the translation before any script is written.
//! Recoverable classification mismatches are not errors; they route the
//! action to local execution instead.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::action::ActionId;
use crate::tool::ToolError;

/// Fatal translation failures.
#[derive(Debug, Error, Diagnostic)]
pub enum TranslateError {
    /// A toolchain binary has no inferable architecture.
    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownPlatform(#[from] ToolError),

    /// A link action names more than one output artefact.
    #[error("link action {action} names {} outputs: {}", outputs.len(), outputs.join(", "))]
    #[diagnostic(
        code(kumiki::translate::multiple_output_matches),
        help("a link action must produce exactly one library or image")
    )]
    MultipleOutputMatches {
        /// Offending action.
        action: ActionId,
        /// Every matched output, in order of appearance.
        outputs: Vec<String>,
    },

    /// A link action has an output but no recognisable inputs.
    #[error("link action {action} has no recognised input artefacts")]
    #[diagnostic(code(kumiki::translate::no_recognized_input))]
    NoRecognizedInput {
        /// Offending action.
        action: ActionId,
    },

    /// A link node references more than one response file.
    #[error("{node} references {} response files: {}", inputs.len(), inputs.join(", "))]
    #[diagnostic(
        code(kumiki::translate::ambiguous_response_inputs),
        help("at most one response file may feed a link")
    )]
    AmbiguousResponseInputs {
        /// Alias of the offending node.
        node: String,
        /// Response files found among its inputs.
        inputs: Vec<String>,
    },

    /// A response file could not be read.
    #[error("failed to read response file {path}")]
    #[diagnostic(code(kumiki::translate::response_file_read))]
    ResponseFileRead {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A resolved response file copy could not be written.
    #[error("failed to write resolved response file {path}")]
    #[diagnostic(code(kumiki::translate::sidecar_write))]
    SidecarWrite {
        /// Sidecar path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The translated nodes depend on each other in a loop.
    #[error("dependency cycle between nodes: {}", cycle.join(" -> "))]
    #[diagnostic(
        code(kumiki::translate::dependency_cycle),
        help("the producer graph supplied by the build system must be acyclic")
    )]
    DependencyCycle {
        /// Node aliases along the cycle; the first alias is repeated last.
        cycle: Vec<String>,
    },
}

//! Reasons the engine cannot be used for a build.
//!
//! None of these are build failures: the caller is expected to pick another
//! way of running the actions.

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use thiserror::Error;

/// Why the engine was reported unavailable.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum Unavailable {
    /// Disabled in configuration.
    #[error("the engine is disabled in configuration")]
    #[diagnostic(code(kumiki::runner::disabled))]
    Disabled,

    /// Too few actions to be worth dispatching.
    #[error("{actions} actions is below the minimum of {minimum}")]
    #[diagnostic(code(kumiki::runner::below_threshold))]
    BelowThreshold {
        /// Actions in the graph.
        actions: usize,
        /// Configured minimum.
        minimum: usize,
    },

    /// No engine binary exists at any candidate location.
    #[error("no engine binary found (searched: {})", searched_list(.searched))]
    #[diagnostic(
        code(kumiki::runner::engine_not_found),
        help("set KUMIKI_FBUILD, engine.program or FASTBUILD_ROOT_DIR")
    )]
    EngineNotFound {
        /// Candidates checked, in lookup order.
        searched: Vec<Utf8PathBuf>,
    },

    /// Toolchain verification is on but no root is known.
    #[error("no toolchain root configured")]
    #[diagnostic(
        code(kumiki::runner::no_toolchain_root),
        help("set toolchain.root or FASTBUILD_ROOT_DIR, or disable toolchain.verify")
    )]
    NoToolchainRoot,

    /// A required compiler or SDK directory is missing.
    #[error("required toolchain directory {path} does not exist")]
    #[diagnostic(code(kumiki::runner::toolchain_missing))]
    ToolchainMissing {
        /// Missing directory.
        path: Utf8PathBuf,
    },
}

fn searched_list(paths: &[Utf8PathBuf]) -> String {
    if paths.is_empty() {
        return String::from("nothing configured");
    }
    paths.iter().map(Utf8PathBuf::as_path).map(Utf8Path::as_str).collect::<Vec<_>>().join(", ")
}

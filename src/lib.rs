//! Kumiki core library.
//!
//! Translates a compiled build action graph into FASTBuild `.bff` scripts
//! and dispatches the engine. Compile actions sharing a tool, options and
//! output directory are batched into object lists; link actions become
//! library or image records whose dependencies are recovered from explicit
//! prerequisites and from response files. Actions the translator does not
//! recognise run through a local scheduler instead.
//!
//! The pipeline is [`translate::translate`] followed by
//! [`bff_gen::generate`] per phase; [`runner::execute`] wraps both with
//! availability checks and engine dispatch.

pub mod action;
pub mod bff_gen;
pub mod classify;
pub mod cli;
pub mod cmdline;
pub mod config;
pub mod fallback;
pub mod graph;
pub mod hasher;
pub mod runner;
pub mod tool;
pub mod translate;

//! Test utilities shared by the integration tests.
//!
//! Provides fake engine executables, response file writers and a builder for
//! JSON action graphs.

pub mod actions;
pub mod engine;

pub use actions::{ActionsBuilder, write_response_file};
pub use engine::{CapturingEngine, fake_engine, fake_engine_capture};

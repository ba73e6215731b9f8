//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands.

use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::translate::Phase;

mod parsing;

use parsing::parse_jobs;

/// Maximum number of jobs accepted by the CLI.
const MAX_JOBS: usize = 64;

/// Translate build action graphs into FASTBuild scripts and run them.
#[derive(Debug, Parser, PartialEq, Eq, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if started in this directory.
    ///
    /// Relative input, output and configuration paths resolve against it.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Configuration file; defaults to `kumiki.toml` when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Number of locally executed actions run at once.
    ///
    /// Values must be between 1 and 64.
    #[arg(short, long, value_name = "N", value_parser = parse_jobs)]
    pub jobs: Option<NonZeroUsize>,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments accepted by the `build` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct BuildArgs {
    /// JSON action graph to build.
    #[arg(value_name = "ACTIONS")]
    pub actions: Utf8PathBuf,
}

/// Arguments accepted by the `emit` command.
#[derive(Debug, Args, PartialEq, Eq, Clone)]
pub struct EmitArgs {
    /// JSON action graph to translate.
    #[arg(value_name = "ACTIONS")]
    pub actions: Utf8PathBuf,

    /// Only emit this phase. `all` selects single-pass translation.
    #[arg(long, value_enum)]
    pub phase: Option<PhaseArg>,

    /// Output path for the script. Use `-` to write to stdout.
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    pub output: Utf8PathBuf,
}

/// Phase names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    /// Object lists only.
    Objects,
    /// Libraries, images and pass-through commands.
    Link,
    /// One combined script.
    All,
}

impl From<PhaseArg> for Phase {
    fn from(value: PhaseArg) -> Self {
        match value {
            PhaseArg::Objects => Self::CompileObjects,
            PhaseArg::Link => Self::Link,
            PhaseArg::All => Self::CompileAndLink,
        }
    }
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Translate the action graph and run it through the engine.
    Build(BuildArgs),

    /// Write the generated script without invoking the engine.
    Emit(EmitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[rstest]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    fn parses_global_flags_and_build() {
        let cli = Cli::try_parse_from(["kumiki", "-C", "work", "-j", "4", "-v", "build", "actions.json"])
            .expect("parse");
        assert_eq!(cli.directory, Some(Utf8PathBuf::from("work")));
        assert_eq!(cli.jobs.map(NonZeroUsize::get), Some(4));
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Build(BuildArgs {
                actions: "actions.json".into()
            })
        );
    }

    #[rstest]
    #[case(&["kumiki", "emit", "a.json"], None, "-")]
    #[case(&["kumiki", "emit", "a.json", "--phase", "link", "-o", "x.bff"], Some(Phase::Link), "x.bff")]
    #[case(&["kumiki", "emit", "a.json", "--phase", "all"], Some(Phase::CompileAndLink), "-")]
    fn parses_emit(#[case] argv: &[&str], #[case] phase: Option<Phase>, #[case] output: &str) {
        let cli = Cli::try_parse_from(argv.iter().copied()).expect("parse");
        let Commands::Emit(args) = cli.command else {
            panic!("expected emit");
        };
        assert_eq!(args.phase.map(Phase::from), phase);
        assert_eq!(args.output, output);
    }

    #[rstest]
    #[case("0")]
    #[case("65")]
    #[case("many")]
    fn rejects_bad_job_counts(#[case] jobs: &str) {
        assert!(Cli::try_parse_from(["kumiki", "-j", jobs, "build", "a.json"]).is_err());
    }

    #[rstest]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["kumiki"]).is_err());
    }
}

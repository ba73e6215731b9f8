//! Build orchestration and command dispatch.
//!
//! [`execute`] decides whether the engine can be used, translates the action
//! graph, runs rejected actions locally, then writes one script per phase
//! and dispatches the engine for each. The outcome is reported as an
//! [`ExecutionResult`]. [`run`] is the entry point used by the binary.

mod error;
mod paths;
mod process;

pub use error::Unavailable;
pub use paths::{canonicalize_utf8_path, is_stdout_path, write_script, write_stdout};
pub(crate) use process::forward_lines;
pub use process::{EngineFlags, redact_argument};

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{error, info, warn};

use crate::action::ActionGraph;
use crate::bff_gen::generate;
use crate::cli::{BuildArgs, Cli, Commands, EmitArgs};
use crate::config::{KumikiConfig, ToolchainLayout};
use crate::fallback::{FallbackScheduler, ProcessLauncher};
use crate::translate::{Phase, TranslateError, TranslateOptions, Translation, translate};

/// File name of the generated script inside the intermediate directory.
pub const SCRIPT_FILE_NAME: &str = "fbuild.bff";

/// Outcome of one build invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The engine cannot be used; run the actions another way.
    Unavailable,
    /// Translation, dispatch or a build step failed.
    Failed,
    /// Every phase and every fallback action succeeded.
    Succeeded,
}

impl ExecutionResult {
    /// Boolean build-success signal.
    #[must_use]
    pub const fn succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        })
    }
}

/// Engine binary and switches chosen for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSetup {
    /// Engine executable.
    pub program: Utf8PathBuf,
    /// Toolchain directories, when a root is known.
    pub toolchain: Option<ToolchainLayout>,
    /// Switches after thresholds.
    pub flags: EngineFlags,
}

/// Decide whether the engine can run `actions` actions.
///
/// # Errors
///
/// Returns the [`Unavailable`] reason when it cannot.
pub fn check_availability<F>(actions: usize, config: &KumikiConfig, mut read_env: F) -> Result<EngineSetup, Unavailable>
where
    F: FnMut(&str) -> Option<OsString>,
{
    if !config.enabled {
        return Err(Unavailable::Disabled);
    }
    if actions < config.min_actions {
        return Err(Unavailable::BelowThreshold {
            actions,
            minimum: config.min_actions,
        });
    }
    let searched = config.engine_candidates(&mut read_env);
    let Some(program) = searched.iter().find(|path| path.is_file()).cloned() else {
        return Err(Unavailable::EngineNotFound { searched });
    };
    let toolchain = config
        .toolchain
        .root_with(&mut read_env)
        .map(|root| config.toolchain.layout(&root));
    if config.toolchain.verify {
        let layout = toolchain.as_ref().ok_or(Unavailable::NoToolchainRoot)?;
        if let Some(missing) = layout.required_dirs().into_iter().find(|dir| !dir.is_dir()) {
            return Err(Unavailable::ToolchainMissing {
                path: missing.to_owned(),
            });
        }
    }
    let mut flags = EngineFlags::new(config.engine.clone());
    if actions <= config.min_actions_for_distribution {
        info!(
            actions,
            threshold = config.min_actions_for_distribution,
            "small build: distribution and caching disabled"
        );
        flags = flags.without_distribution();
    }
    Ok(EngineSetup {
        program,
        toolchain,
        flags,
    })
}

/// Run `graph` using the process environment.
#[must_use]
pub fn execute(graph: &ActionGraph, config: &KumikiConfig) -> ExecutionResult {
    execute_with(graph, config, |key| env::var_os(key))
}

/// Run `graph`, reading environment variables through `read_env`.
#[must_use]
pub fn execute_with<F>(graph: &ActionGraph, config: &KumikiConfig, read_env: F) -> ExecutionResult
where
    F: FnMut(&str) -> Option<OsString>,
{
    if graph.is_empty() {
        return ExecutionResult::Succeeded;
    }
    let setup = match check_availability(graph.len(), config, read_env) {
        Ok(setup) => setup,
        Err(reason) => {
            info!(%reason, "engine unavailable");
            return ExecutionResult::Unavailable;
        }
    };
    match build(graph, config, &setup) {
        Ok(result) => result,
        Err(err) => {
            error!("build aborted: {err:#}");
            ExecutionResult::Failed
        }
    }
}

fn translate_for(graph: &ActionGraph, config: &KumikiConfig) -> Result<Translation, TranslateError> {
    translate(
        graph,
        &TranslateOptions {
            single_pass: config.single_pass,
            base_dir: config.root_dir.clone(),
        },
    )
}

fn build(graph: &ActionGraph, config: &KumikiConfig, setup: &EngineSetup) -> Result<ExecutionResult> {
    let translation = translate_for(graph, config).context("translating the action graph")?;

    let fallback_ok = if translation.fallback.is_empty() {
        true
    } else {
        let mut scheduler = FallbackScheduler::new(
            ProcessLauncher::new(Some(config.root_dir.clone())),
            config.fallback.max_parallel(),
            config.fallback.poll_interval(),
        );
        let report = scheduler.run(graph, &translation.fallback);
        if !report.succeeded() {
            warn!("some locally executed actions failed");
        }
        report.succeeded()
    };

    let settings = config.script_settings(setup.toolchain.as_ref().map(|l| l.root.as_path()));
    let script_path = config.intermediate_path().join(SCRIPT_FILE_NAME);
    for plan in &translation.phases {
        let script = generate(&translation.arena, &translation.tools, plan, &settings);
        write_script(&script_path, &script)?;
        let config_arg = canonicalize_utf8_path(&script_path)
            .with_context(|| format!("resolving {script_path}"))?;
        info!(phase = %plan.phase, nodes = plan.nodes.len(), "dispatching engine");
        let started = Instant::now();
        let status = process::run_engine(
            &setup.program,
            &setup.flags.args(&config_arg),
            &config.root_dir,
            setup.flags.engine.cache_path.as_deref(),
        )
        .with_context(|| format!("running {}", setup.program))?;
        info!(phase = %plan.phase, elapsed = ?started.elapsed(), %status, "engine finished");
        if !status.success() {
            error!(phase = %plan.phase, %status, "engine phase failed");
            return Ok(ExecutionResult::Failed);
        }
    }
    Ok(if fallback_ok {
        ExecutionResult::Succeeded
    } else {
        ExecutionResult::Failed
    })
}

/// Translate `graph` and render the script of every phase without running
/// anything. `phase` restricts the output to one phase and picks the
/// translation mode: [`Phase::CompileAndLink`] forces a single pass.
///
/// # Errors
///
/// Returns an error when translation fails or the requested phase has no
/// nodes.
pub fn render_scripts<F>(
    graph: &ActionGraph,
    config: &KumikiConfig,
    phase: Option<Phase>,
    read_env: F,
) -> Result<Vec<(Phase, String)>>
where
    F: FnMut(&str) -> Option<OsString>,
{
    let mut effective = config.clone();
    if let Some(p) = phase {
        effective.single_pass = p == Phase::CompileAndLink;
    }
    let translation = translate_for(graph, &effective)?;
    let root = effective.toolchain.root_with(read_env);
    let settings = effective.script_settings(root.as_deref());
    let scripts: Vec<(Phase, String)> = translation
        .phases
        .iter()
        .filter(|plan| phase.is_none_or(|p| p == plan.phase))
        .map(|plan| {
            (
                plan.phase,
                generate(&translation.arena, &translation.tools, plan, &settings),
            )
        })
        .collect();
    if let Some(p) = phase
        && scripts.is_empty()
    {
        return Err(anyhow!("the action graph has no {p} nodes"));
    }
    Ok(scripts)
}

/// Execute the parsed [`Cli`].
///
/// # Errors
///
/// Returns an error when configuration or the action graph cannot be
/// loaded, or when `emit` fails.
pub fn run(cli: &Cli) -> Result<ExecutionResult> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Build(args) => handle_build(cli, args, &config),
        Commands::Emit(args) => handle_emit(cli, args, &config),
    }
}

fn handle_build(cli: &Cli, args: &BuildArgs, config: &KumikiConfig) -> Result<ExecutionResult> {
    let graph = load_graph(&resolve_input_path(cli, &args.actions))?;
    let result = execute(&graph, config);
    info!(%result, "build finished");
    Ok(result)
}

fn handle_emit(cli: &Cli, args: &EmitArgs, config: &KumikiConfig) -> Result<ExecutionResult> {
    let graph = load_graph(&resolve_input_path(cli, &args.actions))?;
    let scripts = render_scripts(&graph, config, args.phase.map(Phase::from), |key| env::var_os(key))?;
    let several = scripts.len() > 1;
    for (phase, script) in &scripts {
        if is_stdout_path(&args.output) {
            if several {
                write_stdout(&format!(";; phase: {phase}\n"))?;
            }
            write_stdout(script)?;
        } else {
            let base = resolve_input_path(cli, &args.output);
            let target = if several { phase_path(&base, *phase) } else { base };
            write_script(&target, script)?;
        }
    }
    Ok(ExecutionResult::Succeeded)
}

/// `out/fbuild.bff` becomes `out/fbuild.objects.bff` for the objects phase.
fn phase_path(path: &Utf8Path, phase: Phase) -> Utf8PathBuf {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path.with_file_name(format!("{stem}.{phase}.{ext}")),
        _ => Utf8PathBuf::from(format!("{path}.{phase}")),
    }
}

/// Resolve `path` against the `-C` directory when relative.
fn resolve_input_path(cli: &Cli, path: &Utf8Path) -> Utf8PathBuf {
    match &cli.directory {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_owned(),
    }
}

fn load_config(cli: &Cli) -> Result<KumikiConfig> {
    let base = cli.directory.clone().unwrap_or_else(|| Utf8PathBuf::from("."));
    let mut config = match &cli.config {
        Some(path) => KumikiConfig::load(&resolve_input_path(cli, path))?,
        None => KumikiConfig::discover(&base)?,
    };
    if config.root_dir.is_relative() {
        config.root_dir = base.join(&config.root_dir);
    }
    if let Some(jobs) = cli.jobs {
        config.fallback.max_parallel = Some(jobs);
    }
    Ok(config)
}

fn load_graph(path: &Utf8Path) -> Result<ActionGraph> {
    let text = fs::read_to_string(path).with_context(|| format!("reading action graph {path}"))?;
    ActionGraph::from_json(&text).with_context(|| format!("loading action graph {path}"))
}

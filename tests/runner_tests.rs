//! Orchestrator tests against fake engine executables.

#![cfg(unix)]

use camino::{Utf8Path, Utf8PathBuf};
use kumiki::action::{ActionGraph, ActionId, ActionKind, RawAction};
use kumiki::config::{KumikiConfig, ToolchainConfig};
use kumiki::runner::{ExecutionResult, SCRIPT_FILE_NAME, Unavailable, check_availability, execute_with};
use rstest::rstest;
use std::ffi::OsString;
use std::fs;
use tempfile::TempDir;
use test_support::{CapturingEngine, fake_engine_capture};

const CL: &str = r"C:\VS\VC\bin\amd64\cl.exe";
const LINK: &str = r"C:\VS\VC\bin\amd64\link.exe";

fn no_env(_: &str) -> Option<OsString> {
    None
}

fn graph() -> ActionGraph {
    ActionGraph::new(vec![
        RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/a.obj" "src/a.cpp""#),
        RawAction::new(ActionKind::Link, LINK, r#"/OUT:"bin/x.dll" "out/a.obj""#)
            .with_prerequisite("out/a.obj", Some(ActionId(0))),
    ])
}

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    engine: CapturingEngine,
}

impl Workspace {
    fn new(exit_code: i32) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
        let engine = fake_engine_capture(exit_code).expect("fake engine");
        Self {
            _dir: dir,
            root,
            engine,
        }
    }

    fn config(&self) -> KumikiConfig {
        let mut config = KumikiConfig {
            root_dir: self.root.clone(),
            toolchain: ToolchainConfig {
                verify: false,
                ..ToolchainConfig::default()
            },
            ..KumikiConfig::default()
        };
        config.engine.program = Some(self.engine.program.clone());
        config
    }

    fn script_path(&self) -> Utf8PathBuf {
        self.root.join("Intermediate").join(SCRIPT_FILE_NAME)
    }
}

#[rstest]
fn runs_objects_then_links() {
    let ws = Workspace::new(0);
    assert_eq!(execute_with(&graph(), &ws.config(), no_env), ExecutionResult::Succeeded);

    let scripts = ws.engine.scripts().expect("captured scripts");
    let [objects, links] = scripts.as_slice() else {
        panic!("expected two engine runs, got {}", scripts.len());
    };
    assert!(objects.contains("ObjectList('ObjG-1')"));
    assert!(!objects.contains("DLL("));
    assert!(links.contains("DLL('DLL-2')"));
    assert!(ws.script_path().is_file());
}

#[rstest]
fn small_builds_run_without_distribution() {
    let ws = Workspace::new(0);
    assert!(execute_with(&graph(), &ws.config(), no_env).succeeded());
    let invocations = ws.engine.invocations().expect("captured args");
    let first = invocations.first().expect("one invocation");
    assert!(first.starts_with("-ide -summary -config "), "unexpected args: {first}");
    assert!(first.ends_with(SCRIPT_FILE_NAME), "unexpected args: {first}");
    assert!(!first.contains("-dist"));
}

#[rstest]
fn large_builds_distribute() {
    let ws = Workspace::new(0);
    let config = KumikiConfig {
        min_actions_for_distribution: 1,
        ..ws.config()
    };
    assert!(execute_with(&graph(), &config, no_env).succeeded());
    let invocations = ws.engine.invocations().expect("captured args");
    assert!(invocations.iter().all(|args| args.starts_with("-dist -ide -summary")));
}

#[rstest]
fn failed_object_phase_skips_links() {
    let ws = Workspace::new(3);
    assert_eq!(execute_with(&graph(), &ws.config(), no_env), ExecutionResult::Failed);
    assert_eq!(ws.engine.invocations().expect("captured args").len(), 1);
}

#[rstest]
fn single_pass_runs_once() {
    let ws = Workspace::new(0);
    let config = KumikiConfig {
        single_pass: true,
        ..ws.config()
    };
    assert!(execute_with(&graph(), &config, no_env).succeeded());
    let scripts = ws.engine.scripts().expect("captured scripts");
    let [script] = scripts.as_slice() else {
        panic!("expected one engine run, got {}", scripts.len());
    };
    assert!(script.contains("Alias('all')"));
}

#[rstest]
fn translation_errors_fail_before_any_script() {
    let ws = Workspace::new(0);
    let graph = ActionGraph::new(vec![RawAction::new(
        ActionKind::Link,
        LINK,
        r#"/OUT:"bin/x.dll" /OUT:"bin/y.dll" "out/a.obj""#,
    )]);
    assert_eq!(execute_with(&graph, &ws.config(), no_env), ExecutionResult::Failed);
    assert!(ws.engine.invocations().expect("captured args").is_empty());
    assert!(!ws.script_path().exists());
}

#[rstest]
fn fallback_actions_run_in_root_dir() {
    let ws = Workspace::new(0);
    let mut graph = graph();
    graph
        .actions
        .push(RawAction::new(ActionKind::Other, "/bin/sh", r#"-c "echo generated > gen.txt""#));
    assert!(execute_with(&graph, &ws.config(), no_env).succeeded());
    let generated = fs::read_to_string(ws.root.join("gen.txt")).expect("fallback output");
    assert_eq!(generated, "generated\n");
}

#[rstest]
fn fallback_failure_fails_the_build() {
    let ws = Workspace::new(0);
    let mut graph = graph();
    graph
        .actions
        .push(RawAction::new(ActionKind::Other, "/bin/sh", r#"-c "exit 4""#));
    assert_eq!(execute_with(&graph, &ws.config(), no_env), ExecutionResult::Failed);
    assert_eq!(ws.engine.invocations().expect("captured args").len(), 2);
}

#[rstest]
fn missing_engine_is_unavailable() {
    let ws = Workspace::new(0);
    let mut config = ws.config();
    config.engine.program = Some(ws.root.join("no-such-engine"));
    assert_eq!(execute_with(&graph(), &config, no_env), ExecutionResult::Unavailable);
}

#[rstest]
fn environment_override_selects_engine() {
    let ws = Workspace::new(0);
    let mut config = ws.config();
    config.engine.program = None;
    let program = ws.engine.program.clone();
    let env = move |key: &str| (key == "KUMIKI_FBUILD").then(|| OsString::from(program.as_str()));
    assert!(execute_with(&graph(), &config, env).succeeded());
}

fn create_toolchain(root: &Utf8Path) {
    for dir in [
        "External/VS14.0",
        "External/Windows8.1",
        "External/Windows10/Include/10.0.14393.0",
    ] {
        fs::create_dir_all(root.join(dir)).expect("toolchain dir");
    }
}

#[rstest]
fn toolchain_layout_is_verified() {
    let ws = Workspace::new(0);
    let mut config = ws.config();
    config.toolchain.verify = true;
    config.toolchain.root = Some(ws.root.clone());

    let err = check_availability(2, &config, no_env).expect_err("missing toolchain");
    assert_eq!(
        err,
        Unavailable::ToolchainMissing {
            path: ws.root.join("External/VS14.0")
        }
    );

    create_toolchain(&ws.root);
    let setup = check_availability(2, &config, no_env).expect("toolchain present");
    assert_eq!(setup.program, ws.engine.program);
    assert_eq!(setup.toolchain.map(|layout| layout.root), Some(ws.root.clone()));
}

#[rstest]
fn verification_needs_a_root() {
    let ws = Workspace::new(0);
    let mut config = ws.config();
    config.toolchain.verify = true;
    assert_eq!(check_availability(2, &config, no_env), Err(Unavailable::NoToolchainRoot));
}

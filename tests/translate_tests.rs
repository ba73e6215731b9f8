//! End-to-end translation tests: action graph in, ordered scripts out.

use camino::Utf8PathBuf;
use kumiki::action::{ActionGraph, ActionId, ActionKind, RawAction};
use kumiki::bff_gen::{ScriptSettings, generate};
use kumiki::translate::{Phase, TranslateError, TranslateOptions, Translation, translate};
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;
use test_support::write_response_file;

const CL: &str = r"C:\VS\VC\bin\amd64\cl.exe";
const LINK: &str = r"C:\VS\VC\bin\amd64\link.exe";
const ORBIS_CLANG: &str = "D:/SCE/host_tools/x64/bin/orbis-clang.exe";
const ORBIS_SNARL: &str = "D:/SCE/host_tools/x64/bin/orbis-snarl.exe";

fn compile_and_link() -> ActionGraph {
    ActionGraph::new(vec![
        RawAction::new(ActionKind::Compile, CL, r#"/c /nologo /Fo"out/a.obj" "src/a.cpp""#),
        RawAction::new(ActionKind::Compile, CL, r#"/c /nologo /Fo"out/b.obj" "src/b.cpp""#),
        RawAction::new(ActionKind::Link, LINK, r#"/NOLOGO /OUT:"bin/x.dll" "out/a.obj" "out/b.obj""#)
            .with_prerequisite("out/a.obj", Some(ActionId(0)))
            .with_prerequisite("out/b.obj", Some(ActionId(1))),
    ])
}

fn scripts(translation: &Translation) -> Vec<(Phase, String)> {
    translation
        .phases
        .iter()
        .map(|plan| {
            (
                plan.phase,
                generate(&translation.arena, &translation.tools, plan, &ScriptSettings::default()),
            )
        })
        .collect()
}

fn single_pass() -> TranslateOptions {
    TranslateOptions {
        single_pass: true,
        ..TranslateOptions::default()
    }
}

#[fixture]
fn workspace() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir");
    (dir, root)
}

#[rstest]
fn single_pass_orders_objects_before_image() {
    let translation = translate(&compile_and_link(), &single_pass()).expect("translate");
    let [(phase, script)] = scripts(&translation).try_into().expect("one phase");
    assert_eq!(phase, Phase::CompileAndLink);
    let image = script.find("DLL('DLL-3')").expect("image record");
    for group in ["ObjectList('ObjG-1')", "ObjectList('ObjG-2')"] {
        assert!(script.find(group).expect("object list") < image, "{group} after image");
    }
    assert!(script.contains("    .Libraries = { 'ObjG-1', 'ObjG-2' }\n"));
    assert!(script.contains("    .PreBuildDependencies = { 'ObjG-1', 'ObjG-2' }\n"));
    assert_eq!(translation.summary.compile_groups, 2);
    assert_eq!(translation.summary.link_nodes, 1);
}

#[rstest]
fn two_phase_splits_objects_and_links() {
    let translation = translate(&compile_and_link(), &TranslateOptions::default()).expect("translate");
    let phases = scripts(&translation);
    let names: Vec<Phase> = phases.iter().map(|(p, _)| *p).collect();
    assert_eq!(names, [Phase::CompileObjects, Phase::Link]);
    let [(_, objects), (_, links)] = phases.as_slice() else {
        panic!("expected two phases");
    };
    assert!(objects.contains("Compiler('Compiler-0')"));
    assert!(objects.contains("    .CompilerInputFiles = { 'src/a.cpp', 'src/b.cpp' }\n"));
    assert!(!objects.contains("DLL("));
    assert!(links.contains("DLL('DLL-2')"));
    assert!(!links.contains("ObjectList("));
    assert!(!links.contains("Compiler("));
}

#[rstest]
fn response_file_output_becomes_dependency(workspace: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = workspace;
    let response = root.join("int/b.dll.response");
    let import_lib = root.join("lib/a.lib");
    write_response_file(&response, &[import_lib.as_str(), "kernel32.lib"]).expect("response");
    let graph = ActionGraph::new(vec![
        RawAction::new(ActionKind::Link, LINK, format!(r#"/OUT:"bin/b.dll" @"{response}""#)),
        RawAction::new(
            ActionKind::Link,
            LINK,
            format!(r#"/OUT:"bin/a.dll" /IMPLIB:"{import_lib}" "int/a.obj""#),
        ),
    ]);
    let options = TranslateOptions {
        single_pass: false,
        base_dir: root.clone(),
    };
    let translation = translate(&graph, &options).expect("translate");
    let [(phase, script)] = scripts(&translation).try_into().expect("one phase");
    assert_eq!(phase, Phase::Link);
    let producer = script.find("DLL('DLL-2')").expect("producer");
    let consumer = script.find("DLL('DLL-1')").expect("consumer");
    assert!(producer < consumer, "producer must precede consumer:\n{script}");
    assert!(script.contains("    .Libraries = { 'DLL-2' }\n"));
    assert!(script.contains("    .PreBuildDependencies = { 'DLL-2' }\n"));

    let sidecar = fs::read_to_string(root.join("int/b.dll.response.fbuild")).expect("sidecar");
    assert_eq!(sidecar, "kernel32.lib\n");
}

#[rstest]
fn direct_archive_and_response_file_share_one_link(workspace: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = workspace;
    let archive_response = root.join("int/core.a.response");
    write_response_file(&archive_response, &["int/a.o"]).expect("archive response");
    let link_response = root.join("int/game.self.response");
    write_response_file(&link_response, &["-lSceGnm_stub_weak"]).expect("link response");
    let graph = ActionGraph::new(vec![
        RawAction::new(
            ActionKind::Link,
            ORBIS_CLANG,
            format!(r#"-o "bin/game.self" "lib/core.a" @"{link_response}""#),
        )
        .with_prerequisite("lib/core.a", Some(ActionId(1))),
        RawAction::new(ActionKind::Link, ORBIS_SNARL, format!(r#""lib/core.a" @"{archive_response}""#)),
    ]);
    let options = TranslateOptions {
        single_pass: false,
        base_dir: root.clone(),
    };
    let translation = translate(&graph, &options).expect("translate");
    let [(phase, script)] = scripts(&translation).try_into().expect("one phase");
    assert_eq!(phase, Phase::Link);

    let archive = script.find("Library('DLL-2')").expect("archive record");
    let image = script.find("DLL('DLL-1')").expect("image record");
    assert!(archive < image, "archive must precede image:\n{script}");
    assert!(script.contains("    .Libraries = { 'DLL-2' }\n"), "{script}");
    assert!(
        script.contains(&format!(
            "    .LinkerOptions = '-o \"%2\" @\"{link_response}.fbuild\" \"%1\" $BaseLibraryPathsx64$'\n"
        )),
        "{script}"
    );
    assert!(!script.contains("lib/core.a\" @"), "direct archive left in options:\n{script}");

    let sidecar = fs::read_to_string(root.join("int/game.self.response.fbuild")).expect("sidecar");
    assert_eq!(sidecar, "-lSceGnm_stub_weak\n");
}

#[rstest]
fn implicit_resolution_is_idempotent(workspace: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = workspace;
    let response = root.join("int/x.dll.response");
    write_response_file(&response, &["out/a.obj", "user32.lib"]).expect("response");
    let mut graph = compile_and_link();
    graph.actions.push(RawAction::new(
        ActionKind::Link,
        LINK,
        format!(r#"/OUT:"bin/y.dll" @"{response}""#),
    ));
    let options = TranslateOptions {
        single_pass: true,
        base_dir: root.clone(),
    };
    let first = scripts(&translate(&graph, &options).expect("first"));
    let sidecar = fs::read_to_string(root.join("int/x.dll.response.fbuild")).expect("sidecar");
    let second = scripts(&translate(&graph, &options).expect("second"));
    assert_eq!(first, second);
    assert_eq!(
        fs::read_to_string(root.join("int/x.dll.response.fbuild")).expect("sidecar"),
        sidecar
    );
}

#[rstest]
#[case::generator(RawAction::new(ActionKind::Other, "/usr/bin/python3", "gen.py --out gen.h"))]
#[case::compile_without_output(RawAction::new(ActionKind::Compile, CL, r#"/c "src/gen.cpp""#))]
#[case::link_without_output(RawAction::new(ActionKind::Link, LINK, r#"/DEBUG "out/gen.obj""#))]
fn unrecognised_actions_run_locally(#[case] action: RawAction) {
    let mut graph = compile_and_link();
    graph.actions.push(action);
    let translation = translate(&graph, &single_pass()).expect("translate");
    assert_eq!(translation.fallback, [ActionId(3)]);
    assert!(!translation.action_nodes.contains_key(&ActionId(3)));
    let [(_, script)] = scripts(&translation).try_into().expect("one phase");
    assert!(!script.contains("gen."));
}

#[rstest]
fn multiple_outputs_abort_translation() {
    let graph = ActionGraph::new(vec![RawAction::new(
        ActionKind::Link,
        LINK,
        r#"/OUT:"bin/x.dll" /OUT:"bin/y.dll" "out/a.obj""#,
    )]);
    let err = translate(&graph, &TranslateOptions::default()).expect_err("ambiguous outputs");
    let TranslateError::MultipleOutputMatches { action, outputs } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(action, ActionId(0));
    assert_eq!(outputs, ["bin/x.dll", "bin/y.dll"]);
}

#[rstest]
fn missing_response_file_is_fatal(workspace: (TempDir, Utf8PathBuf)) {
    let (_dir, root) = workspace;
    let graph = ActionGraph::new(vec![RawAction::new(
        ActionKind::Link,
        LINK,
        r#"/OUT:"bin/x.dll" @"int/missing.response""#,
    )]);
    let options = TranslateOptions {
        single_pass: false,
        base_dir: root.clone(),
    };
    let err = translate(&graph, &options).expect_err("unreadable response");
    assert!(
        matches!(&err, TranslateError::ResponseFileRead { path, .. } if path == &root.join("int/missing.response")),
        "unexpected error: {err}"
    );
}

#[rstest]
fn unknown_platform_is_fatal() {
    let graph = ActionGraph::new(vec![RawAction::new(
        ActionKind::Compile,
        "C:/tools/cl.exe",
        r#"/c /Fo"out/a.obj" "a.cpp""#,
    )]);
    assert!(matches!(
        translate(&graph, &TranslateOptions::default()),
        Err(TranslateError::UnknownPlatform(_))
    ));
}

#[rstest]
fn generation_is_byte_identical_across_runs() {
    let graph = compile_and_link();
    let first = scripts(&translate(&graph, &single_pass()).expect("first"));
    let second = scripts(&translate(&graph, &single_pass()).expect("second"));
    assert_eq!(first, second);
}

#[rstest]
fn graph_documents_round_trip_through_json() {
    let json = r#"{ "actions": [
        { "kind": "compile", "executable": "C:/VS/VC/bin/amd64/cl.exe",
          "arguments": "/c /Fo\"out/a.obj\" a.cpp" },
        { "kind": "link", "executable": "C:/VS/VC/bin/amd64/link.exe",
          "arguments": "/OUT:\"bin/x.exe\" out/a.obj",
          "prerequisites": [ { "path": "out/a.obj", "producer": 0 } ], "remote": false }
    ] }"#;
    let graph = ActionGraph::from_json(json).expect("load");
    assert_eq!(graph.len(), 2);
    let translation = translate(&graph, &single_pass()).expect("translate");
    let [(_, script)] = scripts(&translation).try_into().expect("one phase");
    assert!(script.contains("DLL('DLL-2')"));
    assert!(script.contains("    .LinkerOutput = 'bin/x.exe'\n"));
}

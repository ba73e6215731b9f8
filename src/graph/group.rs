//! Compile action normalisation and batching.
//!
//! A classified compile action is reduced to a template with `%1` for its
//! source and `%2` for its object, plus the object directory and extension.
//! Actions whose [`GroupKey`](crate::hasher::GroupKey)s match are merged
//! into one [`CompileGroup`].

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::{CompileGroup, NodeArena, NodeBody, NodeId, NodeTag, PchBlock};
use crate::action::{ActionId, RawAction};
use crate::classify::{CompileShape, use_pch_switch};
use crate::hasher::{GroupKey, GroupKeyHasher, GroupKeyInput, PchKeyInput};
use crate::tool::ToolDescriptor;

/// Middle extensions collapsed out of a double object extension.
const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hh", "hxx"];

/// A compile action in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalisedCompile {
    /// Option template with `%1` and `%2` placeholders.
    pub template: String,
    /// Object directory, trailing separator included.
    pub output_dir: String,
    /// Object extension.
    pub output_ext: String,
    /// Precompiled header block.
    pub pch: Option<PchBlock>,
    /// Source file.
    pub input: String,
}

/// Rewrite `args` into canonical form using the classified `shape`.
///
/// # Examples
///
/// ```
/// use kumiki::classify::CompileShape;
/// use kumiki::graph::group::normalise;
///
/// let shape = CompileShape {
///     input: "a.cpp".into(),
///     output: "out/a.obj".into(),
///     pch_output: None,
/// };
/// let canonical = normalise(r#"/c /Fo"out/a.obj" a.cpp"#, &shape);
/// assert_eq!(canonical.template, r#"/c /Fo"%2" %1"#);
/// assert_eq!(canonical.output_dir, "out/");
/// assert_eq!(canonical.output_ext, ".obj");
/// ```
#[must_use]
pub fn normalise(args: &str, shape: &CompileShape) -> NormalisedCompile {
    let pch = shape.pch_output.as_ref().map(|pch_output| PchBlock {
        input: shape.input.clone(),
        output: pch_output.clone(),
        options: args
            .replace(pch_output.as_str(), "%2")
            .replace(shape.output.as_str(), "%3")
            .replace(shape.input.as_str(), "%1"),
    });
    let base = if pch.is_some() {
        use_pch_switch(args)
    } else {
        args.to_owned()
    };
    let template = base
        .replace(shape.output.as_str(), "%2")
        .replace(shape.input.as_str(), "%1");
    let (output_dir, output_ext) = split_output(&shape.output);
    NormalisedCompile {
        template,
        output_dir,
        output_ext,
        pch,
        input: shape.input.clone(),
    }
}

/// Split an object path into its directory and extension.
///
/// A double extension is kept unless its middle segment names a header, so
/// `out/a.cpp.obj` yields `.cpp.obj` while `out/pch.h.obj` yields `.obj`.
fn split_output(output: &str) -> (String, String) {
    let split = output.rfind(['/', '\\']).map_or(0, |idx| idx + 1);
    let dir = output.get(..split).unwrap_or("").to_owned();
    let name = output.get(split..).unwrap_or(output);
    let parts: Vec<&str> = name.split('.').skip(1).collect();
    let ext = match parts.as_slice() {
        [] => String::new(),
        [.., mid, last] if !HEADER_EXTENSIONS.contains(&mid.to_ascii_lowercase().as_str()) => {
            format!(".{mid}.{last}")
        }
        [.., last] => format!(".{last}"),
    };
    (dir, ext)
}

/// Merges normalised compile actions into compile groups.
#[derive(Debug, Default)]
pub struct Grouper {
    single_pass: bool,
    groups: HashMap<GroupKey, NodeId>,
}

impl Grouper {
    /// Create a grouper. In single-pass mode every action gets its own
    /// group.
    #[must_use]
    pub fn new(single_pass: bool) -> Self {
        Self {
            single_pass,
            groups: HashMap::new(),
        }
    }

    /// Add one classified compile action, merging it into an existing group
    /// when the key matches.
    pub fn add(
        &mut self,
        arena: &mut NodeArena,
        action_id: ActionId,
        action: &RawAction,
        tool: &ToolDescriptor,
        canonical: NormalisedCompile,
    ) -> NodeId {
        let key = GroupKeyHasher::hash(&GroupKeyInput {
            template: &canonical.template,
            output_dir: &canonical.output_dir,
            output_ext: &canonical.output_ext,
            tool: &tool.raw_path,
            pch: canonical.pch.as_ref().map(|pch| PchKeyInput {
                input: &pch.input,
                output: &pch.output,
                options: &pch.options,
            }),
            prerequisites: action.prerequisites.iter().map(|p| p.path.as_str()).collect(),
        });
        if !self.single_pass
            && let Some(&existing) = self.groups.get(&key)
            && let Some(NodeBody::Compile(group)) = arena.get_mut(existing).map(|n| &mut n.body)
        {
            group.inputs.insert(action_id, canonical.input);
            group.local_only |= !action.remote;
            debug!(action = %action_id, key = %key, "merged compile action into existing group");
            return existing;
        }
        let mut inputs = IndexMap::new();
        inputs.insert(action_id, canonical.input);
        let id = arena.push(
            NodeTag::ObjectList,
            NodeBody::Compile(CompileGroup {
                tool: tool.id,
                template: canonical.template,
                output_dir: canonical.output_dir,
                output_ext: canonical.output_ext,
                pch: canonical.pch,
                inputs,
                key: key.clone(),
                local_only: !action.remote,
            }),
        );
        self.groups.insert(key, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::classify::classify_compile;
    use crate::tool::ToolResolver;
    use rstest::rstest;

    #[rstest]
    #[case("out/a.obj", "out/", ".obj")]
    #[case(r"C:\int\Module.cpp.obj", r"C:\int\", ".cpp.obj")]
    #[case("out/pch.h.obj", "out/", ".obj")]
    #[case("out/pch.HPP.obj", "out/", ".obj")]
    #[case("a.o", "", ".o")]
    #[case("out/noext", "out/", "")]
    fn splits_object_paths(#[case] output: &str, #[case] dir: &str, #[case] ext: &str) {
        assert_eq!(split_output(output), (dir.to_owned(), ext.to_owned()));
    }

    #[rstest]
    fn normalise_builds_pch_block() {
        let shape = CompileShape {
            input: "pch.cpp".into(),
            output: "out/pch.obj".into(),
            pch_output: Some("out/pch.pch".into()),
        };
        let canonical = normalise(r#"/c /Yc"pch.h" /Fp"out/pch.pch" /Fo"out/pch.obj" pch.cpp"#, &shape);
        let pch = canonical.pch.expect("pch block");
        assert_eq!(pch.options, r#"/c /Yc"pch.h" /Fp"%2" /Fo"%3" %1"#);
        assert_eq!(canonical.template, r#"/c /Yu"pch.h" /Fp"out/pch.pch" /Fo"%2" %1"#);
    }

    fn add_action(
        grouper: &mut Grouper,
        arena: &mut NodeArena,
        tools: &mut ToolResolver,
        id: usize,
        action: &RawAction,
    ) -> NodeId {
        let tool_id = tools.resolve(&action.executable).expect("tool");
        let tool = tools.get(tool_id).expect("descriptor");
        let shape = classify_compile(&action.arguments, tool).expect("compile");
        grouper.add(arena, ActionId(id), action, tool, normalise(&action.arguments, &shape))
    }

    const CL: &str = "C:/VS/VC/bin/amd64/cl.exe";

    #[rstest]
    #[case(false, 1)]
    #[case(true, 2)]
    fn matching_actions_merge_unless_single_pass(#[case] single_pass: bool, #[case] groups: usize) {
        let mut grouper = Grouper::new(single_pass);
        let mut arena = NodeArena::new();
        let mut tools = ToolResolver::new();
        let a = RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/a.obj" "src/a.cpp""#);
        let b = RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/b.obj" "src/b.cpp""#);
        add_action(&mut grouper, &mut arena, &mut tools, 0, &a);
        let last = add_action(&mut grouper, &mut arena, &mut tools, 1, &b);
        assert_eq!(arena.len(), groups);
        if !single_pass {
            let Some(NodeBody::Compile(group)) = arena.get(last).map(|n| &n.body) else {
                panic!("expected compile group");
            };
            assert_eq!(group.inputs.len(), 2);
        }
    }

    #[rstest]
    #[case::options(r#"/O2 /c /Fo"out/b.obj" "src/b.cpp""#, Vec::new())]
    #[case::directory(r#"/c /Fo"out2/b.obj" "src/b.cpp""#, Vec::new())]
    #[case::extension(r#"/c /Fo"out/b.o" "src/b.cpp""#, Vec::new())]
    #[case::prerequisites(r#"/c /Fo"out/b.obj" "src/b.cpp""#, vec!["b.h"])]
    fn differing_actions_stay_apart(#[case] args: &str, #[case] prerequisites: Vec<&str>) {
        let mut grouper = Grouper::new(false);
        let mut arena = NodeArena::new();
        let mut tools = ToolResolver::new();
        let a = RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/a.obj" "src/a.cpp""#);
        let b = prerequisites
            .into_iter()
            .fold(RawAction::new(ActionKind::Compile, CL, args), |action, path| {
                action.with_prerequisite(path, None)
            });
        add_action(&mut grouper, &mut arena, &mut tools, 0, &a);
        add_action(&mut grouper, &mut arena, &mut tools, 1, &b);
        assert_eq!(arena.len(), 2);
    }

    #[rstest]
    fn local_only_sticks_once_merged() {
        let mut grouper = Grouper::new(false);
        let mut arena = NodeArena::new();
        let mut tools = ToolResolver::new();
        let a = RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/a.obj" "src/a.cpp""#);
        let mut b = RawAction::new(ActionKind::Compile, CL, r#"/c /Fo"out/b.obj" "src/b.cpp""#);
        b.remote = false;
        add_action(&mut grouper, &mut arena, &mut tools, 0, &a);
        let id = add_action(&mut grouper, &mut arena, &mut tools, 1, &b);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(id).is_some_and(super::super::BuildNode::local_only));
    }
}

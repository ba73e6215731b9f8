//! Translation pipeline.
//!
//! Runs every stage between the raw action graph and the ordered node lists
//! handed to the script generator:
//!
//! 1. response-only argument strings are expanded in place;
//! 2. each action's tool is resolved and the action classified;
//! 3. compile actions are grouped, link actions become link or exec nodes,
//!    and everything else is set aside for local execution;
//! 4. explicit and response-file dependencies are resolved;
//! 5. nodes are ordered per phase.
//!
//! Any [`TranslateError`] aborts the pipeline before a script exists.

mod error;

pub use error::TranslateError;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::action::{ActionGraph, ActionId, ActionKind, RawAction};
use crate::classify::{Classification, LinkRejection, Mismatch, classify};
use crate::cmdline::{is_rooted, sole_response_reference};
use crate::graph::group::{Grouper, normalise};
use crate::graph::order::order_nodes;
use crate::graph::resolve::{link_explicit, resolve_implicit};
use crate::graph::{ExecNode, LinkNode, NodeArena, NodeBody, NodeId, NodeTag};
use crate::tool::ToolResolver;

/// Script phase executed by one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Object lists only.
    CompileObjects,
    /// Libraries, images and pass-through commands only.
    Link,
    /// Everything in one script.
    CompileAndLink,
}

impl Phase {
    /// Short name used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompileObjects => "objects",
            Self::Link => "link",
            Self::CompileAndLink => "all",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered nodes of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    /// Which phase the nodes belong to.
    pub phase: Phase,
    /// Nodes in dependency order.
    pub nodes: Vec<NodeId>,
}

/// Knobs that change how actions are translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Emit one combined compile and link phase without batching.
    pub single_pass: bool,
    /// Directory relative response file paths are resolved against.
    pub base_dir: Utf8PathBuf,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            single_pass: false,
            base_dir: Utf8PathBuf::from("."),
        }
    }
}

/// Counts reported once translation finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationSummary {
    /// Actions in the input graph.
    pub total: usize,
    /// Actions left for local execution.
    pub fallback: usize,
    /// Actions tagged neither compile nor link.
    pub misc: usize,
    /// Compile groups created.
    pub compile_groups: usize,
    /// Link nodes created.
    pub link_nodes: usize,
    /// Pass-through command nodes created.
    pub exec_nodes: usize,
}

/// Everything the generator and the scheduler need.
#[derive(Debug)]
pub struct Translation {
    /// All translated nodes.
    pub arena: NodeArena,
    /// Tools referenced by the nodes.
    pub tools: ToolResolver,
    /// Non-empty phases in execution order.
    pub phases: Vec<PhasePlan>,
    /// Actions rejected by the classifier, in input order.
    pub fallback: Vec<ActionId>,
    /// Node created for each translated action.
    pub action_nodes: HashMap<ActionId, NodeId>,
    /// Counts for the summary log line.
    pub summary: TranslationSummary,
}

/// Translate `graph` into ordered node lists.
///
/// # Errors
///
/// Returns a [`TranslateError`] for unknown tool platforms, ambiguous link
/// outputs, links without inputs, unreadable response files and dependency
/// cycles.
pub fn translate(graph: &ActionGraph, options: &TranslateOptions) -> Result<Translation, TranslateError> {
    let mut builder = Builder::new(options);
    for kind in [ActionKind::Compile, ActionKind::Link, ActionKind::Other] {
        for (id, action) in graph.iter().filter(|(_, a)| a.kind == kind) {
            builder.add(id, action)?;
        }
    }
    builder.finish(graph)
}

struct Builder<'a> {
    options: &'a TranslateOptions,
    arena: NodeArena,
    tools: ToolResolver,
    grouper: Grouper,
    action_nodes: HashMap<ActionId, NodeId>,
    fallback: Vec<ActionId>,
    summary: TranslationSummary,
}

impl<'a> Builder<'a> {
    fn new(options: &'a TranslateOptions) -> Self {
        Self {
            options,
            arena: NodeArena::new(),
            tools: ToolResolver::new(),
            grouper: Grouper::new(options.single_pass),
            action_nodes: HashMap::new(),
            fallback: Vec::new(),
            summary: TranslationSummary::default(),
        }
    }

    fn add(&mut self, id: ActionId, action: &RawAction) -> Result<(), TranslateError> {
        self.summary.total += 1;
        if action.kind == ActionKind::Other {
            self.summary.misc += 1;
            self.fallback.push(id);
            debug!(action = %id, "action left for local execution: not a compile or link step");
            return Ok(());
        }
        let args = expand_response_arguments(&action.arguments, &self.options.base_dir)?;
        let tool = self.tools.resolve_descriptor(&action.executable)?;
        let tool_id = tool.id;
        let node = match classify(action.kind, &args, tool) {
            Classification::Compile(shape) => {
                let canonical = normalise(&args, &shape);
                self.grouper.add(&mut self.arena, id, action, tool, canonical)
            }
            Classification::Link(shape) => self.arena.push(
                NodeTag::Link,
                NodeBody::Link(LinkNode::new(
                    tool_id,
                    args.into_owned(),
                    shape.output,
                    shape.import_library,
                    shape.inputs,
                    !action.remote,
                )),
            ),
            Classification::Exec => self.arena.push(
                NodeTag::Exec,
                NodeBody::Exec(ExecNode {
                    tool: tool_id,
                    arguments: args.into_owned(),
                    local_only: !action.remote,
                }),
            ),
            Classification::Unrecognized(Mismatch::Link(LinkRejection::MultipleOutputs(outputs))) => {
                return Err(TranslateError::MultipleOutputMatches { action: id, outputs });
            }
            Classification::Unrecognized(Mismatch::Link(LinkRejection::NoInputs)) => {
                return Err(TranslateError::NoRecognizedInput { action: id });
            }
            Classification::Unrecognized(reason) => {
                debug!(action = %id, ?reason, "action left for local execution");
                self.fallback.push(id);
                return Ok(());
            }
        };
        debug!(action = %id, node = %node.0, "translated action");
        self.action_nodes.insert(id, node);
        Ok(())
    }

    fn finish(mut self, graph: &ActionGraph) -> Result<Translation, TranslateError> {
        link_explicit(&mut self.arena, graph, &self.action_nodes);

        let mut compile_nodes = Vec::new();
        let mut link_nodes = Vec::new();
        for (id, node) in self.arena.iter() {
            match node.body {
                NodeBody::Compile(_) => {
                    self.summary.compile_groups += 1;
                    compile_nodes.push(id);
                }
                NodeBody::Link(_) => {
                    self.summary.link_nodes += 1;
                    link_nodes.push(id);
                }
                NodeBody::Exec(_) => {
                    self.summary.exec_nodes += 1;
                    link_nodes.push(id);
                }
            }
        }
        self.summary.fallback = self.fallback.len();

        let base_dir: &Utf8Path = &self.options.base_dir;
        let plans = if self.options.single_pass {
            let all: Vec<NodeId> = compile_nodes.into_iter().chain(link_nodes).collect();
            resolve_implicit(&mut self.arena, &all, base_dir)?;
            vec![(Phase::CompileAndLink, all)]
        } else {
            resolve_implicit(&mut self.arena, &link_nodes, base_dir)?;
            vec![(Phase::CompileObjects, compile_nodes), (Phase::Link, link_nodes)]
        };
        let mut phases = Vec::with_capacity(plans.len());
        for (phase, nodes) in plans.into_iter().filter(|(_, nodes)| !nodes.is_empty()) {
            phases.push(PhasePlan {
                phase,
                nodes: order_nodes(&self.arena, &nodes)?,
            });
        }

        let summary = self.summary;
        info!(
            total = summary.total,
            fallback = summary.fallback,
            misc = summary.misc,
            compile_groups = summary.compile_groups,
            link_nodes = summary.link_nodes,
            exec_nodes = summary.exec_nodes,
            "translated action graph"
        );
        Ok(Translation {
            arena: self.arena,
            tools: self.tools,
            phases,
            fallback: self.fallback,
            action_nodes: self.action_nodes,
            summary,
        })
    }
}

/// Replace an argument string that is nothing but `@"file"` with the file's
/// content, lines joined by spaces.
fn expand_response_arguments<'s>(args: &'s str, base_dir: &Utf8Path) -> Result<Cow<'s, str>, TranslateError> {
    let Some(reference) = sole_response_reference(args) else {
        return Ok(Cow::Borrowed(args));
    };
    let path = if is_rooted(reference) {
        Utf8PathBuf::from(reference)
    } else {
        base_dir.join(reference)
    };
    let content = fs::read_to_string(&path).map_err(|source| TranslateError::ResponseFileRead {
        path: path.clone(),
        source,
    })?;
    debug!(response = %path, "expanded response-only arguments");
    Ok(Cow::Owned(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
    ))
}

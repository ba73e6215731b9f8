//! Dependency resolution.
//!
//! Two passes add edges once every node exists:
//!
//! - [`link_explicit`] follows producer references between actions of the
//!   same kind.
//! - [`resolve_implicit`] scans the response files of link and exec nodes.
//!   Absolute lines that name another node's output become a dependency and
//!   a library input of the link; every other line is kept verbatim in a
//!   resolved copy written next to the original as `<file>.fbuild`.
//!
//! Both passes are idempotent: derived fields are recomputed from the
//! node's original arguments and edges are deduplicated on insertion.

use std::collections::HashMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use super::{LinkNode, NodeArena, NodeBody, NodeId};
use crate::action::{ActionGraph, ActionId};
use crate::classify::RESPONSE_EXTENSION;
use crate::cmdline::{has_extension, is_rooted, normalise_path, response_references, tokenize};
use crate::translate::TranslateError;

/// Suffix appended to a response file path to name its resolved copy.
pub const SIDECAR_SUFFIX: &str = ".fbuild";

/// Add an edge for every prerequisite produced by a translated action of the
/// same kind.
pub fn link_explicit<S: std::hash::BuildHasher>(
    arena: &mut NodeArena,
    graph: &ActionGraph,
    action_nodes: &HashMap<ActionId, NodeId, S>,
) {
    for (action_id, action) in graph.iter() {
        let Some(&node) = action_nodes.get(&action_id) else {
            continue;
        };
        for producer in action.producers() {
            let same_kind = graph.get(producer).is_some_and(|p| p.kind == action.kind);
            if let Some(&dep) = action_nodes.get(&producer)
                && same_kind
                && arena.add_dependency(node, dep)
            {
                debug!(node = %node.0, dependency = %dep.0, "explicit dependency");
            }
        }
    }
}

/// Output paths of the nodes in scope, first producer wins.
struct OutputIndex(HashMap<String, NodeId>);

impl OutputIndex {
    fn build(arena: &NodeArena, scope: &[NodeId]) -> Self {
        let mut index = HashMap::new();
        for &id in scope {
            for output in arena.get(id).map(super::BuildNode::outputs).unwrap_or_default() {
                index.entry(normalise_path(&output)).or_insert(id);
            }
        }
        Self(index)
    }

    /// Producer of `path` other than `consumer`.
    fn producer_of(&self, path: &str, consumer: NodeId) -> Option<NodeId> {
        self.0
            .get(&normalise_path(path))
            .copied()
            .filter(|producer| *producer != consumer)
    }
}

/// Result of scanning one response file.
#[derive(Debug, Default, PartialEq, Eq)]
struct ScannedResponse {
    producers: Vec<NodeId>,
    retained: Vec<String>,
}

fn scan_response(content: &str, index: &OutputIndex, consumer: NodeId) -> ScannedResponse {
    let mut scanned = ScannedResponse::default();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let candidate = line.replace('"', "");
        match Some(candidate)
            .filter(|c| is_rooted(c))
            .and_then(|c| index.producer_of(&c, consumer))
        {
            Some(producer) => {
                if !scanned.producers.contains(&producer) {
                    scanned.producers.push(producer);
                }
            }
            None => scanned.retained.push(line.to_owned()),
        }
    }
    scanned
}

fn locate(base_dir: &Utf8Path, path: &str) -> Utf8PathBuf {
    if is_rooted(path) {
        Utf8PathBuf::from(path)
    } else {
        base_dir.join(path)
    }
}

/// Read, scan and write the resolved copy of one response file.
fn process_response(
    base_dir: &Utf8Path,
    response: &str,
    index: &OutputIndex,
    consumer: NodeId,
) -> Result<(ScannedResponse, String), TranslateError> {
    let path = locate(base_dir, response);
    let content = fs::read_to_string(&path).map_err(|source| TranslateError::ResponseFileRead {
        path: path.clone(),
        source,
    })?;
    let scanned = scan_response(&content, index, consumer);
    let sidecar = format!("{response}{SIDECAR_SUFFIX}");
    let sidecar_path = locate(base_dir, &sidecar);
    let mut text = scanned.retained.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(&sidecar_path, text).map_err(|source| TranslateError::SidecarWrite {
        path: sidecar_path.clone(),
        source,
    })?;
    debug!(
        response = %path,
        matched = scanned.producers.len(),
        retained = scanned.retained.len(),
        "resolved response file"
    );
    Ok((scanned, sidecar))
}

/// Derived link fields computed by resolution.
struct LinkResolution {
    options: String,
    libraries: Vec<String>,
    dependencies: Vec<NodeId>,
}

fn resolve_link(
    arena: &NodeArena,
    id: NodeId,
    link: &LinkNode,
    index: &OutputIndex,
    base_dir: &Utf8Path,
) -> Result<LinkResolution, TranslateError> {
    let (responses, direct): (Vec<&String>, Vec<&String>) = link
        .inputs
        .iter()
        .partition(|input| has_extension(input, &[RESPONSE_EXTENSION]));
    let base = link.arguments.replace(link.output.as_str(), "%2");
    let mut dependencies: Vec<NodeId> = Vec::new();
    let mut direct_libraries = Vec::with_capacity(direct.len());
    for input in &direct {
        match index.producer_of(input, id) {
            Some(producer) if dependencies.contains(&producer) => {}
            Some(producer) => {
                dependencies.push(producer);
                direct_libraries.push(arena.alias(producer).unwrap_or_else(|| (*input).clone()));
            }
            None => direct_libraries.push((*input).clone()),
        }
    }
    match responses.as_slice() {
        [] => Ok(LinkResolution {
            options: substitute_direct_inputs(&base, &direct),
            libraries: direct_libraries,
            dependencies,
        }),
        [response] => {
            let (scanned, sidecar) = process_response(base_dir, response, index, id)?;
            let mut libraries = direct_libraries;
            for producer in scanned.producers {
                if dependencies.contains(&producer) {
                    continue;
                }
                dependencies.push(producer);
                libraries.extend(arena.alias(producer));
            }
            let options = drop_direct_inputs(&base, &direct).replace(response.as_str(), "%1");
            let (options, libraries) = if libraries.is_empty() {
                (options, vec![sidecar])
            } else {
                (options.replace("%1", &format!("{sidecar}\" \"%1")), libraries)
            };
            Ok(LinkResolution {
                options,
                libraries,
                dependencies,
            })
        }
        _ => Err(TranslateError::AmbiguousResponseInputs {
            node: arena.alias(id).unwrap_or_default(),
            inputs: responses.iter().map(|r| (*r).clone()).collect(),
        }),
    }
}

/// Replace the first direct input token with `"%1"` and drop the others.
fn substitute_direct_inputs(args: &str, direct: &[&String]) -> String {
    let Some(first) = direct.first() else {
        return args.to_owned();
    };
    let mut placed = false;
    rewrite_direct_inputs(args, direct, |value| {
        (!placed && value == first.as_str()).then(|| {
            placed = true;
            "\"%1\"".to_owned()
        })
    })
}

/// Drop every direct input token; the libraries reach the command line
/// through the response file's `%1` instead.
fn drop_direct_inputs(args: &str, direct: &[&String]) -> String {
    if direct.is_empty() {
        return args.to_owned();
    }
    rewrite_direct_inputs(args, direct, |_| None)
}

fn rewrite_direct_inputs<F>(args: &str, direct: &[&String], mut replace: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    tokenize(args)
        .iter()
        .filter_map(|token| match token.path_value() {
            Some(value) if !token.is_response_reference() && direct.iter().any(|d| d.as_str() == value) => {
                replace(value)
            }
            _ => Some(token.raw.to_owned()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scan response files of every link and exec node in `scope`, adding
/// edges to the scope nodes whose outputs they name.
///
/// Relative response paths are resolved against `base_dir`.
///
/// # Errors
///
/// Returns [`TranslateError::ResponseFileRead`] or
/// [`TranslateError::SidecarWrite`] on I/O failure, and
/// [`TranslateError::AmbiguousResponseInputs`] when a link reads more than
/// one response file.
pub fn resolve_implicit(
    arena: &mut NodeArena,
    scope: &[NodeId],
    base_dir: &Utf8Path,
) -> Result<(), TranslateError> {
    let index = OutputIndex::build(arena, scope);
    for &id in scope {
        let Some(node) = arena.get(id) else {
            continue;
        };
        match &node.body {
            NodeBody::Compile(_) => {}
            NodeBody::Link(link) => {
                let resolution = resolve_link(arena, id, link, &index, base_dir)?;
                for dep in resolution.dependencies {
                    arena.add_dependency(id, dep);
                }
                if let Some(NodeBody::Link(target)) = arena.get_mut(id).map(|n| &mut n.body) {
                    target.options = resolution.options;
                    target.libraries = resolution.libraries;
                }
            }
            NodeBody::Exec(exec) => {
                let mut dependencies = Vec::new();
                for response in response_references(&exec.arguments) {
                    let (scanned, _) = process_response(base_dir, &response, &index, id)?;
                    dependencies.extend(scanned.producers);
                }
                for dep in dependencies {
                    arena.add_dependency(id, dep);
                }
            }
        }
    }
    Ok(())
}

//! Translated build nodes.
//!
//! Nodes live in an index-addressed [`NodeArena`] and refer to each other by
//! [`NodeId`]. Dependencies are back-references only: a node never owns the
//! nodes it depends on. Each node carries an [`Alias`] that is unique across
//! the invocation and names the node inside the generated script.
//!
//! Submodules build and order the arena: [`group`] batches compile actions,
//! [`resolve`] adds explicit and response-file edges, and [`order`] sorts
//! nodes so dependencies come first.

mod cycle;
pub mod group;
pub mod order;
pub mod resolve;

use std::fmt;

use indexmap::IndexMap;

use crate::action::ActionId;
use crate::cmdline::normalise_path;
use crate::hasher::GroupKey;
use crate::tool::ToolId;

/// Stable handle of a node inside its [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Alias prefix identifying the record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    /// Batched object list.
    ObjectList,
    /// Static archive or dynamic image.
    Link,
    /// Opaque external command.
    Exec,
}

impl NodeTag {
    const fn prefix(self) -> &'static str {
        match self {
            Self::ObjectList => "ObjG",
            Self::Link => "DLL",
            Self::Exec => "Exec",
        }
    }
}

/// Unique script name of a node, e.g. `ObjG-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alias {
    /// Record type prefix.
    pub tag: NodeTag,
    /// Invocation-wide sequence number, starting at 1.
    pub index: usize,
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tag.prefix(), self.index)
    }
}

/// Precompiled header block of a compile group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PchBlock {
    /// Source compiled into the PCH.
    pub input: String,
    /// PCH file written by the compiler.
    pub output: String,
    /// Options used to build the PCH, with `%1`, `%2` and `%3` placeholders.
    pub options: String,
}

/// Compile actions sharing one option template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileGroup {
    /// Compiler.
    pub tool: ToolId,
    /// Option template with `%1` for the source and `%2` for the object.
    pub template: String,
    /// Object directory, trailing separator included.
    pub output_dir: String,
    /// Object extension, e.g. `.obj` or `.cpp.obj`.
    pub output_ext: String,
    /// Precompiled header block.
    pub pch: Option<PchBlock>,
    /// Source file contributed by each merged action.
    pub inputs: IndexMap<ActionId, String>,
    /// Grouping key shared by every merged action.
    pub key: GroupKey,
    /// Whether any contributing action must stay on the local machine.
    pub local_only: bool,
}

impl CompileGroup {
    /// Object file path produced for `input`.
    #[must_use]
    pub fn object_for(&self, input: &str) -> String {
        format!("{}{}{}", self.output_dir, file_stem(input), self.output_ext)
    }

    /// Sources compiled by the object list itself; the PCH source is built
    /// by the PCH block.
    pub fn compiled_inputs(&self) -> impl Iterator<Item = &str> {
        let pch_input = self.pch.as_ref().map(|p| p.input.as_str());
        self.inputs
            .values()
            .map(String::as_str)
            .filter(move |input| Some(*input) != pch_input)
    }
}

/// Whether a link node writes a static archive or a dynamic image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `.lib` or `.a`.
    StaticArchive,
    /// Anything else: `.dll`, `.exe`, `.self`, `.so`.
    DynamicImage,
}

impl LinkKind {
    /// Infer the kind from the output artefact.
    #[must_use]
    pub fn from_output(output: &str) -> Self {
        if crate::cmdline::has_extension(output, &[".lib", ".a"]) {
            Self::StaticArchive
        } else {
            Self::DynamicImage
        }
    }
}

/// One link or archive step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    /// Linker or librarian.
    pub tool: ToolId,
    /// Argument string as supplied.
    pub arguments: String,
    /// Linked artefact.
    pub output: String,
    /// Import library written next to a DLL.
    pub import_library: Option<String>,
    /// Allowed inputs in command-line order.
    pub inputs: Vec<String>,
    /// Static archive or dynamic image.
    pub kind: LinkKind,
    /// Whether the action must stay on the local machine.
    pub local_only: bool,
    /// Option template with `%1` for the inputs and `%2` for the output.
    pub options: String,
    /// Additional inputs: producer aliases or literal paths.
    pub libraries: Vec<String>,
}

impl LinkNode {
    /// Build an unresolved link node. Dependency resolution later rewrites
    /// [`LinkNode::options`] and [`LinkNode::libraries`].
    #[must_use]
    pub fn new(
        tool: ToolId,
        arguments: String,
        output: String,
        import_library: Option<String>,
        inputs: Vec<String>,
        local_only: bool,
    ) -> Self {
        let options = arguments.replace(output.as_str(), "%2");
        let kind = LinkKind::from_output(&output);
        let libraries = inputs.clone();
        Self {
            tool,
            arguments,
            output,
            import_library,
            inputs,
            kind,
            local_only,
            options,
            libraries,
        }
    }
}

/// Command the script runs without interpreting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecNode {
    /// Executable, possibly of unknown family.
    pub tool: ToolId,
    /// Opaque argument string.
    pub arguments: String,
    /// Whether the action must stay on the local machine.
    pub local_only: bool,
}

/// Variant payload of a [`BuildNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    /// Batched compile step.
    Compile(CompileGroup),
    /// Link or archive step.
    Link(LinkNode),
    /// Pass-through command.
    Exec(ExecNode),
}

/// A translated unit destined for the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildNode {
    /// Unique script name.
    pub alias: Alias,
    /// Variant payload.
    pub body: NodeBody,
    dependencies: Vec<NodeId>,
}

impl BuildNode {
    /// Tool invoked by this node.
    #[must_use]
    pub const fn tool(&self) -> ToolId {
        match &self.body {
            NodeBody::Compile(group) => group.tool,
            NodeBody::Link(link) => link.tool,
            NodeBody::Exec(exec) => exec.tool,
        }
    }

    /// Nodes this node depends on, in insertion order.
    #[must_use]
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Artefacts written by this node: objects, PCH files, link outputs and
    /// import libraries. Exec nodes declare none.
    #[must_use]
    pub fn outputs(&self) -> Vec<String> {
        match &self.body {
            NodeBody::Compile(group) => {
                let mut outputs: Vec<String> =
                    group.inputs.values().map(|input| group.object_for(input)).collect();
                if let Some(pch) = &group.pch {
                    outputs.push(pch.output.clone());
                }
                outputs
            }
            NodeBody::Link(link) => std::iter::once(link.output.clone())
                .chain(link.import_library.clone())
                .collect(),
            NodeBody::Exec(_) => Vec::new(),
        }
    }

    /// Whether this node writes `path`, comparing separators loosely.
    #[must_use]
    pub fn produces(&self, path: &str) -> bool {
        let wanted = normalise_path(path);
        self.outputs().iter().any(|out| normalise_path(out) == wanted)
    }

    /// Whether actions of this node must stay local.
    #[must_use]
    pub const fn local_only(&self) -> bool {
        match &self.body {
            NodeBody::Compile(group) => group.local_only,
            NodeBody::Link(link) => link.local_only,
            NodeBody::Exec(exec) => exec.local_only,
        }
    }
}

/// Index-addressed storage for every node of one invocation.
#[derive(Debug, Clone)]
pub struct NodeArena {
    nodes: Vec<BuildNode>,
    next_alias: usize,
}

impl Default for NodeArena {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            next_alias: 1,
        }
    }
}

impl NodeArena {
    /// Create an empty arena; the first alias index is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and assign it the next alias.
    pub fn push(&mut self, tag: NodeTag, body: NodeBody) -> NodeId {
        let id = NodeId(self.nodes.len());
        let alias = Alias {
            tag,
            index: self.next_alias,
        };
        self.next_alias += 1;
        self.nodes.push(BuildNode {
            alias,
            body,
            dependencies: Vec::new(),
        });
        id
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&BuildNode> {
        self.nodes.get(id.0)
    }

    /// Look up a node mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut BuildNode> {
        self.nodes.get_mut(id.0)
    }

    /// Alias of `id` as script text.
    #[must_use]
    pub fn alias(&self, id: NodeId) -> Option<String> {
        self.get(id).map(|node| node.alias.to_string())
    }

    /// Record that `from` depends on `to`.
    ///
    /// Returns `false` when the edge already exists, points at `from`
    /// itself, or names a node outside the arena.
    pub fn add_dependency(&mut self, from: NodeId, to: NodeId) -> bool {
        if from == to || self.get(to).is_none() {
            return false;
        }
        match self.get_mut(from) {
            Some(node) if !node.dependencies.contains(&to) => {
                node.dependencies.push(to);
                true
            }
            _ => false,
        }
    }

    /// Iterate nodes with their handles, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BuildNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// File name of `path` without its last extension.
fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.get(..idx).unwrap_or(name),
        _ => name,
    }
}

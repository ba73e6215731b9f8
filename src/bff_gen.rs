//! FASTBuild script generator.
//!
//! Converts the ordered nodes of one [`PhasePlan`] into `.bff` text. The
//! generator is a pure function of its inputs: the same nodes in the same
//! order always produce byte-identical output, which the engine's caching
//! relies on.
//!
//! A script holds, in order, the toolchain header, one `Compiler` record per
//! compiler used by the phase, one record per node, and the umbrella
//! `Alias` records (`ObjectsListsAlias`, `DLLListAlias` and `all`).

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::graph::{BuildNode, CompileGroup, ExecNode, LinkKind, LinkNode, NodeArena, NodeBody, NodeId};
use crate::tool::{Arch, ToolDescriptor, ToolFamily, ToolId, ToolResolver};
use crate::translate::{Phase, PhasePlan};

/// Umbrella alias over every object list.
pub const OBJECTS_ALIAS: &str = "ObjectsListsAlias";
/// Umbrella alias over every link and exec record.
pub const LINKS_ALIAS: &str = "DLLListAlias";
/// Default target built by the engine.
pub const ALL_ALIAS: &str = "all";

const RULE: &str = ";-------------------------------------------------------------------------------";

macro_rules! write_field {
    ($f:expr, $key:expr, $value:expr) => {
        writeln!($f, "    .{} = {}", $key, Quoted($value))?
    };
}

macro_rules! write_list {
    ($f:expr, $key:expr, $items:expr) => {{
        let items = quoted_list($items);
        if !items.is_empty() {
            writeln!($f, "    .{} = {{ {} }}", $key, items)?;
        }
    }};
}

fn quoted_list<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| Quoted(item.as_ref()).to_string())
        .join(", ")
}

/// Toolchain locations and switches baked into every script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSettings {
    /// Visual C++ directory, bound to `$VSBasePath$`.
    pub vs_base_path: String,
    /// Windows 8.1 SDK directory, bound to `$WindowsSDKBasePath$`.
    pub windows_sdk_base_path: String,
    /// Windows 10 SDK directory.
    pub windows10_sdk_base_path: String,
    /// Windows 8.1 SDK library version, e.g. `winv6.3`.
    pub windows8_sdk_version: String,
    /// Windows 10 SDK version, e.g. `10.0.14393.0`.
    pub windows10_sdk_version: String,
    /// MSVC toolset number used in runtime DLL names, e.g. `140`.
    pub msvc_toolset: String,
    /// Append `$BaseIncludePaths$` and `$BaseLibraryPaths…$` to options.
    pub force_base_include_paths: bool,
    /// Appended to every compile template.
    pub extra_compiler_options: String,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            vs_base_path: "External/VS14.0/VC".into(),
            windows_sdk_base_path: "External/Windows8.1".into(),
            windows10_sdk_base_path: "External/Windows10".into(),
            windows8_sdk_version: "winv6.3".into(),
            windows10_sdk_version: "10.0.14393.0".into(),
            msvc_toolset: "140".into(),
            force_base_include_paths: false,
            extra_compiler_options: String::new(),
        }
    }
}

/// Generate the script for one phase.
///
/// # Examples
///
/// ```
/// use kumiki::bff_gen::{generate, ScriptSettings};
/// use kumiki::graph::NodeArena;
/// use kumiki::tool::ToolResolver;
/// use kumiki::translate::{Phase, PhasePlan};
///
/// let plan = PhasePlan { phase: Phase::Link, nodes: Vec::new() };
/// let text = generate(&NodeArena::new(), &ToolResolver::new(), &plan, &ScriptSettings::default());
/// assert!(text.starts_with(";---"));
/// assert!(!text.contains("Alias("));
/// ```
#[must_use]
pub fn generate(arena: &NodeArena, tools: &ToolResolver, plan: &PhasePlan, settings: &ScriptSettings) -> String {
    Script {
        arena,
        tools,
        plan,
        settings,
    }
    .to_string()
}

/// Escape `text` for a single-quoted script string.
///
/// `^` and `'` are escaped with `^`. A `$` is escaped unless it opens a
/// `$Name$` variable reference.
///
/// # Examples
///
/// ```
/// use kumiki::bff_gen::escape;
///
/// assert_eq!(escape("it's $VSBasePath$/bin"), "it^'s $VSBasePath$/bin");
/// assert_eq!(escape("cost: 5$"), "cost: 5^$");
/// ```
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        let width = ch.len_utf8();
        match ch {
            '^' | '\'' => {
                out.push('^');
                out.push(ch);
            }
            '$' => {
                if let Some(var) = variable_reference(rest) {
                    out.push_str(var);
                    rest = rest.get(var.len()..).unwrap_or("");
                    continue;
                }
                out.push_str("^$");
            }
            _ => out.push(ch),
        }
        rest = rest.get(width..).unwrap_or("");
    }
    out
}

/// The `$Name$` reference at the start of `text`, if any.
fn variable_reference(text: &str) -> Option<&str> {
    let body = text.strip_prefix('$')?;
    let end = body.find('$')?;
    let name = body.get(..end)?;
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| text.get(..end + 2)).flatten()
}

struct Quoted<'a>(&'a str);

impl Display for Quoted<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", escape(self.0))
    }
}

struct Script<'a> {
    arena: &'a NodeArena,
    tools: &'a ToolResolver,
    plan: &'a PhasePlan,
    settings: &'a ScriptSettings,
}

impl Script<'_> {
    fn nodes(&self) -> impl Iterator<Item = &BuildNode> {
        self.plan.nodes.iter().filter_map(|id| self.arena.get(*id))
    }

    fn compilers(&self) -> Vec<&ToolDescriptor> {
        self.nodes()
            .filter_map(|node| match &node.body {
                NodeBody::Compile(group) => Some(group.tool),
                _ => None,
            })
            .unique()
            .sorted()
            .filter_map(|id: ToolId| self.tools.get(id))
            .collect()
    }

    fn aliases(&self, compile: bool) -> Vec<String> {
        self.nodes()
            .filter(|node| matches!(node.body, NodeBody::Compile(_)) == compile)
            .map(|node| node.alias.to_string())
            .collect()
    }
}

impl Display for Script<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Header(self.settings))?;
        if self.plan.phase != Phase::Link {
            for tool in self.compilers() {
                write!(
                    f,
                    "{}",
                    CompilerRecord {
                        tool,
                        toolset: &self.settings.msvc_toolset,
                    }
                )?;
            }
        }
        let members: HashSet<NodeId> = self.plan.nodes.iter().copied().collect();
        for node in self.nodes() {
            write!(
                f,
                "{}",
                NodeRecord {
                    node,
                    arena: self.arena,
                    tools: self.tools,
                    members: &members,
                    settings: self.settings,
                }
            )?;
        }
        let mut umbrella = Vec::new();
        for (name, targets) in [(OBJECTS_ALIAS, self.aliases(true)), (LINKS_ALIAS, self.aliases(false))] {
            if !targets.is_empty() {
                write!(f, "{}", AliasRecord { name, targets: &targets })?;
                umbrella.push(name.to_owned());
            }
        }
        if !umbrella.is_empty() {
            write!(
                f,
                "{}",
                AliasRecord {
                    name: ALL_ALIAS,
                    targets: &umbrella,
                }
            )?;
        }
        Ok(())
    }
}

struct Header<'a>(&'a ScriptSettings);

impl Display for Header<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "{RULE}\n; Windows Platform\n{RULE}")?;
        writeln!(f, ".VSBasePath = {}", Quoted(&s.vs_base_path))?;
        writeln!(f, ".WindowsSDKBasePath = {}", Quoted(&s.windows_sdk_base_path))?;
        writeln!(f, ".Windows8SDKVersion = {}", Quoted(&s.windows8_sdk_version))?;
        writeln!(f, ".Windows10SDKVersion = {}", Quoted(&s.windows10_sdk_version))?;
        writeln!(
            f,
            ".WindowsUMLibraryPath = {}",
            Quoted(&format!("{}/lib/$Windows8SDKVersion$/um", s.windows_sdk_base_path))
        )?;
        writeln!(
            f,
            ".WindowsUCRTBasePath = {}",
            Quoted(&format!("{}/include/$Windows10SDKVersion$/ucrt", s.windows10_sdk_base_path))
        )?;
        writeln!(
            f,
            ".WindowsUCRTLibraryPath = {}",
            Quoted(&format!("{}/lib/$Windows10SDKVersion$/ucrt", s.windows10_sdk_base_path))
        )?;
        writeln!(f, "{RULE}\n; Base (library) includes\n{RULE}")?;
        write_concat(
            f,
            "BaseIncludePaths",
            &[
                " /I\"$VSBasePath$/include/\"",
                " /I\"$VSBasePath$/atlmfc/include/\"",
                " /I\"$WindowsSDKBasePath$/include/um/\"",
                " /I\"$WindowsSDKBasePath$/include/shared/\"",
                " /I\"$WindowsSDKBasePath$/include/winrt/\"",
                " /I\"$WindowsUCRTBasePath$/\"",
            ],
        )?;
        writeln!(f, "{RULE}\n; Base (library) directories\n{RULE}")?;
        write_concat(
            f,
            "BaseLibraryPathsx86",
            &[
                " /LIBPATH:\"$VSBasePath$/lib/\"",
                " /LIBPATH:\"$WindowsUMLibraryPath$/x86/\"",
                " /LIBPATH:\"$WindowsUCRTLibraryPath$/x86/\"",
            ],
        )?;
        write_concat(
            f,
            "BaseLibraryPathsx64",
            &[
                " /LIBPATH:\"$VSBasePath$/lib/amd64/\"",
                " /LIBPATH:\"$WindowsUMLibraryPath$/x64/\"",
                " /LIBPATH:\"$WindowsUCRTLibraryPath$/x64/\"",
            ],
        )?;
        writeln!(f)
    }
}

/// Write `.name = 'a' + 'b' ...` with one operand per line.
fn write_concat(f: &mut Formatter<'_>, name: &str, parts: &[&str]) -> fmt::Result {
    let mut iter = parts.iter();
    if let Some(first) = iter.next() {
        writeln!(f, ".{name} = {}", Quoted(first))?;
    }
    let pad = " ".repeat(name.len() + 2);
    for part in iter {
        writeln!(f, "{pad}+ {}", Quoted(part))?;
    }
    Ok(())
}

struct CompilerRecord<'a> {
    tool: &'a ToolDescriptor,
    toolset: &'a str,
}

impl CompilerRecord<'_> {
    fn extra_files(&self) -> Vec<String> {
        if self.tool.family != ToolFamily::MsvcCompiler {
            return Vec::new();
        }
        let dir = self.tool.exec_dir();
        let t = self.toolset;
        [
            "1033/clui.dll".to_owned(),
            "c1xx.dll".to_owned(),
            "c2.dll".to_owned(),
            "c1.dll".to_owned(),
            format!("msobj{t}.dll"),
            format!("mspdb{t}.dll"),
            "mspdbsrv.exe".to_owned(),
            "mspdbcore.dll".to_owned(),
            format!("mspft{t}.dll"),
        ]
        .into_iter()
        .map(|file| format!("{dir}/{file}"))
        .collect()
    }
}

impl Display for CompilerRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let alias = self.tool.compiler_alias.as_deref().unwrap_or_default();
        writeln!(f, "Compiler({})\n{{", Quoted(alias))?;
        write_field!(f, "Executable", &self.tool.exec_path);
        write_list!(f, "ExtraFiles", self.extra_files());
        writeln!(f, "}}\n")
    }
}

struct AliasRecord<'a> {
    name: &'a str,
    targets: &'a [String],
}

impl Display for AliasRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Alias({})\n{{", Quoted(self.name))?;
        write_list!(f, "Targets", self.targets);
        writeln!(f, "}}\n")
    }
}

struct NodeRecord<'a> {
    node: &'a BuildNode,
    arena: &'a NodeArena,
    tools: &'a ToolResolver,
    members: &'a HashSet<NodeId>,
    settings: &'a ScriptSettings,
}

impl NodeRecord<'_> {
    fn exec_path(&self, id: ToolId) -> &str {
        self.tools.get(id).map_or("", |t| t.exec_path.as_str())
    }

    fn dependencies(&self) -> Vec<String> {
        self.node
            .dependencies()
            .iter()
            .filter(|dep| self.members.contains(dep))
            .filter_map(|dep| self.arena.alias(*dep))
            .collect()
    }

    fn write_compile(&self, f: &mut Formatter<'_>, group: &CompileGroup) -> fmt::Result {
        let tool = self.tools.get(group.tool);
        let msvc = tool.is_some_and(|t| t.family == ToolFamily::MsvcCompiler);
        let mut suffix = String::new();
        if !self.settings.extra_compiler_options.is_empty() {
            suffix.push(' ');
            suffix.push_str(&self.settings.extra_compiler_options);
        }
        if self.settings.force_base_include_paths && msvc {
            suffix.push_str(" $BaseIncludePaths$");
        }
        writeln!(f, "ObjectList({})\n{{", Quoted(&self.node.alias.to_string()))?;
        write_field!(
            f,
            "Compiler",
            tool.and_then(|t| t.compiler_alias.as_deref()).unwrap_or_default()
        );
        write_list!(f, "CompilerInputFiles", group.compiled_inputs());
        write_field!(f, "CompilerOutputPath", &group.output_dir);
        write_field!(f, "CompilerOutputExtension", &group.output_ext);
        write_field!(f, "CompilerOptions", &format!("{}{suffix}", group.template));
        if let Some(pch) = &group.pch {
            write_field!(f, "PCHInputFile", &pch.input);
            write_field!(f, "PCHOutputFile", &pch.output);
            write_field!(f, "PCHOptions", &format!("{}{suffix}", pch.options));
        }
        if group.local_only {
            writeln!(f, "    .AllowDistribution = false")?;
        }
        Ok(())
    }

    fn library_paths(&self, tool: ToolId) -> &'static str {
        if !self.settings.force_base_include_paths {
            return "";
        }
        match self.tools.get(tool).map(|t| t.arch) {
            Some(Arch::Amd64) => " $BaseLibraryPathsx64$",
            Some(Arch::X86) => " $BaseLibraryPathsx86$",
            _ => "",
        }
    }

    fn write_link(&self, f: &mut Formatter<'_>, link: &LinkNode) -> fmt::Result {
        let alias = self.node.alias.to_string();
        let options = format!("{}{}", link.options, self.library_paths(link.tool));
        match link.kind {
            LinkKind::StaticArchive => {
                writeln!(f, "Library({})\n{{", Quoted(&alias))?;
                write_field!(f, "Compiler", "Null");
                write_field!(f, "CompilerOptions", "%1 %2 %3");
                write_field!(f, "CompilerOutputPath", " ");
                write_field!(f, "Librarian", self.exec_path(link.tool));
                write_field!(f, "LibrarianOutput", &link.output);
                write_field!(f, "LibrarianOptions", &options);
                write_list!(f, "LibrarianAdditionalInputs", &link.libraries);
            }
            LinkKind::DynamicImage => {
                writeln!(f, "DLL({})\n{{", Quoted(&alias))?;
                writeln!(f, "    .LinkerLinkObjects = false")?;
                write_field!(f, "Linker", self.exec_path(link.tool));
                write_field!(f, "LinkerOutput", &link.output);
                write_field!(f, "LinkerOptions", &options);
                write_list!(f, "Libraries", &link.libraries);
            }
        }
        Ok(())
    }

    fn write_exec(&self, f: &mut Formatter<'_>, exec: &ExecNode) -> fmt::Result {
        let alias = self.node.alias.to_string();
        writeln!(f, "Exec({})\n{{", Quoted(&alias))?;
        write_field!(f, "ExecExecutable", self.exec_path(exec.tool));
        write_field!(f, "ExecArguments", &exec.arguments);
        write_field!(f, "ExecOutput", &format!("{alias}.stdout"));
        writeln!(f, "    .ExecUseStdOutAsOutput = true")?;
        Ok(())
    }
}

impl Display for NodeRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.node.body {
            NodeBody::Compile(group) => self.write_compile(f, group)?,
            NodeBody::Link(link) => self.write_link(f, link)?,
            NodeBody::Exec(exec) => self.write_exec(f, exec)?,
        }
        write_list!(f, "PreBuildDependencies", self.dependencies());
        writeln!(f, "}}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionId;
    use crate::graph::{NodeTag, PchBlock};
    use crate::hasher::{GroupKeyHasher, GroupKeyInput};
    use indexmap::IndexMap;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("a'b", "a^'b")]
    #[case("a^b", "a^^b")]
    #[case("$VSBasePath$/bin", "$VSBasePath$/bin")]
    #[case("$not a var$", "^$not a var^$")]
    #[case("$", "^$")]
    #[case("$$", "^$^$")]
    fn escapes_script_strings(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape(input), expected);
    }

    fn fixture() -> (NodeArena, ToolResolver, PhasePlan) {
        let mut tools = ToolResolver::new();
        let cl = tools.resolve(r"C:\VS\VC\bin\amd64\cl.exe").expect("cl");
        let link = tools.resolve(r"C:\VS\VC\bin\amd64\link.exe").expect("link");
        let mut arena = NodeArena::new();
        let mut inputs = IndexMap::new();
        inputs.insert(ActionId(0), "pch.cpp".to_owned());
        inputs.insert(ActionId(1), "a.cpp".to_owned());
        let key = GroupKeyHasher::hash(&GroupKeyInput {
            template: "",
            output_dir: "",
            output_ext: "",
            tool: "",
            pch: None,
            prerequisites: Vec::new(),
        });
        let objects = arena.push(
            NodeTag::ObjectList,
            NodeBody::Compile(CompileGroup {
                tool: cl,
                template: r#"/c /Yu"pch.h" /Fo"%2" %1"#.into(),
                output_dir: "out/".into(),
                output_ext: ".obj".into(),
                pch: Some(PchBlock {
                    input: "pch.cpp".into(),
                    output: "out/pch.pch".into(),
                    options: r#"/c /Yc"pch.h" /Fp"%2" /Fo"%3" %1"#.into(),
                }),
                inputs,
                key,
                local_only: true,
            }),
        );
        let mut node = LinkNode::new(
            link,
            r#"/OUT:"bin/x.dll" out/a.obj"#.into(),
            "bin/x.dll".into(),
            None,
            vec!["out/a.obj".into()],
            false,
        );
        node.options = r#"/OUT:"%2" "%1""#.into();
        node.libraries = vec!["ObjG-1".into()];
        let dll = arena.push(NodeTag::Link, NodeBody::Link(node));
        arena.add_dependency(dll, objects);
        let plan = PhasePlan {
            phase: Phase::CompileAndLink,
            nodes: vec![objects, dll],
        };
        (arena, tools, plan)
    }

    #[rstest]
    fn generates_records_in_order() {
        let (arena, tools, plan) = fixture();
        let text = generate(&arena, &tools, &plan, &ScriptSettings::default());
        let body = text.split_once("Compiler('Compiler-0')").map(|(_, b)| b).expect("compiler record");
        let expected = concat!(
            "\n{\n",
            "    .Executable = '$VSBasePath$/bin/amd64/cl.exe'\n",
            "    .ExtraFiles = { '$VSBasePath$/bin/amd64/1033/clui.dll', ",
            "'$VSBasePath$/bin/amd64/c1xx.dll', '$VSBasePath$/bin/amd64/c2.dll', ",
            "'$VSBasePath$/bin/amd64/c1.dll', '$VSBasePath$/bin/amd64/msobj140.dll', ",
            "'$VSBasePath$/bin/amd64/mspdb140.dll', '$VSBasePath$/bin/amd64/mspdbsrv.exe', ",
            "'$VSBasePath$/bin/amd64/mspdbcore.dll', '$VSBasePath$/bin/amd64/mspft140.dll' }\n",
            "}\n\n",
            "ObjectList('ObjG-1')\n{\n",
            "    .Compiler = 'Compiler-0'\n",
            "    .CompilerInputFiles = { 'a.cpp' }\n",
            "    .CompilerOutputPath = 'out/'\n",
            "    .CompilerOutputExtension = '.obj'\n",
            "    .CompilerOptions = '/c /Yu\"pch.h\" /Fo\"%2\" %1'\n",
            "    .PCHInputFile = 'pch.cpp'\n",
            "    .PCHOutputFile = 'out/pch.pch'\n",
            "    .PCHOptions = '/c /Yc\"pch.h\" /Fp\"%2\" /Fo\"%3\" %1'\n",
            "    .AllowDistribution = false\n",
            "}\n\n",
            "DLL('DLL-2')\n{\n",
            "    .LinkerLinkObjects = false\n",
            "    .Linker = '$VSBasePath$/bin/amd64/link.exe'\n",
            "    .LinkerOutput = 'bin/x.dll'\n",
            "    .LinkerOptions = '/OUT:\"%2\" \"%1\"'\n",
            "    .Libraries = { 'ObjG-1' }\n",
            "    .PreBuildDependencies = { 'ObjG-1' }\n",
            "}\n\n",
            "Alias('ObjectsListsAlias')\n{\n",
            "    .Targets = { 'ObjG-1' }\n",
            "}\n\n",
            "Alias('DLLListAlias')\n{\n",
            "    .Targets = { 'DLL-2' }\n",
            "}\n\n",
            "Alias('all')\n{\n",
            "    .Targets = { 'ObjectsListsAlias', 'DLLListAlias' }\n",
            "}\n\n",
        );
        assert_eq!(body, expected);
    }

    #[rstest]
    fn header_binds_toolchain_variables() {
        let (arena, tools, plan) = fixture();
        let settings = ScriptSettings {
            vs_base_path: "D:/FB/External/VS14.0/VC".into(),
            ..ScriptSettings::default()
        };
        let text = generate(&arena, &tools, &plan, &settings);
        assert!(text.contains(".VSBasePath = 'D:/FB/External/VS14.0/VC'\n"));
        assert!(text.contains(".WindowsUMLibraryPath = 'External/Windows8.1/lib/$Windows8SDKVersion$/um'\n"));
        assert!(text.contains(".BaseLibraryPathsx64 = ' /LIBPATH:\"$VSBasePath$/lib/amd64/\"'\n"));
    }

    #[rstest]
    fn forced_base_paths_extend_options() {
        let (arena, tools, plan) = fixture();
        let settings = ScriptSettings {
            force_base_include_paths: true,
            extra_compiler_options: "/DKUMIKI=1".into(),
            ..ScriptSettings::default()
        };
        let text = generate(&arena, &tools, &plan, &settings);
        assert!(text.contains("    .CompilerOptions = '/c /Yu\"pch.h\" /Fo\"%2\" %1 /DKUMIKI=1 $BaseIncludePaths$'\n"));
        assert!(text.contains("    .LinkerOptions = '/OUT:\"%2\" \"%1\" $BaseLibraryPathsx64$'\n"));
    }

    #[rstest]
    fn link_phase_skips_compilers_and_foreign_dependencies() {
        let (arena, tools, mut plan) = fixture();
        plan.phase = Phase::Link;
        plan.nodes.remove(0);
        let text = generate(&arena, &tools, &plan, &ScriptSettings::default());
        assert!(!text.contains("Compiler("));
        assert!(!text.contains("PreBuildDependencies"));
        assert!(text.contains("Alias('all')\n{\n    .Targets = { 'DLLListAlias' }\n}\n"));
    }

    #[rstest]
    fn generation_is_deterministic() {
        let (arena, tools, plan) = fixture();
        let settings = ScriptSettings::default();
        assert_eq!(
            generate(&arena, &tools, &plan, &settings),
            generate(&arena, &tools, &plan, &settings)
        );
    }
}

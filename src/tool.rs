//! Tool identity resolution.
//!
//! Every executable referenced by an action is classified once per
//! invocation into a [`ToolDescriptor`]: its family, target architecture and
//! a relocatable path using the script's `$Name$` variables. The
//! [`ToolResolver`] owns the cache, so separate invocations never share
//! state.

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

/// Family of a compiler, linker or librarian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    /// `cl.exe`.
    MsvcCompiler,
    /// `rc.exe`, the Windows resource compiler.
    ResourceCompiler,
    /// `clang`, `clang++` or `clang-cl`.
    ClangCompiler,
    /// `orbis-clang.exe`, which both compiles and links.
    OrbisClang,
    /// `orbis-snarl.exe`, the console archiver.
    OrbisSnarl,
    /// `link.exe`.
    MsvcLinker,
    /// `lib.exe`.
    MsvcLibrarian,
    /// Anything else. Only usable as an opaque command.
    Unknown,
}

/// How the output artefact of a tool is spelled on its command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMarker {
    /// A switch immediately followed by a quoted path, e.g. `/Fo"a.obj"`.
    Switch(&'static str),
    /// Any non-switch token carrying one of the allowed output extensions.
    BareExtension,
}

/// Which tokens a linker accepts as inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInputStyle {
    /// Plain paths and `@` response file references.
    AnyToken,
    /// Only `@` response file references; bare paths are outputs.
    ResponseOnly,
}

/// Plain-data description of a family's command-line conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyPatterns {
    /// Marker for the compiled or linked output.
    pub output: Option<OutputMarker>,
    /// Marker for the precompiled header output.
    pub pch_output: Option<&'static str>,
    /// Marker for the import library written next to a DLL.
    pub import_library: Option<&'static str>,
    /// Input token style when acting as a linker.
    pub link_inputs: LinkInputStyle,
    /// Extensions accepted as link inputs.
    pub link_input_extensions: &'static [&'static str],
    /// Extensions accepted as link outputs.
    pub link_output_extensions: &'static [&'static str],
}

const MSVC_LINK_INPUTS: &[&str] = &[".response", ".lib", ".obj"];
const MSVC_LINK_OUTPUTS: &[&str] = &[".dll", ".lib", ".exe"];
const ORBIS_LINK_INPUTS: &[&str] = &[".response", ".a"];
const ORBIS_LINK_OUTPUTS: &[&str] = &[".self", ".a", ".so"];

const fn compiler_patterns(output: &'static str) -> FamilyPatterns {
    FamilyPatterns {
        output: Some(OutputMarker::Switch(output)),
        pch_output: Some("/Fp"),
        import_library: None,
        link_inputs: LinkInputStyle::AnyToken,
        link_input_extensions: &[],
        link_output_extensions: &[],
    }
}

impl ToolFamily {
    /// Identify a family from an executable path.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let name = file_name(path).to_ascii_lowercase();
        let stem = name.strip_suffix(".exe").unwrap_or(&name);
        match stem {
            "cl" => Self::MsvcCompiler,
            "rc" => Self::ResourceCompiler,
            "link" => Self::MsvcLinker,
            "lib" => Self::MsvcLibrarian,
            "orbis-clang" => Self::OrbisClang,
            "orbis-snarl" => Self::OrbisSnarl,
            "clang" | "clang++" | "clang-cl" => Self::ClangCompiler,
            _ => Self::Unknown,
        }
    }

    /// Whether actions using this tool can become compile groups.
    #[must_use]
    pub const fn is_compiler(self) -> bool {
        matches!(
            self,
            Self::MsvcCompiler | Self::ResourceCompiler | Self::ClangCompiler | Self::OrbisClang
        )
    }

    /// Whether actions using this tool can become link nodes.
    #[must_use]
    pub const fn is_linker(self) -> bool {
        matches!(
            self,
            Self::MsvcLinker | Self::MsvcLibrarian | Self::OrbisClang | Self::OrbisSnarl
        )
    }

    /// Whether the family ships with the MSVC toolchain.
    #[must_use]
    pub const fn is_msvc(self) -> bool {
        matches!(self, Self::MsvcCompiler | Self::MsvcLinker | Self::MsvcLibrarian)
    }

    /// Command-line conventions for this family.
    #[must_use]
    pub const fn patterns(self) -> FamilyPatterns {
        match self {
            Self::MsvcCompiler | Self::ResourceCompiler => compiler_patterns("/Fo"),
            Self::ClangCompiler => compiler_patterns("-o"),
            Self::OrbisClang => FamilyPatterns {
                output: Some(OutputMarker::Switch("-o")),
                pch_output: Some("/Fp"),
                import_library: None,
                link_inputs: LinkInputStyle::AnyToken,
                link_input_extensions: ORBIS_LINK_INPUTS,
                link_output_extensions: ORBIS_LINK_OUTPUTS,
            },
            Self::OrbisSnarl => FamilyPatterns {
                output: Some(OutputMarker::BareExtension),
                pch_output: None,
                import_library: None,
                link_inputs: LinkInputStyle::ResponseOnly,
                link_input_extensions: ORBIS_LINK_INPUTS,
                link_output_extensions: ORBIS_LINK_OUTPUTS,
            },
            Self::MsvcLinker | Self::MsvcLibrarian => FamilyPatterns {
                output: Some(OutputMarker::Switch("/OUT:")),
                pch_output: None,
                import_library: Some("/IMPLIB:"),
                link_inputs: LinkInputStyle::AnyToken,
                link_input_extensions: MSVC_LINK_INPUTS,
                link_output_extensions: MSVC_LINK_OUTPUTS,
            },
            Self::Unknown => FamilyPatterns {
                output: None,
                pch_output: None,
                import_library: None,
                link_inputs: LinkInputStyle::AnyToken,
                link_input_extensions: &[],
                link_output_extensions: &[],
            },
        }
    }
}

/// Target architecture of a toolchain binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86.
    Amd64,
    /// 32-bit x86.
    X86,
    /// Not inferable; only permitted for [`ToolFamily::Unknown`].
    Unknown,
}

impl Arch {
    /// Infer the architecture from architecture tokens in a path.
    #[must_use]
    pub fn detect(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.contains("amd64") || lower.contains("x64") {
            Self::Amd64
        } else if lower.contains("x86") {
            Self::X86
        } else {
            Self::Unknown
        }
    }
}

/// Stable handle of a descriptor inside a [`ToolResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolId(pub usize);

/// Resolved identity of one executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Handle within the owning resolver.
    pub id: ToolId,
    /// Path as supplied by the action.
    pub raw_path: String,
    /// Relocatable path, rooted at a `$Name$` variable when possible.
    pub exec_path: String,
    /// Tool family.
    pub family: ToolFamily,
    /// Target architecture.
    pub arch: Arch,
    /// Script alias of the compiler record, for compiler families.
    pub compiler_alias: Option<String>,
}

impl ToolDescriptor {
    /// Directory holding the executable, using the relocatable path.
    #[must_use]
    pub fn exec_dir(&self) -> &str {
        self.exec_path
            .rfind(['/', '\\'])
            .and_then(|idx| self.exec_path.get(..idx))
            .unwrap_or("")
    }
}

/// Errors raised while resolving a tool.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// A known toolchain binary lives under a path with no architecture
    /// token. The script format needs an explicit architecture.
    #[error("cannot infer target architecture from tool path {path}")]
    #[diagnostic(
        code(kumiki::tool::unknown_platform),
        help("toolchain binaries must live under an amd64, x64 or x86 directory")
    )]
    UnknownPlatform {
        /// Offending executable path.
        path: String,
    },
}

/// Per-invocation cache of tool descriptors keyed by raw path.
#[derive(Debug, Default)]
pub struct ToolResolver {
    tools: IndexMap<String, ToolDescriptor>,
    compilers: usize,
}

impl ToolResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `path`, reusing a cached descriptor when present.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownPlatform`] when a recognised toolchain
    /// binary carries no architecture token in its path.
    pub fn resolve(&mut self, path: &str) -> Result<ToolId, ToolError> {
        self.resolve_descriptor(path).map(|tool| tool.id)
    }

    /// Resolve `path` and borrow its descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`ToolResolver::resolve`].
    pub fn resolve_descriptor(&mut self, path: &str) -> Result<&ToolDescriptor, ToolError> {
        let vacant = match self.tools.entry(path.to_owned()) {
            Entry::Occupied(existing) => return Ok(existing.into_mut()),
            Entry::Vacant(vacant) => vacant,
        };
        let family = ToolFamily::from_path(path);
        let arch = Arch::detect(path);
        if arch == Arch::Unknown && family != ToolFamily::Unknown {
            return Err(ToolError::UnknownPlatform {
                path: path.to_owned(),
            });
        }
        let compiler_alias = family.is_compiler().then(|| {
            let alias = format!("Compiler-{}", self.compilers);
            self.compilers += 1;
            alias
        });
        let descriptor = ToolDescriptor {
            id: ToolId(vacant.index()),
            raw_path: path.to_owned(),
            exec_path: localise_tool_path(path, family),
            family,
            arch,
            compiler_alias,
        };
        debug!(tool = path, ?family, ?arch, "resolved tool");
        Ok(vacant.insert(descriptor))
    }

    /// Look up a descriptor by handle.
    #[must_use]
    pub fn get(&self, id: ToolId) -> Option<&ToolDescriptor> {
        self.tools.get_index(id.0).map(|(_, tool)| tool)
    }

    /// Iterate descriptors in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Display for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.raw_path, self.family, self.arch)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Rewrite an absolute toolchain path relative to its symbolic root.
///
/// MSVC binaries are rebased on the `VC` directory as `$VSBasePath$`, the
/// resource compiler on the `8.1` SDK directory as `$WindowsSDKBasePath$`.
/// Paths without the marker segment are returned unchanged.
///
/// # Examples
///
/// ```
/// use kumiki::tool::{localise_tool_path, ToolFamily};
///
/// let path = r"C:\VS\VC\bin\amd64\cl.exe";
/// assert_eq!(
///     localise_tool_path(path, ToolFamily::MsvcCompiler),
///     "$VSBasePath$/bin/amd64/cl.exe"
/// );
/// ```
#[must_use]
pub fn localise_tool_path(path: &str, family: ToolFamily) -> String {
    let (marker, variable) = match family {
        ToolFamily::MsvcCompiler | ToolFamily::MsvcLinker | ToolFamily::MsvcLibrarian => {
            ("VC", "$VSBasePath$")
        }
        ToolFamily::ResourceCompiler => ("8.1", "$WindowsSDKBasePath$"),
        _ => return path.to_owned(),
    };
    let segments: Vec<&str> = path.split(['/', '\\']).collect();
    match segments.iter().position(|s| *s == marker) {
        Some(idx) if idx > 0 => std::iter::once(variable)
            .chain(segments.iter().skip(idx + 1).copied())
            .collect::<Vec<_>>()
            .join("/"),
        _ => path.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r"C:\VS\VC\bin\amd64\cl.exe", ToolFamily::MsvcCompiler, Arch::Amd64)]
    #[case(r"C:\VS\VC\bin\x86_amd64\link.exe", ToolFamily::MsvcLinker, Arch::Amd64)]
    #[case("C:/VS/VC/bin/x86/lib.exe", ToolFamily::MsvcLibrarian, Arch::X86)]
    #[case("C:/Kits/8.1/bin/x64/rc.exe", ToolFamily::ResourceCompiler, Arch::Amd64)]
    #[case("D:/SCE/host_tools/x64/bin/orbis-clang.exe", ToolFamily::OrbisClang, Arch::Amd64)]
    #[case("D:/SCE/host_tools/x64/bin/orbis-snarl.exe", ToolFamily::OrbisSnarl, Arch::Amd64)]
    #[case("/opt/llvm/x64/bin/clang++", ToolFamily::ClangCompiler, Arch::Amd64)]
    fn resolves_family_and_arch(
        #[case] path: &str,
        #[case] family: ToolFamily,
        #[case] arch: Arch,
    ) {
        let mut resolver = ToolResolver::new();
        let id = resolver.resolve(path).expect("resolve");
        let tool = resolver.get(id).expect("descriptor");
        assert_eq!(tool.family, family);
        assert_eq!(tool.arch, arch);
    }

    #[rstest]
    fn repeated_paths_reuse_one_descriptor() {
        let mut resolver = ToolResolver::new();
        let first = resolver.resolve_descriptor("C:/VS/VC/bin/amd64/cl.exe").expect("cl").clone();
        let linker = resolver.resolve("C:/VS/VC/bin/amd64/link.exe").expect("link");
        let again = resolver.resolve_descriptor("C:/VS/VC/bin/amd64/cl.exe").expect("cl again");
        assert_eq!(again, &first);
        assert_eq!(first.id, ToolId(0));
        assert_eq!(linker, ToolId(1));
        assert_eq!(first.compiler_alias.as_deref(), Some("Compiler-0"));
        assert_eq!(resolver.len(), 2);
    }

    #[rstest]
    fn unknown_platform_is_fatal_for_known_tools() {
        let mut resolver = ToolResolver::new();
        let err = resolver
            .resolve("C:/VS/VC/bin/cl.exe")
            .expect_err("no architecture token");
        assert!(matches!(err, ToolError::UnknownPlatform { .. }));
        assert!(resolver.is_empty());
    }

    #[rstest]
    fn unknown_tools_tolerate_missing_arch() {
        let mut resolver = ToolResolver::new();
        let id = resolver.resolve("/usr/bin/python3").expect("resolve");
        let tool = resolver.get(id).expect("descriptor");
        assert_eq!(tool.family, ToolFamily::Unknown);
        assert_eq!(tool.arch, Arch::Unknown);
        assert!(tool.compiler_alias.is_none());
    }

    #[rstest]
    fn cache_returns_same_handle() {
        let mut resolver = ToolResolver::new();
        let first = resolver.resolve("C:/VS/VC/bin/amd64/cl.exe").expect("first");
        let second = resolver.resolve("C:/VS/VC/bin/amd64/cl.exe").expect("second");
        assert_eq!(first, second);
        assert_eq!(resolver.len(), 1);
    }

    #[rstest]
    fn compiler_aliases_count_compilers_only() {
        let mut resolver = ToolResolver::new();
        let cl = resolver.resolve("C:/VS/VC/bin/amd64/cl.exe").expect("cl");
        let link = resolver.resolve("C:/VS/VC/bin/amd64/link.exe").expect("link");
        let rc = resolver.resolve("C:/Kits/8.1/bin/x64/rc.exe").expect("rc");
        let alias = |id| resolver.get(id).and_then(|t| t.compiler_alias.clone());
        assert_eq!(alias(cl).as_deref(), Some("Compiler-0"));
        assert_eq!(alias(link), None);
        assert_eq!(alias(rc).as_deref(), Some("Compiler-1"));
    }

    #[rstest]
    #[case("C:/Kits/8.1/bin/x64/rc.exe", ToolFamily::ResourceCompiler, "$WindowsSDKBasePath$/bin/x64/rc.exe")]
    #[case("C:/tools/x64/link.exe", ToolFamily::MsvcLinker, "C:/tools/x64/link.exe")]
    #[case("D:/SCE/x64/orbis-clang.exe", ToolFamily::OrbisClang, "D:/SCE/x64/orbis-clang.exe")]
    fn localises_known_roots(#[case] path: &str, #[case] family: ToolFamily, #[case] expected: &str) {
        assert_eq!(localise_tool_path(path, family), expected);
    }

    #[rstest]
    fn exec_dir_strips_file_name() {
        let mut resolver = ToolResolver::new();
        let id = resolver.resolve(r"C:\VS\VC\bin\amd64\cl.exe").expect("resolve");
        let tool = resolver.get(id).expect("descriptor");
        assert_eq!(tool.exec_dir(), "$VSBasePath$/bin/amd64");
    }
}

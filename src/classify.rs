//! Action classification.
//!
//! Turns one action's argument string into a structured compile or link
//! shape using the family conventions in [`crate::tool::FamilyPatterns`].
//! Rejections are ordinary values; the caller decides whether a rejection
//! routes the action to local execution or aborts the translation.

use crate::action::ActionKind;
use crate::cmdline::{self, has_extension, switch_values, tokenize};
use crate::tool::{LinkInputStyle, OutputMarker, ToolDescriptor};

/// Source extensions a compile action may consume.
pub const COMPILABLE_EXTENSIONS: &[&str] = &[".c", ".cpp", ".cc", ".cxx", ".rc", ".inl"];

/// Extension identifying response file inputs of a link action.
pub const RESPONSE_EXTENSION: &str = ".response";

/// Switch requesting precompiled header generation.
const PCH_CREATE: &str = "/Yc";
/// Switch consuming a precompiled header.
const PCH_USE: &str = "/Yu";

/// A compile action reduced to its input, output and optional PCH block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileShape {
    /// Source file compiled by the action.
    pub input: String,
    /// Object file written by the action.
    pub output: String,
    /// Precompiled header written alongside, when the action creates one.
    pub pch_output: Option<String>,
}

/// Why a compile action could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileRejection {
    /// The executable is not a known compiler.
    NotACompiler,
    /// No argument names a compilable source file.
    NoCompilableInput,
    /// The output marker is missing.
    NoOutput,
    /// A PCH is created but its output marker is missing.
    NoPchOutput,
}

/// A link action reduced to its inputs and single output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkShape {
    /// Allowed inputs in command-line order.
    pub inputs: Vec<String>,
    /// The linked artefact.
    pub output: String,
    /// Import library written next to a DLL.
    pub import_library: Option<String>,
}

/// Why a link action could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRejection {
    /// The executable is not a known linker or librarian.
    NotALinker,
    /// No argument carries an allowed input extension.
    NoInputs,
    /// No argument carries an allowed output extension.
    NoOutput,
    /// More than one output candidate matched.
    MultipleOutputs(Vec<String>),
}

/// Result of extracting a token that must be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Nothing matched.
    None,
    /// Exactly one match.
    One(String),
    /// Several matches, in order of appearance.
    Many(Vec<String>),
}

impl From<Vec<String>> for Extracted {
    fn from(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => Self::None,
            1 => values.pop().map_or(Self::None, Self::One),
            _ => Self::Many(values),
        }
    }
}

/// First argument naming a file with one of `extensions`.
#[must_use]
pub fn try_extract_input(args: &str, extensions: &[&str]) -> Option<String> {
    tokenize(args)
        .iter()
        .filter_map(cmdline::Token::path_value)
        .find(|value| has_extension(value, extensions))
        .map(str::to_owned)
}

/// Output candidates for `marker`, filtered to `extensions` when non-empty.
#[must_use]
pub fn try_extract_output(args: &str, marker: OutputMarker, extensions: &[&str]) -> Extracted {
    let candidates = match marker {
        OutputMarker::Switch(switch) => switch_values(args, switch),
        OutputMarker::BareExtension => tokenize(args)
            .iter()
            .filter(|t| !t.is_response_reference())
            .filter_map(cmdline::Token::path_value)
            .map(str::to_owned)
            .collect(),
    };
    candidates
        .into_iter()
        .filter(|value| extensions.is_empty() || has_extension(value, extensions))
        .collect::<Vec<_>>()
        .into()
}

/// Classify a compile action.
///
/// # Errors
///
/// Returns a [`CompileRejection`] when the action does not fit the compile
/// shape of its tool's family.
///
/// # Examples
///
/// ```
/// use kumiki::classify::classify_compile;
/// use kumiki::tool::ToolResolver;
///
/// let mut tools = ToolResolver::new();
/// let id = tools.resolve("C:/VS/VC/bin/amd64/cl.exe").expect("tool");
/// let tool = tools.get(id).expect("descriptor");
/// let shape = classify_compile(r#"/c /Fo"out/a.obj" a.cpp"#, tool).expect("compile");
/// assert_eq!(shape.input, "a.cpp");
/// assert_eq!(shape.output, "out/a.obj");
/// ```
pub fn classify_compile(args: &str, tool: &ToolDescriptor) -> Result<CompileShape, CompileRejection> {
    if !tool.family.is_compiler() {
        return Err(CompileRejection::NotACompiler);
    }
    let patterns = tool.family.patterns();
    let input =
        try_extract_input(args, COMPILABLE_EXTENSIONS).ok_or(CompileRejection::NoCompilableInput)?;
    let marker = patterns.output.ok_or(CompileRejection::NoOutput)?;
    let output = match try_extract_output(args, marker, &[]) {
        Extracted::None => return Err(CompileRejection::NoOutput),
        Extracted::One(output) => output,
        Extracted::Many(outputs) => outputs
            .into_iter()
            .next()
            .ok_or(CompileRejection::NoOutput)?,
    };
    let pch_output = if cmdline::has_switch(args, PCH_CREATE) {
        let pch_marker = patterns.pch_output.ok_or(CompileRejection::NoPchOutput)?;
        let found = switch_values(args, pch_marker)
            .into_iter()
            .next()
            .ok_or(CompileRejection::NoPchOutput)?;
        Some(found)
    } else {
        None
    };
    Ok(CompileShape {
        input,
        output,
        pch_output,
    })
}

/// Rewrite every PCH creation switch into a PCH use switch.
#[must_use]
pub fn use_pch_switch(args: &str) -> String {
    tokenize(args)
        .iter()
        .map(|t| match t.raw.get(..PCH_CREATE.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(PCH_CREATE) => {
                format!("{PCH_USE}{}", t.raw.get(PCH_CREATE.len()..).unwrap_or(""))
            }
            _ => t.raw.to_owned(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a link action.
///
/// Succeeds only with at least one allowed input and exactly one allowed
/// output.
///
/// # Errors
///
/// Returns a [`LinkRejection`] describing the first shape violation.
pub fn classify_link(args: &str, tool: &ToolDescriptor) -> Result<LinkShape, LinkRejection> {
    if !tool.family.is_linker() {
        return Err(LinkRejection::NotALinker);
    }
    let patterns = tool.family.patterns();
    let marker = patterns.output.ok_or(LinkRejection::NoOutput)?;
    let output = match try_extract_output(args, marker, patterns.link_output_extensions) {
        Extracted::None => return Err(LinkRejection::NoOutput),
        Extracted::One(output) => output,
        Extracted::Many(outputs) => return Err(LinkRejection::MultipleOutputs(outputs)),
    };
    let inputs: Vec<String> = tokenize(args)
        .iter()
        .filter(|t| {
            patterns.link_inputs == LinkInputStyle::AnyToken || t.is_response_reference()
        })
        .filter_map(cmdline::Token::path_value)
        .filter(|value| *value != output && has_extension(value, patterns.link_input_extensions))
        .map(str::to_owned)
        .collect();
    if inputs.is_empty() {
        return Err(LinkRejection::NoInputs);
    }
    let import_library = patterns
        .import_library
        .and_then(|implib| switch_values(args, implib).into_iter().next());
    Ok(LinkShape {
        inputs,
        output,
        import_library,
    })
}

/// Why an action stays out of the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// The action is tagged neither compile nor link.
    OtherKind,
    /// A compile action did not fit the compile shape.
    Compile(CompileRejection),
    /// A link action did not fit the link shape.
    Link(LinkRejection),
}

/// Outcome of classifying one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A compile step that can join a compile group.
    Compile(CompileShape),
    /// A link or archive step.
    Link(LinkShape),
    /// A link-tagged action whose tool is not a linker; passed through as an
    /// opaque command.
    Exec,
    /// Not expressible as a script record.
    Unrecognized(Mismatch),
}

/// Classify `args` of an action tagged `kind` and run by `tool`.
#[must_use]
pub fn classify(kind: ActionKind, args: &str, tool: &ToolDescriptor) -> Classification {
    match kind {
        ActionKind::Compile => classify_compile(args, tool).map_or_else(
            |reason| Classification::Unrecognized(Mismatch::Compile(reason)),
            Classification::Compile,
        ),
        ActionKind::Link => match classify_link(args, tool) {
            Ok(shape) => Classification::Link(shape),
            Err(LinkRejection::NotALinker) => Classification::Exec,
            Err(reason) => Classification::Unrecognized(Mismatch::Link(reason)),
        },
        ActionKind::Other => Classification::Unrecognized(Mismatch::OtherKind),
    }
}

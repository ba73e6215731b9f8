//! Command-line scanning helpers.
//!
//! Argument strings arrive as single Windows-style command lines. These
//! helpers split them into tokens, pull quoted values out of switch markers
//! such as `/Fo"out.obj"`, and find `@` response file references. Everything
//! here is pure string handling; classification lives in
//! [`crate::classify`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Switch markers used by the built-in family table.
const KNOWN_SWITCHES: &[&str] = &["/Fo", "-o", "/Fp", "/OUT:", "/IMPLIB:", "/Yc", "/Yu"];

/// Extensions that make `/name.ext` a root-level path instead of a switch.
const ROOT_PATH_EXTENSIONS: &[&str] = &[
    ".c", ".cc", ".cpp", ".cxx", ".inl", ".rc", ".o", ".obj", ".a", ".lib", ".so", ".dll", ".exe", ".self",
    ".res", ".pch", ".response", ".rsp",
];

/// MSVC switches that take an unquoted file name glued to the switch.
const FILE_SWITCH_PREFIXES: &[&str] = &["Fa", "Fd", "Fe", "Fi", "Fo", "Fp", "Fr", "Tc", "Tp", "Yc", "Yu"];

static SWITCH_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    KNOWN_SWITCHES
        .iter()
        .filter_map(|marker| switch_pattern(marker).map(|re| (*marker, re)))
        .collect()
});

fn switch_pattern(marker: &str) -> Option<Regex> {
    Regex::new(&format!(r#"(?i)(?:^|\s){} ?"([^"]*)""#, regex::escape(marker))).ok()
}

/// One whitespace-separated argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token text as written, quotes included.
    pub raw: &'a str,
    /// Token text with every double quote removed.
    pub value: String,
}

impl Token<'_> {
    /// Whether the token is a `@file` response reference.
    #[must_use]
    pub fn is_response_reference(&self) -> bool {
        self.raw.starts_with('@')
    }

    /// Path named by a `@file` reference.
    #[must_use]
    pub fn response_path(&self) -> Option<&str> {
        self.is_response_reference()
            .then(|| self.value.strip_prefix('@'))
            .flatten()
    }

    /// Whether the token looks like a compiler or linker switch rather than
    /// a path.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        if self.raw.starts_with('-') {
            return true;
        }
        let Some(rest) = self.raw.strip_prefix('/') else {
            return false;
        };
        if rest.contains(':') || rest.contains('"') {
            return true;
        }
        !rest.contains(['/', '\\']) && !is_root_level_file(rest)
    }

    /// Path carried by the token when it names a file: the bare value for
    /// plain paths, the referenced file for `@` references.
    #[must_use]
    pub fn path_value(&self) -> Option<&str> {
        if self.is_response_reference() {
            self.response_path()
        } else if self.is_switch() {
            None
        } else {
            Some(self.value.as_str())
        }
    }
}

/// Whether `/name` names a file in the filesystem root, e.g. `/a.cpp`.
fn is_root_level_file(name: &str) -> bool {
    has_extension(name, ROOT_PATH_EXTENSIONS)
        && !FILE_SWITCH_PREFIXES.iter().any(|prefix| {
            name.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
}

/// Split an argument string on whitespace outside double quotes.
///
/// # Examples
///
/// ```
/// use kumiki::cmdline::tokenize;
///
/// let tokens = tokenize(r#"/c "my file.cpp" /Fo"out dir/a.obj""#);
/// let values: Vec<_> = tokens.iter().map(|t| t.value.as_str()).collect();
/// assert_eq!(values, ["/c", "my file.cpp", "/Foout dir/a.obj"]);
/// ```
#[must_use]
pub fn tokenize(args: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quoted = false;
    for (idx, ch) in args.char_indices() {
        if ch == '"' {
            quoted = !quoted;
        }
        if ch.is_whitespace() && !quoted {
            if let Some(begin) = start.take() {
                push_token(&mut tokens, args, begin, idx);
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(begin) = start {
        push_token(&mut tokens, args, begin, args.len());
    }
    tokens
}

fn push_token<'a>(tokens: &mut Vec<Token<'a>>, args: &'a str, begin: usize, end: usize) {
    if let Some(raw) = args.get(begin..end) {
        tokens.push(Token {
            raw,
            value: raw.replace('"', ""),
        });
    }
}

/// Collect every quoted value following `marker`, in order of appearance.
///
/// Matching is case-insensitive and tolerates one space between the marker
/// and the opening quote. The marker must start a token.
///
/// # Examples
///
/// ```
/// use kumiki::cmdline::switch_values;
///
/// let args = r#"/nologo /Fo"out/a.obj" /Fp "out/pch.pch""#;
/// assert_eq!(switch_values(args, "/Fo"), ["out/a.obj"]);
/// assert_eq!(switch_values(args, "/fp"), ["out/pch.pch"]);
/// ```
#[must_use]
pub fn switch_values(args: &str, marker: &str) -> Vec<String> {
    let compiled;
    let pattern = match SWITCH_PATTERNS.get(marker) {
        Some(re) => re,
        None => match switch_pattern(marker) {
            Some(re) => {
                compiled = re;
                &compiled
            }
            None => return Vec::new(),
        },
    };
    pattern
        .captures_iter(args)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
        .collect()
}

/// Whether `switch` appears as a token prefix, ignoring case.
#[must_use]
pub fn has_switch(args: &str, switch: &str) -> bool {
    tokenize(args).iter().any(|t| {
        t.raw
            .get(..switch.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(switch))
    })
}

/// Paths of every `@file` response reference in `args`.
#[must_use]
pub fn response_references(args: &str) -> Vec<String> {
    tokenize(args)
        .iter()
        .filter_map(|t| t.response_path().map(str::to_owned))
        .filter(|p| !p.is_empty())
        .collect()
}

/// Path of the response file when `args` is nothing but one quoted
/// `@"file"` reference.
///
/// # Examples
///
/// ```
/// use kumiki::cmdline::sole_response_reference;
///
/// assert_eq!(sole_response_reference(r#" @"a.response""#), Some("a.response"));
/// assert_eq!(sole_response_reference(r#"@"a.response" /c"#), None);
/// ```
#[must_use]
pub fn sole_response_reference(args: &str) -> Option<&str> {
    let trimmed = args.trim_start();
    let inner = trimmed.strip_prefix("@\"")?.strip_suffix('"')?;
    (!inner.contains('"')).then_some(inner)
}

/// Whether `path` is absolute on either Windows or POSIX hosts.
#[must_use]
pub fn is_rooted(path: &str) -> bool {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some('/' | '\\'), _) => true,
        (Some(drive), Some(':')) => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// Normalise separators so Windows and POSIX spellings compare equal.
#[must_use]
pub fn normalise_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Whether `path` ends with one of `extensions`, ignoring ASCII case.
#[must_use]
pub fn has_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| {
        path.len() >= ext.len()
            && path
                .get(path.len() - ext.len()..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(ext))
    })
}

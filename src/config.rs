//! Engine, toolchain and script configuration.
//!
//! Configuration is read from a TOML document in which every field is
//! optional:
//!
//! ```toml
//! single_pass = false
//! min_actions_for_distribution = 25
//!
//! [engine]
//! cache = "read"
//!
//! [toolchain]
//! root = "D:/FASTBuild"
//! ```
//!
//! Environment lookups go through a caller-supplied reader so tests never
//! touch the process environment.

use std::ffi::OsString;
use std::fs;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use fbuild_env::{FASTBUILD_ROOT_ENV, FBUILD_ENV};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bff_gen::ScriptSettings;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "kumiki.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}")]
    #[diagnostic(code(kumiki::config::read))]
    Read {
        /// File that could not be read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid TOML or has unknown keys.
    #[error("invalid configuration in {path}")]
    #[diagnostic(
        code(kumiki::config::parse),
        help("every key is optional; remove unknown keys and check value types")
    )]
    Parse {
        /// Offending file.
        path: Utf8PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
}

/// Cache use requested from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// No cache flags.
    #[default]
    Off,
    /// `-cacheread`.
    Read,
    /// `-cache`, reading and writing.
    Write,
}

/// Engine command-line switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Explicit engine binary; overridden by `KUMIKI_FBUILD`.
    pub program: Option<Utf8PathBuf>,
    /// Distribute work to remote workers (`-dist`).
    pub distribution: bool,
    /// Cache mode.
    pub cache: CacheMode,
    /// IDE-friendly output (`-ide`).
    pub ide_mode: bool,
    /// Print a build summary (`-summary`).
    pub summary: bool,
    /// Write a build report (`-report`).
    pub report: bool,
    /// Verbose engine output (`-verbose -j0`).
    pub verbose: bool,
    /// Echo each command the engine runs (`-showcmds`).
    pub show_commands: bool,
    /// List defined targets (`-showtargets`).
    pub show_targets: bool,
    /// Keep going after a failure (`-nostoponerror`).
    pub continue_on_error: bool,
    /// Emit monitor events (`-monitor`).
    pub monitor: bool,
    /// Exported to the engine as `FASTBUILD_CACHE_PATH`.
    pub cache_path: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: None,
            distribution: true,
            cache: CacheMode::Off,
            ide_mode: true,
            summary: true,
            report: false,
            verbose: false,
            show_commands: false,
            show_targets: false,
            continue_on_error: false,
            monitor: false,
            cache_path: None,
        }
    }
}

/// Location and versions of the bundled toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// FASTBuild root; falls back to `FASTBUILD_ROOT_DIR`.
    pub root: Option<Utf8PathBuf>,
    /// Visual Studio version directory suffix, e.g. `14.0`.
    pub vs_version: String,
    /// MSVC toolset number, e.g. `140`.
    pub msvc_toolset: String,
    /// Windows 8.1 SDK library version.
    pub windows8_sdk_version: String,
    /// Windows 10 SDK version.
    pub windows10_sdk_version: String,
    /// Require the compiler and SDK directories to exist.
    pub verify: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            root: None,
            vs_version: "14.0".into(),
            msvc_toolset: "140".into(),
            windows8_sdk_version: "winv6.3".into(),
            windows10_sdk_version: "10.0.14393.0".into(),
            verify: true,
        }
    }
}

/// Resolved toolchain directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainLayout {
    /// FASTBuild root.
    pub root: Utf8PathBuf,
    /// `External/VS<version>`.
    pub compiler_dir: Utf8PathBuf,
    /// `External/Windows8.1`.
    pub sdk_dir: Utf8PathBuf,
    /// `External/Windows10`.
    pub sdk10_dir: Utf8PathBuf,
    /// `External/Windows10/Include/<version>`.
    pub sdk10_include_dir: Utf8PathBuf,
}

impl ToolchainLayout {
    /// Directories that must exist for the engine to be usable.
    #[must_use]
    pub fn required_dirs(&self) -> [&Utf8Path; 4] {
        [
            &self.compiler_dir,
            &self.sdk_dir,
            &self.sdk10_dir,
            &self.sdk10_include_dir,
        ]
    }
}

impl ToolchainConfig {
    /// Configured root, or the `FASTBUILD_ROOT_DIR` value.
    pub fn root_with<F>(&self, mut read_env: F) -> Option<Utf8PathBuf>
    where
        F: FnMut(&str) -> Option<OsString>,
    {
        self.root.clone().or_else(|| {
            read_env(FASTBUILD_ROOT_ENV)
                .filter(|value| !value.is_empty())
                .and_then(|value| Utf8PathBuf::from_path_buf(value.into()).ok())
        })
    }

    /// Directory layout below `root`.
    #[must_use]
    pub fn layout(&self, root: &Utf8Path) -> ToolchainLayout {
        let external = root.join("External");
        let sdk10_dir = external.join("Windows10");
        ToolchainLayout {
            root: root.to_owned(),
            compiler_dir: external.join(format!("VS{}", self.vs_version)),
            sdk_dir: external.join("Windows8.1"),
            sdk10_include_dir: sdk10_dir.join("Include").join(&self.windows10_sdk_version),
            sdk10_dir,
        }
    }
}

/// Script generation switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptConfig {
    /// Append the base include and library path variables to options.
    pub force_base_include_paths: bool,
    /// Appended to every compile template.
    pub extra_compiler_options: String,
}

/// Local fallback scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    /// Concurrent local actions; defaults to the available parallelism.
    pub max_parallel: Option<NonZeroUsize>,
    /// Sleep between scheduler scans, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_parallel: None,
            poll_interval_ms: 100,
        }
    }
}

impl FallbackConfig {
    /// Effective parallelism bound, at least one.
    #[must_use]
    pub fn max_parallel(&self) -> NonZeroUsize {
        self.max_parallel
            .or_else(|| thread::available_parallelism().ok())
            .unwrap_or(NonZeroUsize::MIN)
    }

    /// Sleep between scans.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete configuration of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KumikiConfig {
    /// Master switch; `false` reports the engine as unavailable.
    pub enabled: bool,
    /// Compile and link in one engine run without batching.
    pub single_pass: bool,
    /// Graphs with fewer actions do not use the engine at all.
    pub min_actions: usize,
    /// Graphs with at most this many actions run without distribution or
    /// caching.
    pub min_actions_for_distribution: usize,
    /// Engine switches.
    pub engine: EngineConfig,
    /// Toolchain layout.
    pub toolchain: ToolchainConfig,
    /// Script generation switches.
    pub script: ScriptConfig,
    /// Local fallback settings.
    pub fallback: FallbackConfig,
    /// Where `fbuild.bff` is written, relative to `root_dir` unless absolute.
    pub intermediate_dir: Utf8PathBuf,
    /// Engine working directory; response file paths resolve against it.
    pub root_dir: Utf8PathBuf,
}

impl Default for KumikiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            single_pass: false,
            min_actions: 0,
            min_actions_for_distribution: 25,
            engine: EngineConfig::default(),
            toolchain: ToolchainConfig::default(),
            script: ScriptConfig::default(),
            fallback: FallbackConfig::default(),
            intermediate_dir: Utf8PathBuf::from("Intermediate"),
            root_dir: Utf8PathBuf::from("."),
        }
    }
}

impl KumikiConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents or unknown
    /// keys. `origin` names the document in the error.
    ///
    /// # Examples
    ///
    /// ```
    /// use kumiki::config::{CacheMode, KumikiConfig};
    ///
    /// let cfg = KumikiConfig::from_toml_str("[engine]\ncache = \"write\"\n", "inline".into())
    ///     .expect("valid document");
    /// assert_eq!(cfg.engine.cache, CacheMode::Write);
    /// assert_eq!(cfg.min_actions_for_distribution, 25);
    /// ```
    pub fn from_toml_str(text: &str, origin: Utf8PathBuf) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: origin, source })
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text, path.to_owned())
    }

    /// Load `kumiki.toml` from `dir` when present, defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but is invalid.
    pub fn discover(dir: &Utf8Path) -> Result<Self, ConfigError> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Intermediate directory resolved against the root directory.
    #[must_use]
    pub fn intermediate_path(&self) -> Utf8PathBuf {
        self.root_dir.join(&self.intermediate_dir)
    }

    /// Candidate engine binaries in lookup order: the `KUMIKI_FBUILD`
    /// override, the configured program, then the binary inside the
    /// toolchain root.
    pub fn engine_candidates<F>(&self, mut read_env: F) -> Vec<Utf8PathBuf>
    where
        F: FnMut(&str) -> Option<OsString>,
    {
        let mut candidates = Vec::new();
        if let Some(path) = read_env(FBUILD_ENV)
            .filter(|value| !value.is_empty())
            .and_then(|value| Utf8PathBuf::from_path_buf(value.into()).ok())
        {
            candidates.push(path);
        }
        candidates.extend(self.engine.program.clone());
        if let Some(root) = self.toolchain.root_with(read_env) {
            candidates.push(root.join(engine_binary_name()));
        }
        candidates
    }

    /// Script settings for the toolchain rooted at `root`.
    #[must_use]
    pub fn script_settings(&self, root: Option<&Utf8Path>) -> ScriptSettings {
        let (vs_base_path, windows_sdk_base_path, windows10_sdk_base_path) = match root {
            Some(dir) => {
                let layout = self.toolchain.layout(dir);
                (
                    layout.compiler_dir.join("VC").into_string(),
                    layout.sdk_dir.into_string(),
                    layout.sdk10_dir.into_string(),
                )
            }
            None => {
                let defaults = ScriptSettings::default();
                (
                    format!("External/VS{}/VC", self.toolchain.vs_version),
                    defaults.windows_sdk_base_path,
                    defaults.windows10_sdk_base_path,
                )
            }
        };
        ScriptSettings {
            vs_base_path,
            windows_sdk_base_path,
            windows10_sdk_base_path,
            windows8_sdk_version: self.toolchain.windows8_sdk_version.clone(),
            windows10_sdk_version: self.toolchain.windows10_sdk_version.clone(),
            msvc_toolset: self.toolchain.msvc_toolset.clone(),
            force_base_include_paths: self.script.force_base_include_paths,
            extra_compiler_options: self.script.extra_compiler_options.clone(),
        }
    }
}

/// File name of the engine binary on this platform.
#[must_use]
pub const fn engine_binary_name() -> &'static str {
    if cfg!(windows) { "FBuild.exe" } else { "fbuild" }
}

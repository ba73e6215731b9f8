//! Engine subprocess: argument construction, redacted command logging and
//! line-by-line output forwarding.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use camino::Utf8Path;
use fbuild_env::FASTBUILD_CACHE_PATH_ENV;
use tracing::{debug, info, warn};

use crate::config::{CacheMode, EngineConfig};

/// Engine switches after action-count thresholds are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFlags {
    /// Switch values from configuration.
    pub engine: EngineConfig,
}

impl EngineFlags {
    /// Start from the configured switches.
    #[must_use]
    pub const fn new(engine: EngineConfig) -> Self {
        Self { engine }
    }

    /// Turn distribution and caching off for small builds.
    #[must_use]
    pub fn without_distribution(mut self) -> Self {
        self.engine.distribution = false;
        self.engine.cache = CacheMode::Off;
        self
    }

    /// Command-line arguments for a run against `script`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use kumiki::config::EngineConfig;
    /// use kumiki::runner::EngineFlags;
    ///
    /// let args = EngineFlags::new(EngineConfig::default()).args(Utf8Path::new("fbuild.bff"));
    /// assert_eq!(args, ["-dist", "-ide", "-summary", "-config", "fbuild.bff"]);
    /// ```
    #[must_use]
    pub fn args(&self, script: &Utf8Path) -> Vec<String> {
        let e = &self.engine;
        let switches: [(bool, &[&str]); 10] = [
            (e.distribution, &["-dist"]),
            (e.ide_mode, &["-ide"]),
            (e.summary, &["-summary"]),
            (e.report, &["-report"]),
            (e.verbose, &["-verbose", "-j0"]),
            (e.show_commands, &["-showcmds"]),
            (e.show_targets, &["-showtargets"]),
            (e.cache != CacheMode::Off, cache_switch(e.cache)),
            (e.continue_on_error, &["-nostoponerror"]),
            (e.monitor, &["-monitor"]),
        ];
        switches
            .into_iter()
            .filter(|(on, _)| *on)
            .flat_map(|(_, args)| args.iter().map(|a| (*a).to_owned()))
            .chain(["-config".to_owned(), script.as_str().to_owned()])
            .collect()
    }
}

const fn cache_switch(mode: CacheMode) -> &'static [&'static str] {
    match mode {
        CacheMode::Off => &[],
        CacheMode::Read => &["-cacheread"],
        CacheMode::Write => &["-cache"],
    }
}

const SENSITIVE_KEYS: [&str; 7] = [
    "password",
    "token",
    "secret",
    "api_key",
    "apikey",
    "auth",
    "authorization",
];

/// Replace the value of a `key=value` argument whose key looks sensitive.
///
/// # Examples
///
/// ```
/// use kumiki::runner::redact_argument;
///
/// assert_eq!(redact_argument("token=abc"), "token=***REDACTED***");
/// assert_eq!(redact_argument("-config"), "-config");
/// ```
#[must_use]
pub fn redact_argument(arg: &str) -> Cow<'_, str> {
    match arg.split_once('=') {
        Some((key, _))
            if SENSITIVE_KEYS
                .iter()
                .any(|candidate| key.trim().eq_ignore_ascii_case(candidate)) =>
        {
            Cow::Owned(format!("{}=***REDACTED***", key.trim()))
        }
        _ => Cow::Borrowed(arg),
    }
}

/// Forward each line read from `reader` to `sink` on a new thread.
///
/// Invalid UTF-8 is replaced rather than aborting the stream. The handle
/// yields the number of lines forwarded.
pub(crate) fn forward_lines<R, F>(reader: R, mut sink: F) -> JoinHandle<usize>
where
    R: Read + Send + 'static,
    F: FnMut(&str) + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut lines = 0;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    sink(text.trim_end_matches(['\n', '\r']));
                    lines += 1;
                }
                Err(err) => {
                    debug!("stopped forwarding child output: {err}");
                    break;
                }
            }
        }
        lines
    })
}

/// Run the engine and wait for it, streaming both output channels to the
/// `kumiki::engine` log target.
///
/// # Errors
///
/// Returns an error when the engine cannot be spawned or waited on.
pub(crate) fn run_engine(
    program: &Utf8Path,
    args: &[String],
    working_dir: &Utf8Path,
    cache_path: Option<&str>,
) -> io::Result<ExitStatus> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.current_dir(working_dir);
    if let Some(path) = cache_path {
        cmd.env(FASTBUILD_CACHE_PATH_ENV, path);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let shown: Vec<Cow<'_, str>> = args.iter().map(|a| redact_argument(a)).collect();
    info!("Running command: {} {}", program, shown.join(" "));

    let mut child = cmd.spawn()?;
    let mut forwarders = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        forwarders.push(forward_lines(stdout, |line| {
            info!(target: "kumiki::engine", "{line}");
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        forwarders.push(forward_lines(stderr, |line| {
            info!(target: "kumiki::engine", "{line}");
        }));
    }
    let status = child.wait()?;
    for handle in forwarders {
        if handle.join().is_err() {
            warn!("engine output forwarder panicked");
        }
    }
    Ok(status)
}

//! Fake engine executables implemented as shell scripts.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// Make a script file executable on Unix platforms.
#[cfg(unix)]
fn make_script_executable(path: &Utf8Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .with_context(|| format!("read metadata {path}"))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).with_context(|| format!("set permissions {path}"))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_script_executable(_path: &Utf8Path) -> Result<()> {
    Ok(())
}

fn utf8_dir(dir: &TempDir) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|p| anyhow::anyhow!("temp dir {} is not UTF-8", p.display()))
}

fn write_executable(dir: &Utf8Path, body: &str) -> Result<Utf8PathBuf> {
    let path = dir.join("fbuild");
    fs::write(&path, body).with_context(|| format!("write script {path}"))?;
    make_script_executable(&path)?;
    Ok(path)
}

/// Create a fake engine that prints one line and exits with `exit_code`.
///
/// Returns the temporary directory and the path to the executable.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn fake_engine(exit_code: i32) -> Result<(TempDir, Utf8PathBuf)> {
    let dir = TempDir::new().context("create temp dir")?;
    let root = utf8_dir(&dir)?;
    let path = write_executable(
        &root,
        &format!("#!/bin/sh\necho \"fake engine $*\"\nexit {exit_code}\n"),
    )?;
    Ok((dir, path))
}

/// Fake engine that records each invocation.
#[derive(Debug)]
pub struct CapturingEngine {
    /// Keeps the scripts alive.
    pub dir: TempDir,
    /// Engine executable.
    pub program: Utf8PathBuf,
    /// Directory receiving `run-<n>.bff` and `run-<n>.args`.
    pub captures: Utf8PathBuf,
}

impl CapturingEngine {
    /// Scripts passed via `-config`, in invocation order.
    ///
    /// # Errors
    ///
    /// Returns an error when a capture cannot be read.
    pub fn scripts(&self) -> Result<Vec<String>> {
        self.read_all("bff")
    }

    /// Argument lines of each invocation, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when a capture cannot be read.
    pub fn invocations(&self) -> Result<Vec<String>> {
        self.read_all("args")
    }

    fn read_all(&self, ext: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for n in 0.. {
            let path = self.captures.join(format!("run-{n}.{ext}"));
            if !path.exists() {
                break;
            }
            let text = fs::read_to_string(&path).with_context(|| format!("read {path}"))?;
            out.push(text.trim_end().to_owned());
        }
        Ok(out)
    }
}

/// Create a fake engine that copies the `-config` script and its arguments
/// into a capture directory, then exits with `exit_code`.
///
/// # Errors
///
/// Returns an error when the script cannot be written.
pub fn fake_engine_capture(exit_code: i32) -> Result<CapturingEngine> {
    let dir = TempDir::new().context("create temp dir")?;
    let root = utf8_dir(&dir)?;
    let captures = root.join("captures");
    fs::create_dir_all(&captures).with_context(|| format!("create {captures}"))?;
    let body = format!(
        concat!(
            "#!/bin/sh\n",
            "n=0\n",
            "while [ -e \"{dir}/run-$n.args\" ]; do n=$((n + 1)); done\n",
            "echo \"$*\" > \"{dir}/run-$n.args\"\n",
            "while [ $# -gt 0 ]; do\n",
            "  if [ \"$1\" = \"-config\" ]; then cp \"$2\" \"{dir}/run-$n.bff\"; fi\n",
            "  shift\n",
            "done\n",
            "exit {code}\n",
        ),
        dir = captures,
        code = exit_code,
    );
    let program = write_executable(&root, &body)?;
    Ok(CapturingEngine {
        dir,
        program,
        captures,
    })
}

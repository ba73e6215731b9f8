//! Script file output through capability-based directory handles.

use std::io::{self, ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs as cap_fs};
use tracing::info;

/// Return `true` when `path` is the CLI sentinel for standard output.
#[must_use]
pub fn is_stdout_path(path: &Utf8Path) -> bool {
    path.as_str() == "-"
}

/// Write `content` to `path`, creating missing parent directories.
///
/// # Errors
///
/// Returns an error when no ancestor of `path` can be opened or the file
/// cannot be written.
pub fn write_script(path: &Utf8Path, content: &str) -> Result<()> {
    let (dir, relative) = derive_dir_and_relative(path)?;
    if let Some(parent) = relative.parent().filter(|p| !p.as_str().is_empty()) {
        dir.create_dir_all(parent.as_std_path())
            .with_context(|| format!("creating directory {parent}"))?;
    }
    let mut file = dir
        .create(relative.as_std_path())
        .with_context(|| format!("creating script {path}"))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("writing script {path}"))?;
    file.flush().with_context(|| format!("flushing script {path}"))?;
    file.sync_all().with_context(|| format!("syncing script {path}"))?;
    info!("Wrote script to {path}");
    Ok(())
}

fn derive_dir_and_relative(path: &Utf8Path) -> Result<(cap_fs::Dir, Utf8PathBuf)> {
    if path.is_relative() {
        let dir = cap_fs::Dir::open_ambient_dir(".", ambient_authority())
            .context("opening the current directory")?;
        return Ok((dir, path.to_owned()));
    }
    let mut ancestors = path.ancestors();
    ancestors.next();
    let (base, dir) = ancestors
        .find_map(|candidate| {
            cap_fs::Dir::open_ambient_dir(candidate.as_std_path(), ambient_authority())
                .ok()
                .map(|dir| (candidate.to_owned(), dir))
        })
        .ok_or_else(|| anyhow!("no existing ancestor directory for {path}"))?;
    let relative = path
        .strip_prefix(&base)
        .with_context(|| format!("deriving {path} relative to {base}"))?
        .to_owned();
    Ok((dir, relative))
}

/// Write `content` to standard output, ignoring a closed pipe.
///
/// # Errors
///
/// Returns an error for any write failure other than a broken pipe.
pub fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(content.as_bytes()).and_then(|()| stdout.flush()) {
        Err(err) if err.kind() != ErrorKind::BrokenPipe => {
            Err(err).context("writing script to standard output")
        }
        _ => Ok(()),
    }
}

/// Canonicalise `path` through a directory handle on its parent.
///
/// # Errors
///
/// Returns an error when the path does not exist or is not UTF-8.
pub fn canonicalize_utf8_path(path: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    let name = path.file_name().map_or_else(|| Path::new("."), Path::new);
    let handle = cap_fs::Dir::open_ambient_dir(parent.as_std_path(), ambient_authority())?;
    let resolved = handle.canonicalize(name)?;
    let canonical = Utf8PathBuf::from_path_buf(resolved).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidData,
            format!("canonical path for {path} is not valid UTF-8"),
        )
    })?;
    if canonical.is_absolute() {
        return Ok(canonical);
    }
    let base = std::env::current_dir()?.join(parent.as_std_path());
    let absolute = Utf8PathBuf::from_path_buf(base).map_err(|_| {
        io::Error::new(ErrorKind::InvalidData, format!("directory of {path} is not valid UTF-8"))
    })?;
    Ok(absolute.join(canonical))
}

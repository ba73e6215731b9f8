#![forbid(unsafe_code)]

//! Environment variable names shared by kumiki, its binary and the test
//! helpers.

/// Override for the FASTBuild executable. Takes precedence over any
/// configured program path.
///
/// # Examples
///
/// ```
/// use fbuild_env::FBUILD_ENV;
/// assert_eq!(FBUILD_ENV, "KUMIKI_FBUILD");
/// ```
pub const FBUILD_ENV: &str = "KUMIKI_FBUILD";

/// Root of a FASTBuild installation holding the engine binary and the
/// bundled compiler and SDK trees.
pub const FASTBUILD_ROOT_ENV: &str = "FASTBUILD_ROOT_DIR";

/// Cache location read by the engine itself. Exported to the child process
/// when a cache path is configured.
pub const FASTBUILD_CACHE_PATH_ENV: &str = "FASTBUILD_CACHE_PATH";

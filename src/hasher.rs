//! Grouping key hashing.
//!
//! [`GroupKeyHasher`] computes a stable SHA-256 digest over every field that
//! makes two compile actions interchangeable. Identical digests mean the
//! actions can share one object list record.
//!
//! # Examples
//!
//! ```
//! use kumiki::hasher::{GroupKeyHasher, GroupKeyInput};
//!
//! let input = GroupKeyInput {
//!     template: r#"/c "%1" /Fo"%2""#,
//!     output_dir: "out/",
//!     output_ext: ".obj",
//!     tool: "cl.exe",
//!     pch: None,
//!     prerequisites: vec!["a.h"],
//! };
//! let key = GroupKeyHasher::hash(&input);
//! assert_eq!(key.as_str().len(), 64);
//! ```

use std::fmt;

use sha2::{Digest, Sha256};

/// Precompiled header fields that take part in the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PchKeyInput<'a> {
    /// Header source compiled into the PCH.
    pub input: &'a str,
    /// PCH file path.
    pub output: &'a str,
    /// Option template used to build the PCH.
    pub options: &'a str,
}

/// Every field the grouping key depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeyInput<'a> {
    /// Normalised option template.
    pub template: &'a str,
    /// Object output directory.
    pub output_dir: &'a str,
    /// Object output extension.
    pub output_ext: &'a str,
    /// Raw path of the compiler.
    pub tool: &'a str,
    /// Precompiled header block.
    pub pch: Option<PchKeyInput<'a>>,
    /// Prerequisite file paths; sorted before hashing.
    pub prerequisites: Vec<&'a str>,
}

/// Hex-encoded SHA-256 grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    /// The digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes [`GroupKey`]s.
pub struct GroupKeyHasher;

impl GroupKeyHasher {
    /// Calculate the key for one normalised compile action.
    #[must_use]
    pub fn hash(input: &GroupKeyInput<'_>) -> GroupKey {
        let mut hasher = Sha256::new();
        Self::update_with_len(&mut hasher, input.template.as_bytes());
        Self::update_with_len(&mut hasher, input.output_dir.as_bytes());
        Self::update_with_len(&mut hasher, input.output_ext.as_bytes());
        Self::update_with_len(&mut hasher, input.tool.as_bytes());
        Self::hash_pch(&mut hasher, input.pch);
        let mut prerequisites = input.prerequisites.clone();
        prerequisites.sort_unstable();
        hasher.update(format!("{}:", prerequisites.len()).as_bytes());
        for path in prerequisites {
            Self::update_with_len(&mut hasher, path.as_bytes());
        }
        GroupKey(format!("{:x}", hasher.finalize()))
    }

    fn hash_pch(hasher: &mut Sha256, pch: Option<PchKeyInput<'_>>) {
        match pch {
            Some(block) => {
                hasher.update(b"1");
                Self::update_with_len(hasher, block.input.as_bytes());
                Self::update_with_len(hasher, block.output.as_bytes());
                Self::update_with_len(hasher, block.options.as_bytes());
            }
            None => hasher.update(b"0"),
        }
    }

    fn update_with_len(hasher: &mut Sha256, bytes: &[u8]) {
        let len = bytes.len();
        hasher.update(format!("{len}:").as_bytes());
        hasher.update(bytes);
    }
}

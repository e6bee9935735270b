//! Schema identities
//!
//! A schema is addressed by the file holding it (relative to the analyzed
//! root) and its name in that file's `definitions` table. The serialized form
//! is the same addressing convention used by `$ref`:
//!
//! ```text
//! network/resource-manager/Microsoft.Network/stable/2023-05-01/network.json#/definitions/SubResource
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fragment prefix used by swagger 2.0 definition references
pub const DEFINITIONS_FRAGMENT: &str = "#/definitions/";

/// Unique handle for a schema definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaIdentity {
    file: String,
    name: String,
}

impl SchemaIdentity {
    /// Create an identity from a root-relative file path and a schema name.
    ///
    /// The file path is normalized lexically, so `a/./b/../c.json` and
    /// `a/c.json` produce equal identities.
    pub fn new(file: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            file: normalize_relative(file.as_ref()),
            name: name.into(),
        }
    }

    /// Create an identity for a schema in `path`, relative to `root`
    pub fn from_path(root: &Path, path: &Path, name: impl Into<String>) -> Self {
        Self {
            file: relative_to(root, path),
            name: name.into(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `$ref`-style reference string for this schema
    pub fn reference(&self) -> String {
        format!("{}{}{}", self.file, DEFINITIONS_FRAGMENT, self.name)
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.file, DEFINITIONS_FRAGMENT, self.name)
    }
}

/// Error for reference strings that are not `<file>#/definitions/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdentity(pub String);

impl fmt::Display for InvalidIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid schema reference {:?}", self.0)
    }
}

impl std::error::Error for InvalidIdentity {}

impl FromStr for SchemaIdentity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(DEFINITIONS_FRAGMENT) {
            Some((file, name)) if !file.is_empty() && !name.is_empty() => {
                Ok(Self::new(file, name))
            }
            _ => Err(InvalidIdentity(s.to_string())),
        }
    }
}

impl Serialize for SchemaIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment. Leading `..` segments of a relative path are kept.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Make `path` absolute against the current directory and normalize it
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        let cwd = std::env::current_dir().unwrap_or_default();
        normalize_path(&cwd.join(path))
    }
}

/// Express `path` relative to `root` with `/` separators.
///
/// Both paths are normalized first; a path outside `root` yields `..`
/// segments rather than an error.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let root = normalize_path(root);
    let path = normalize_path(path);

    let root_parts: Vec<_> = root.components().collect();
    let path_parts: Vec<_> = path.components().collect();
    let common = root_parts
        .iter()
        .zip(path_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = Vec::with_capacity(root_parts.len() + path_parts.len());
    for _ in common..root_parts.len() {
        segments.push("..".to_string());
    }
    for part in &path_parts[common..] {
        segments.push(part.as_os_str().to_string_lossy().into_owned());
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}

fn normalize_relative(file: &str) -> String {
    let unified = file.replace('\\', "/");
    let normalized = normalize_path(Path::new(&unified));
    let parts: Vec<_> = normalized
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

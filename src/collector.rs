//! Spec collection
//!
//! Decides which swagger files make up the analysis set. The default
//! collector follows the per-service `readme.md` documents: every
//! ```` ```yaml $(tag) ```` block lists the `input-file`s of one API version
//! tag, and the union of those lists is what gets analyzed.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::CollectConfig;
use crate::error::{Result, VariantError};
use crate::identity::normalize_path;

/// Supplies the ordered list of swagger files to analyze
pub trait SpecCollector {
    /// Return a sorted, deduplicated list of file paths under `root`
    fn collect(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// A fixed list of files, mostly useful in tests and for callers that
/// already know their inputs
#[derive(Debug, Clone, Default)]
pub struct StaticCollector {
    pub paths: Vec<PathBuf>,
}

impl SpecCollector for StaticCollector {
    fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let set: BTreeSet<PathBuf> = self
            .paths
            .iter()
            .map(|p| normalize_path(&root.join(p)))
            .collect();
        Ok(set.into_iter().collect())
    }
}

/// Collects the input files listed in each service's readme
#[derive(Debug, Clone)]
pub struct ReadmeCollector {
    skip_dirs: Vec<String>,
    readme_name: String,
}

impl ReadmeCollector {
    pub fn new(config: &CollectConfig) -> Self {
        Self {
            skip_dirs: config.skip_dirs.clone(),
            readme_name: config.readme_name.clone(),
        }
    }

    fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|skip| skip.eq_ignore_ascii_case(name))
    }
}

impl Default for ReadmeCollector {
    fn default() -> Self {
        Self::new(&CollectConfig::default())
    }
}

impl SpecCollector for ReadmeCollector {
    fn collect(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut specs = BTreeSet::new();

        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                VariantError::Io(e.into_io_error().unwrap_or_else(|| {
                    let message = "filesystem loop while walking specs";
                    std::io::Error::new(std::io::ErrorKind::Other, message)
                }))
            })?;
            let name = entry.file_name().to_string_lossy();

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && self.is_skipped_dir(&name) {
                    walker.skip_current_dir();
                }
                continue;
            }
            if name != self.readme_name.as_str() {
                continue;
            }

            let path = entry.path();
            let content = fs::read_to_string(path).map_err(|source| VariantError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let listed = spec_list_from_readme(&content).map_err(|source| VariantError::Readme {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(readme = %path.display(), specs = listed.len(), "collected input files");

            let dir = path.parent().unwrap_or(root);
            for relative in listed {
                specs.insert(normalize_path(&dir.join(relative)));
            }

            // The readme owns the rest of its directory.
            walker.skip_current_dir();
        }

        Ok(specs.into_iter().collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputFiles {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
struct TagInfo {
    #[serde(rename = "input-file", default)]
    input_file: Option<InputFiles>,
}

fn tag_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"^```\s*yaml \$\(tag\)").expect("valid fence pattern"))
}

/// Extract the sorted set of input files listed in a readme's
/// ```` ```yaml $(tag) ```` blocks
pub fn spec_list_from_readme(
    content: &str,
) -> std::result::Result<Vec<String>, serde_yaml::Error> {
    let mut specs = BTreeSet::new();
    let mut in_block = false;
    let mut block = String::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if tag_fence().is_match(trimmed) {
            in_block = true;
            block.clear();
            continue;
        }
        if trimmed == "```" {
            if in_block && !block.trim().is_empty() {
                let info: TagInfo = serde_yaml::from_str(&block)?;
                let files = match info.input_file {
                    Some(InputFiles::One(file)) => vec![file],
                    Some(InputFiles::Many(files)) => files,
                    None => Vec::new(),
                };
                specs.extend(files.iter().map(|f| clean_input_file(f)));
            }
            in_block = false;
            block.clear();
            continue;
        }
        if in_block {
            block.push_str(line);
            block.push('\n');
        }
    }

    Ok(specs.into_iter().collect())
}

fn clean_input_file(raw: &str) -> String {
    let replaced = raw.replace("$(this-folder)", ".");
    let cleaned = normalize_path(Path::new(&replaced))
        .to_string_lossy()
        .into_owned();
    // Some readmes list Windows style paths.
    if !cleaned.contains('/') && cleaned.contains('\\') {
        cleaned.replace('\\', "/")
    } else {
        cleaned
    }
}

//! Variant index
//!
//! [`IndexStore`] is the shared accumulator workers record edges into;
//! [`Index`] is the serialized artifact handed to downstream tools.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::OutputFormat;
use crate::error::Result;
use crate::identity::SchemaIdentity;

/// A recorded "variant derives from base" pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub base: SchemaIdentity,
    pub variant: SchemaIdentity,
}

impl Edge {
    pub fn new(base: SchemaIdentity, variant: SchemaIdentity) -> Self {
        Self { base, variant }
    }
}

/// Read access to bases already proven during this build
pub trait BaseLookup: Sync {
    /// True if `identity` already has a non-empty recorded variant set
    fn contains_base(&self, identity: &SchemaIdentity) -> bool;
}

/// A lookup that knows no bases, for resolving without a live store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecordedBases;

impl BaseLookup for NoRecordedBases {
    fn contains_base(&self, _identity: &SchemaIdentity) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Edges {
    variants: BTreeMap<SchemaIdentity, BTreeSet<SchemaIdentity>>,
    count: usize,
}

impl Edges {
    fn insert(&mut self, base: &SchemaIdentity, variant: &SchemaIdentity) -> bool {
        let added = self
            .variants
            .entry(base.clone())
            .or_default()
            .insert(variant.clone());
        if added {
            self.count += 1;
        }
        added
    }
}

/// Concurrency-safe edge accumulator.
///
/// Reads and writes share one exclusive lock so an exists-check followed by
/// an insert can never double count an edge.
#[derive(Debug, Default)]
pub struct IndexStore {
    inner: Mutex<Edges>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `variant` as deriving from `base`. Returns false if the edge
    /// was already present, in which case nothing changes.
    pub fn record_edge(&self, base: &SchemaIdentity, variant: &SchemaIdentity) -> bool {
        self.inner.lock().insert(base, variant)
    }

    /// Record every edge of a resolved lineage under a single lock acquisition.
    /// Returns the number of edges that were new.
    pub fn record_lineage(&self, edges: &[Edge]) -> usize {
        let mut inner = self.inner.lock();
        edges
            .iter()
            .filter(|edge| inner.insert(&edge.base, &edge.variant))
            .count()
    }

    /// Total number of distinct edges
    pub fn edge_count(&self) -> usize {
        self.inner.lock().count
    }

    /// Number of schemas with at least one recorded variant
    pub fn base_count(&self) -> usize {
        self.inner.lock().variants.len()
    }

    /// Snapshot the accumulated edges as an [`Index`]
    pub fn to_index(&self, commit: impl Into<String>) -> Index {
        let edges = self.inner.lock();
        let variants = edges
            .variants
            .iter()
            .map(|(base, set)| {
                let members = set.iter().map(|v| (v.reference(), ())).collect();
                (base.reference(), members)
            })
            .collect();
        Index {
            commit: commit.into(),
            count: edges.count,
            variants,
        }
    }
}

impl BaseLookup for IndexStore {
    fn contains_base(&self, identity: &SchemaIdentity) -> bool {
        self.inner
            .lock()
            .variants
            .get(identity)
            .is_some_and(|set| !set.is_empty())
    }
}

/// The output artifact: base reference → set of variant references.
///
/// Sets are encoded as maps to `null` so the document stays portable to
/// consumers without a native set type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Commit of the analyzed tree, empty when not under version control
    #[serde(default)]
    pub commit: String,

    /// Total number of (base, variant) edges
    #[serde(default)]
    pub count: usize,

    #[serde(default)]
    pub variants: BTreeMap<String, BTreeMap<String, ()>>,
}

impl Index {
    /// Whether `variant` is a recorded variant of `base` (both reference strings)
    pub fn is_variant_of(&self, base: &str, variant: &str) -> bool {
        self.variants
            .get(base)
            .is_some_and(|set| set.contains_key(variant))
    }

    /// Recorded variants of `base`, sorted
    pub fn variants_of<'a>(&'a self, base: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.variants
            .get(base)
            .into_iter()
            .flat_map(|set| set.keys().map(String::as_str))
    }

    /// Number of distinct bases
    pub fn base_count(&self) -> usize {
        self.variants.len()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a previously written index
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize in the requested layout; `Pretty` indents with tabs
    pub fn to_json(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Compact => Ok(serde_json::to_string(self)?),
            OutputFormat::Pretty => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                self.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
        }
    }
}

//! Variant resolution
//!
//! Decides whether a schema is, or transitively derives from, a polymorphic
//! base by walking its `allOf` references, following them into other files
//! through the [`DocumentCache`].
//!
//! The walk is pure with respect to the index: it returns the [`Lineage`]
//! (the edges discovered along the successful path) and leaves recording to
//! the caller. Edges accumulate while the recursion unwinds, each frame
//! registering itself as a variant of the schema its reference resolved to.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::cache::DocumentCache;
use crate::document::{SchemaDefinition, SchemaDocument, SchemaRef};
use crate::error::{Result, VariantError};
use crate::identity::SchemaIdentity;
use crate::index::{BaseLookup, Edge};

/// Identities under active resolution for one root schema.
///
/// Owned by a single top-level call and never shared, so concurrent roots
/// cannot see each other's frames as cycles.
#[derive(Debug, Default)]
pub struct ResolutionChain {
    active: HashSet<SchemaIdentity>,
}

impl ResolutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `identity`; false if it is already on the chain (a cycle)
    fn enter(&mut self, identity: &SchemaIdentity) -> bool {
        self.active.insert(identity.clone())
    }

    fn leave(&mut self, identity: &SchemaIdentity) {
        self.active.remove(identity);
    }

    pub fn contains(&self, identity: &SchemaIdentity) -> bool {
        self.active.contains(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Result of a successful resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineage {
    /// Edges from the innermost base outward; empty when the root is itself
    /// a base or was already proven
    pub edges: Vec<Edge>,
}

/// The schema a `$ref` points at
struct Target {
    identity: SchemaIdentity,
    document: Arc<SchemaDocument>,
    fragment: String,
}

/// Walks inheritance references for one build
pub struct VariantResolver<'a> {
    root: &'a Path,
    cache: &'a DocumentCache,
    bases: &'a dyn BaseLookup,
}

impl<'a> VariantResolver<'a> {
    /// `root` is the analyzed tree (absolute, normalized); identities are
    /// expressed relative to it.
    pub fn new(root: &'a Path, cache: &'a DocumentCache, bases: &'a dyn BaseLookup) -> Self {
        Self { root, cache, bases }
    }

    /// Resolve one top-level schema with a fresh chain
    pub fn resolve_root(
        &self,
        identity: &SchemaIdentity,
        definition: SchemaDefinition<'_>,
        document: &Arc<SchemaDocument>,
    ) -> Result<Option<Lineage>> {
        let mut chain = ResolutionChain::new();
        let edges = self.resolve(identity, definition, document, &mut chain)?;
        Ok(edges.map(|edges| Lineage { edges }))
    }

    /// Resolve `identity` within an existing chain.
    ///
    /// `Some(edges)` means the schema is a base or derives from one.
    pub fn resolve(
        &self,
        identity: &SchemaIdentity,
        definition: SchemaDefinition<'_>,
        document: &Arc<SchemaDocument>,
        chain: &mut ResolutionChain,
    ) -> Result<Option<Vec<Edge>>> {
        if !chain.enter(identity) {
            warn!(schema = %identity, "cycle detected");
            return Ok(None);
        }
        let result = self.resolve_entered(identity, definition, document, chain);
        chain.leave(identity);
        result
    }

    fn resolve_entered(
        &self,
        identity: &SchemaIdentity,
        definition: SchemaDefinition<'_>,
        document: &Arc<SchemaDocument>,
        chain: &mut ResolutionChain,
    ) -> Result<Option<Vec<Edge>>> {
        // A base terminates the walk and is never a variant of anything.
        if definition.has_discriminator() {
            return Ok(Some(Vec::new()));
        }

        if self.bases.contains_base(identity) {
            return Ok(Some(Vec::new()));
        }

        for reference in definition.references() {
            let target = self.locate(document, reference)?;
            let target_definition = target
                .document
                .pointer(&target.fragment)
                .map(SchemaDefinition::new)
                .ok_or_else(|| VariantError::UnresolvedReference {
                    file: document.path().to_path_buf(),
                    reference: reference.to_string(),
                })?;

            if let Some(mut edges) =
                self.resolve(&target.identity, target_definition, &target.document, chain)?
            {
                edges.push(Edge::new(target.identity, identity.clone()));
                return Ok(Some(edges));
            }
        }

        Ok(None)
    }

    /// Find the document and identity a `$ref` in `document` points at
    fn locate(&self, document: &Arc<SchemaDocument>, reference: &str) -> Result<Target> {
        let parsed = SchemaRef::parse(document.path(), reference)?;
        let name = parsed
            .schema_name()
            .ok_or_else(|| VariantError::UnresolvedReference {
                file: document.path().to_path_buf(),
                reference: reference.to_string(),
            })?;

        let target_document = if parsed.path == document.path() {
            Arc::clone(document)
        } else {
            self.cache.get(&parsed.path)?
        };

        Ok(Target {
            identity: SchemaIdentity::from_path(self.root, &parsed.path, name),
            document: target_document,
            fragment: parsed.fragment,
        })
    }
}

//! Swagger Variants
//!
//! Builds an index of polymorphic schema families across a tree of
//! Swagger/OpenAPI files: for every schema declaring a `discriminator`, the
//! set of schemas that derive from it through `allOf` references, possibly
//! across files.
//!
//! ## Features
//!
//! - **Cross-file resolution**: `$ref`s are followed into other files through a
//!   bounded LRU document cache
//! - **Cycle safety**: inheritance cycles are detected per root schema and
//!   abandoned with a warning
//! - **Deterministic output**: edges are deduplicated and counted once, output
//!   maps are sorted
//! - **Bounded runtime**: a fixed worker pool under a global deadline
//!
//! ## Index format
//!
//! ```text
//! {
//!     "commit": "3f1c...",
//!     "count": 2,
//!     "variants": {
//!         "pets/pets.json#/definitions/Pet": {
//!             "pets/pets.json#/definitions/Dog": null,
//!             "pets/cats.json#/definitions/Cat": null
//!         }
//!     }
//! }
//! ```

pub mod cache;
pub mod collector;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod index;
pub mod orchestrator;
pub mod provenance;
pub mod resolver;

pub use cache::DocumentCache;
pub use collector::{ReadmeCollector, SpecCollector, StaticCollector};
pub use config::{ErrorPolicy, OutputFormat, VariantConfig};
pub use document::{SchemaDefinition, SchemaDocument};
pub use error::{Result, VariantError};
pub use identity::SchemaIdentity;
pub use index::{BaseLookup, Edge, Index, IndexStore};
pub use orchestrator::{
    build_index, build_index_with, BuildContext, BuildReport, BuildSettings, Orchestrator,
    SchemaFailure, SchemaTask,
};
pub use resolver::{Lineage, ResolutionChain, VariantResolver};

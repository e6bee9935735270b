//! Build orchestration
//!
//! Fans schema resolution out over a fixed-size worker pool. Workers share
//! one [`BuildContext`] (document cache, index store, analyzed root) and the
//! whole build runs under a global deadline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cache::DocumentCache;
use crate::collector::{ReadmeCollector, SpecCollector};
use crate::config::{BuildConfig, ErrorPolicy, VariantConfig};
use crate::document::SchemaDocument;
use crate::error::{Result, VariantError};
use crate::identity::{absolutize, SchemaIdentity};
use crate::index::{Index, IndexStore};
use crate::provenance;
use crate::resolver::VariantResolver;

/// Required name of the analyzed directory
pub const SPEC_ROOT_DIR_NAME: &str = "specification";

/// Shared state of one build
pub struct BuildContext {
    root: PathBuf,
    cache: DocumentCache,
    store: IndexStore,
}

impl BuildContext {
    pub fn new(root: &Path, cache_capacity: usize) -> Self {
        Self {
            root: absolutize(root),
            cache: DocumentCache::new(cache_capacity),
            store: IndexStore::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Identity of schema `name` defined in `path`
    pub fn identity(&self, path: &Path, name: &str) -> SchemaIdentity {
        SchemaIdentity::from_path(&self.root, path, name)
    }
}

/// One unit of work: a schema definition in a collected file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaTask {
    pub path: PathBuf,
    pub name: String,
}

/// A schema or file skipped under [`ErrorPolicy::Collect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFailure {
    pub file: PathBuf,
    /// None when the whole file could not be read
    pub schema: Option<String>,
    pub message: String,
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub index: Index,
    /// Always empty under [`ErrorPolicy::FailFast`]
    pub failures: Vec<SchemaFailure>,
}

impl BuildReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Worker pool settings
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// None sizes the pool to the available parallelism
    pub workers: Option<usize>,
    pub timeout: Duration,
    pub cache_capacity: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

impl From<&BuildConfig> for BuildSettings {
    fn from(config: &BuildConfig) -> Self {
        Self {
            workers: config.workers,
            timeout: config.timeout(),
            cache_capacity: config.cache_capacity,
            error_policy: config.error_policy,
        }
    }
}

/// Runs builds
pub struct Orchestrator {
    settings: BuildSettings,
}

impl Orchestrator {
    pub fn new(settings: BuildSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Build the variant index for `spec_paths` under `root`.
    ///
    /// The returned index carries no commit; see [`build_index`] for the full
    /// pipeline.
    pub fn build(&self, root: &Path, spec_paths: &[PathBuf]) -> Result<BuildReport> {
        let context = Arc::new(BuildContext::new(root, self.settings.cache_capacity));
        self.scan(&context, spec_paths)
    }

    /// Resolve every definition of every file in `spec_paths` against `context`.
    ///
    /// Each file is one unit of work: it is fetched once and all of its
    /// definitions are resolved against that document.
    pub fn scan(&self, context: &Arc<BuildContext>, spec_paths: &[PathBuf]) -> Result<BuildReport> {
        let work: Vec<FileWork> = spec_paths
            .iter()
            .map(|p| FileWork {
                path: absolutize(p),
                names: None,
            })
            .collect();

        info!(files = work.len(), "scanning index from spec files");
        let started = Instant::now();

        let report = self.resolve(context, work)?;
        info!(
            count = report.index.count,
            bases = report.index.base_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "variant index built"
        );
        Ok(report)
    }

    /// Resolve a prepared task list against `context`.
    ///
    /// Tasks are grouped by file so each file is fetched once. The result
    /// does not depend on task order.
    pub fn run(&self, context: &Arc<BuildContext>, tasks: Vec<SchemaTask>) -> Result<BuildReport> {
        let mut by_file: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for task in tasks {
            by_file.entry(task.path).or_default().push(task.name);
        }
        let work = by_file
            .into_iter()
            .map(|(path, names)| FileWork {
                path,
                names: Some(names),
            })
            .collect();
        self.resolve(context, work)
    }

    fn resolve(&self, context: &Arc<BuildContext>, work: Vec<FileWork>) -> Result<BuildReport> {
        let policy = self.settings.error_policy;
        let worker_context = Arc::clone(context);
        let failures =
            self.execute(move |cancel| resolve_files(&worker_context, &work, cancel, policy))?;
        Ok(finish(context, failures))
    }

    /// Run `job` on the worker pool, giving up after the configured deadline.
    ///
    /// The pool runs on a coordinator thread so this thread can wait with a
    /// timeout; on expiry the cancel flag tells workers to stop picking up
    /// tasks and the outcome is discarded.
    fn execute<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&AtomicBool) -> Result<T> + Send + 'static,
    {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("variant-worker-{i}"));
        if let Some(workers) = self.settings.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder.build()?;
        debug!(workers = pool.current_num_threads(), "worker pool started");

        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("variant-build".to_string())
            .spawn(move || {
                let outcome = pool.install(|| job(&worker_cancel));
                // The receiver is gone if the deadline already passed.
                let _ = tx.send(outcome);
            })?;

        match rx.recv_timeout(self.settings.timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(timeout = ?self.settings.timeout, "build deadline exceeded");
                Err(VariantError::Timeout(self.settings.timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(VariantError::WorkerPanicked),
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(BuildSettings::default())
    }
}

/// Definitions to resolve in one file
struct FileWork {
    path: PathBuf,
    /// None resolves every definition in the file
    names: Option<Vec<String>>,
}

/// Resolve every unit of work, recording lineages into the shared store.
///
/// Under [`ErrorPolicy::FailFast`] the first error stops the remaining work.
fn resolve_files(
    context: &BuildContext,
    work: &[FileWork],
    cancel: &AtomicBool,
    policy: ErrorPolicy,
) -> Result<Vec<SchemaFailure>> {
    let per_file: Vec<Vec<SchemaFailure>> = work
        .par_iter()
        .map(|unit| resolve_file(context, unit, cancel, policy))
        .collect::<Result<_>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

fn resolve_file(
    context: &BuildContext,
    unit: &FileWork,
    cancel: &AtomicBool,
    policy: ErrorPolicy,
) -> Result<Vec<SchemaFailure>> {
    if cancel.load(Ordering::Relaxed) {
        return Err(VariantError::Cancelled);
    }
    let document = match context.cache.get(&unit.path) {
        Ok(document) => document,
        Err(e) if policy == ErrorPolicy::Collect => {
            warn!(file = %unit.path.display(), error = %e, "skipping unreadable spec file");
            return Ok(vec![SchemaFailure {
                file: unit.path.clone(),
                schema: None,
                message: e.to_string(),
            }]);
        }
        Err(e) => return Err(e),
    };

    let names = match &unit.names {
        Some(names) => names.clone(),
        None => document.definition_names(),
    };

    let mut failures = Vec::new();
    for name in names {
        if cancel.load(Ordering::Relaxed) {
            return Err(VariantError::Cancelled);
        }
        match resolve_schema(context, &document, &name) {
            Ok(()) => {}
            Err(e) if policy == ErrorPolicy::Collect => {
                warn!(file = %unit.path.display(), schema = %name, error = %e, "skipping schema");
                failures.push(SchemaFailure {
                    file: unit.path.clone(),
                    schema: Some(name),
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(failures)
}

fn resolve_schema(
    context: &BuildContext,
    document: &Arc<SchemaDocument>,
    name: &str,
) -> Result<()> {
    let path = document.path();
    let definition = document
        .definition(name)
        .ok_or_else(|| VariantError::MissingDefinition {
            file: path.to_path_buf(),
            name: name.to_string(),
        })?;
    let identity = context.identity(path, name);

    let resolver = VariantResolver::new(&context.root, &context.cache, &context.store);
    if let Some(lineage) = resolver.resolve_root(&identity, definition, document)? {
        let added = context.store.record_lineage(&lineage.edges);
        if added > 0 {
            debug!(schema = %identity, edges = added, "recorded variant edges");
        }
    }
    Ok(())
}

fn finish(context: &BuildContext, failures: Vec<SchemaFailure>) -> BuildReport {
    BuildReport {
        index: context.store.to_index(String::new()),
        failures,
    }
}

/// Check that `root` is an existing directory named `specification`.
/// A trailing separator is accepted.
pub fn validate_spec_root(root: &Path) -> Result<PathBuf> {
    let root = absolutize(root);
    let named_right = root
        .file_name()
        .is_some_and(|name| name == SPEC_ROOT_DIR_NAME);
    if !named_right || !root.is_dir() {
        return Err(VariantError::InvalidSpecRoot(root));
    }
    Ok(root)
}

/// The full pipeline: validate the root, stamp provenance, collect spec files
/// with the readme collector and build the index.
pub fn build_index(root: &Path, config: &VariantConfig) -> Result<BuildReport> {
    let collector = ReadmeCollector::new(&config.collect);
    build_index_with(root, config, &collector)
}

/// [`build_index`] with a caller-supplied collector
pub fn build_index_with(
    root: &Path,
    config: &VariantConfig,
    collector: &dyn SpecCollector,
) -> Result<BuildReport> {
    let root = validate_spec_root(root)?;

    let commit = provenance::commit_for(&root)?;
    info!(commit = %commit, "resolved provenance");

    info!(dir = %root.display(), "collecting specs");
    let spec_paths = collector.collect(&root)?;

    let orchestrator = Orchestrator::new(BuildSettings::from(&config.build));
    let mut report = orchestrator.build(&root, &spec_paths)?;
    report.index.commit = commit;
    Ok(report)
}

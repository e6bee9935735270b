//! End-to-end tests for variant index builds
//!
//! Each test lays out a small `specification` tree on disk and runs the
//! orchestrator over it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use swagger_variants::{
    build_index, build_index_with, BuildContext, BuildSettings, ErrorPolicy, Index, Orchestrator,
    SchemaDocument, SchemaTask, StaticCollector, VariantConfig, VariantError,
};
use tempfile::{tempdir, TempDir};

fn spec_tree() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("specification");
    fs::create_dir_all(&root).unwrap();
    (dir, root)
}

fn write(root: &Path, file: &str, content: serde_json::Value) -> PathBuf {
    let path = root.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
    path
}

fn tasks_for(paths: &[PathBuf]) -> Vec<SchemaTask> {
    paths
        .iter()
        .flat_map(|path| {
            let doc = SchemaDocument::load(path).unwrap();
            doc.definition_names()
                .into_iter()
                .map(|name| SchemaTask {
                    path: path.clone(),
                    name,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_cross_file_resolution() {
    let (_dir, root) = spec_tree();
    let file1 = write(&root, "file1.json", json!({
        "swagger": "2.0",
        "definitions": { "Base": { "discriminator": "kind", "properties": { "kind": { "type": "string" } } } }
    }));
    let file2 = write(&root, "file2.json", json!({
        "swagger": "2.0",
        "definitions": { "Derived": { "allOf": [{ "$ref": "./file1.json#/definitions/Base" }] } }
    }));

    let report = Orchestrator::default().build(&root, &[file1, file2]).unwrap();

    assert_eq!(report.index.count, 1);
    assert!(report
        .index
        .is_variant_of("file1.json#/definitions/Base", "file2.json#/definitions/Derived"));
    assert!(report.is_complete());
}

#[test]
fn test_discriminator_schema_is_never_a_variant() {
    let (_dir, root) = spec_tree();
    let file = write(&root, "animals.json", json!({
        "definitions": {
            "Animal": { "discriminator": "type" },
            "Pet": { "discriminator": "kind", "allOf": [{ "$ref": "#/definitions/Animal" }] },
            "Dog": { "allOf": [{ "$ref": "#/definitions/Pet" }] }
        }
    }));

    let report = Orchestrator::default().build(&root, &[file]).unwrap();
    let index = &report.index;

    assert_eq!(index.count, 1);
    assert!(index.is_variant_of("animals.json#/definitions/Pet", "animals.json#/definitions/Dog"));
    assert!(index.variants_of("animals.json#/definitions/Animal").next().is_none());
    for variants in index.variants.values() {
        assert!(!variants.contains_key("animals.json#/definitions/Pet"));
    }
}

#[test]
fn test_transitive_chain_records_each_hop() {
    let (_dir, root) = spec_tree();
    let base = write(&root, "common/base.json", json!({
        "definitions": { "Resource": { "discriminator": "type" } }
    }));
    let mid = write(&root, "svc/stable/mid.json", json!({
        "definitions": { "Tracked": { "allOf": [{ "$ref": "../../common/base.json#/definitions/Resource" }] } }
    }));
    let leaf = write(&root, "svc/stable/leaf.json", json!({
        "definitions": { "Vault": { "allOf": [{ "$ref": "mid.json#/definitions/Tracked" }] } }
    }));

    let report = Orchestrator::default().build(&root, &[base, mid, leaf]).unwrap();
    let index = &report.index;

    assert_eq!(index.count, 2);
    assert!(index.is_variant_of(
        "common/base.json#/definitions/Resource",
        "svc/stable/mid.json#/definitions/Tracked"
    ));
    assert!(index.is_variant_of(
        "svc/stable/mid.json#/definitions/Tracked",
        "svc/stable/leaf.json#/definitions/Vault"
    ));
}

#[test]
fn test_two_cycle_completes_without_edges() {
    let (_dir, root) = spec_tree();
    let a = write(&root, "a.json", json!({
        "definitions": { "A": { "allOf": [{ "$ref": "./b.json#/definitions/B" }] } }
    }));
    let b = write(&root, "b.json", json!({
        "definitions": { "B": { "allOf": [{ "$ref": "./a.json#/definitions/A" }] } }
    }));

    let report = Orchestrator::default().build(&root, &[a, b]).unwrap();
    assert_eq!(report.index.count, 0);
    assert!(report.index.variants.is_empty());
}

#[test]
fn test_same_schema_via_different_relative_paths() {
    let (_dir, root) = spec_tree();
    let base = write(&root, "common/types.json", json!({
        "definitions": { "Resource": { "discriminator": "type" } }
    }));
    let one = write(&root, "a/one.json", json!({
        "definitions": { "One": { "allOf": [{ "$ref": "../common/types.json#/definitions/Resource" }] } }
    }));
    let two = write(&root, "b/c/two.json", json!({
        "definitions": { "Two": { "allOf": [{ "$ref": "../../common/./types.json#/definitions/Resource" }] } }
    }));

    let report = Orchestrator::default().build(&root, &[base, one, two]).unwrap();
    let index = &report.index;

    assert_eq!(index.base_count(), 1);
    let variants: Vec<_> = index.variants_of("common/types.json#/definitions/Resource").collect();
    assert_eq!(variants, vec!["a/one.json#/definitions/One", "b/c/two.json#/definitions/Two"]);
}

#[test]
fn test_edges_counted_once_across_redundant_discoveries() {
    let (_dir, root) = spec_tree();
    let file = write(&root, "pets.json", json!({
        "definitions": {
            "Pet": { "discriminator": "kind" },
            "Dog": { "allOf": [{ "$ref": "#/definitions/Pet" }] },
            "Puppy": { "allOf": [{ "$ref": "#/definitions/Dog" }] },
            "ShowPuppy": { "allOf": [{ "$ref": "#/definitions/Puppy" }] }
        }
    }));

    // The same file collected twice under different spellings.
    let again = root.join("./pets.json");
    let report = Orchestrator::default().build(&root, &[file, again]).unwrap();
    assert_eq!(report.index.count, 3);
}

// =============================================================================
// Cache
// =============================================================================

#[test]
fn test_cache_bound_respected_across_many_files() {
    let (_dir, root) = spec_tree();
    let mut refs = serde_json::Map::new();
    let mut paths = Vec::new();
    for i in 0..25 {
        paths.push(write(&root, &format!("bases/base{i:02}.json"), json!({
            "definitions": { "Base": { "discriminator": "kind" } }
        })));
        refs.insert(
            format!("Derived{i:02}"),
            json!({ "allOf": [{ "$ref": format!("./bases/base{i:02}.json#/definitions/Base") }] }),
        );
    }
    let variants = write(&root, "variants.json", json!({ "definitions": refs }));

    let context = Arc::new(BuildContext::new(&root, 20));
    let settings = BuildSettings {
        workers: Some(1),
        ..BuildSettings::default()
    };
    let report = Orchestrator::new(settings)
        .run(&context, tasks_for(&[variants]))
        .unwrap();

    assert!(context.cache().len() <= 20);
    assert!(!context.cache().contains(&root.join("bases/base00.json")));
    assert!(context.cache().contains(&root.join("bases/base24.json")));
    assert_eq!(report.index.count, 25);

    // Rebuilding with a cache too small to hold anything useful gives the same index.
    let tiny = Arc::new(BuildContext::new(&root, 1));
    let mut all = paths.clone();
    all.push(root.join("variants.json"));
    let again = Orchestrator::default().run(&tiny, tasks_for(&all)).unwrap();
    assert_eq!(again.index, report.index);
    assert!(tiny.cache().len() <= 1);
}

#[test]
fn test_each_file_parsed_once() {
    let (_dir, root) = spec_tree();
    let paths: Vec<PathBuf> = (0..40)
        .map(|i| {
            write(&root, &format!("svc{i:02}/api.json"), json!({
                "definitions": {
                    "Base": { "discriminator": "kind" },
                    "Child": { "allOf": [{ "$ref": "#/definitions/Base" }] }
                }
            }))
        })
        .collect();
    let settings = BuildSettings {
        workers: Some(1),
        ..BuildSettings::default()
    };
    let orchestrator = Orchestrator::new(settings);

    let scanned = Arc::new(BuildContext::new(&root, 20));
    let report = orchestrator.scan(&scanned, &paths).unwrap();
    assert_eq!(report.index.count, 40);
    assert_eq!(scanned.cache().parse_count(), 40);

    let tasked = Arc::new(BuildContext::new(&root, 20));
    let again = orchestrator.run(&tasked, tasks_for(&paths)).unwrap();
    assert_eq!(again.index, report.index);
    assert_eq!(tasked.cache().parse_count(), 40);
}

#[test]
fn test_percent_encoded_reference() {
    let (_dir, root) = spec_tree();
    let base = write(&root, "common.json", json!({
        "definitions": { "Base Type": { "discriminator": "kind" } }
    }));
    let leaf = write(&root, "leaf.json", json!({
        "definitions": { "Leaf": { "allOf": [{ "$ref": "./common.json#/definitions/Base%20Type" }] } }
    }));

    let report = Orchestrator::default().build(&root, &[base, leaf]).unwrap();
    assert!(report
        .index
        .is_variant_of("common.json#/definitions/Base Type", "leaf.json#/definitions/Leaf"));
}

// =============================================================================
// Orchestration
// =============================================================================

#[test]
fn test_output_independent_of_task_order() {
    let (_dir, root) = spec_tree();
    let mut paths = vec![write(&root, "base.json", json!({
        "definitions": {
            "Shape": { "discriminator": "kind" },
            "Polygon": { "allOf": [{ "$ref": "#/definitions/Shape" }] }
        }
    }))];
    for i in 0..10 {
        paths.push(write(&root, &format!("shapes/s{i}.json"), json!({
            "definitions": {
                format!("Square{i}"): { "allOf": [{ "$ref": "../base.json#/definitions/Polygon" }] },
                format!("Circle{i}"): { "allOf": [{ "$ref": "../base.json#/definitions/Shape" }] },
                format!("Plain{i}"): { "type": "object" }
            }
        })));
    }

    let tasks = tasks_for(&paths);
    let mut reversed = tasks.clone();
    reversed.reverse();

    let forward = Orchestrator::default()
        .run(&Arc::new(BuildContext::new(&root, 20)), tasks)
        .unwrap();
    let backward = Orchestrator::default()
        .run(&Arc::new(BuildContext::new(&root, 20)), reversed)
        .unwrap();

    assert_eq!(forward.index.count, 21);
    assert_eq!(forward.index, backward.index);
}

#[test]
fn test_timeout_returns_no_index() {
    let (_dir, root) = spec_tree();
    let mut paths = Vec::new();
    for i in 0..50 {
        paths.push(write(&root, &format!("f{i}.json"), json!({
            "definitions": {
                "Base": { "discriminator": "kind" },
                "Child": { "allOf": [{ "$ref": "#/definitions/Base" }] }
            }
        })));
    }

    let settings = BuildSettings {
        timeout: Duration::ZERO,
        ..BuildSettings::default()
    };
    let err = Orchestrator::new(settings).build(&root, &paths).unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err}");
}

#[test]
fn test_collect_policy_keeps_good_schemas() {
    let (_dir, root) = spec_tree();
    let good = write(&root, "good.json", json!({
        "definitions": {
            "Base": { "discriminator": "kind" },
            "Child": { "allOf": [{ "$ref": "#/definitions/Base" }] },
            "Dangling": { "allOf": [{ "$ref": "#/definitions/Nowhere" }] }
        }
    }));

    let err = Orchestrator::default().build(&root, &[good.clone()]).unwrap_err();
    assert!(matches!(err, VariantError::UnresolvedReference { .. }));

    let settings = BuildSettings {
        error_policy: ErrorPolicy::Collect,
        ..BuildSettings::default()
    };
    let report = Orchestrator::new(settings).build(&root, &[good]).unwrap();
    assert_eq!(report.index.count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].schema.as_deref(), Some("Dangling"));
}

// =============================================================================
// Full pipeline
// =============================================================================

#[test]
fn test_build_index_from_readmes() {
    let (_dir, root) = spec_tree();
    let rm = root.join("pets/resource-manager");
    write(&rm, "stable/2024-01-01/pets.json", json!({
        "definitions": {
            "Pet": { "discriminator": "kind" },
            "Cat": { "allOf": [{ "$ref": "#/definitions/Pet" }] }
        }
    }));
    write(&root, "pets/resource-manager/examples/Example.json", json!({ "not": "a spec" }));
    fs::write(
        rm.join("readme.md"),
        "# Pets\n\n```yaml $(tag) == 'package-2024'\ninput-file:\n  - stable/2024-01-01/pets.json\n```\n",
    )
    .unwrap();

    let report = build_index(&root, &VariantConfig::default()).unwrap();
    assert_eq!(report.index.commit, "");
    assert_eq!(report.index.count, 1);
    assert!(report.index.is_variant_of(
        "pets/resource-manager/stable/2024-01-01/pets.json#/definitions/Pet",
        "pets/resource-manager/stable/2024-01-01/pets.json#/definitions/Cat"
    ));
}

#[test]
fn test_build_index_rejects_wrong_root() {
    let dir = tempdir().unwrap();
    let err = build_index(dir.path(), &VariantConfig::default()).unwrap_err();
    assert!(matches!(err, VariantError::InvalidSpecRoot(_)));
}

#[test]
fn test_index_written_and_reloaded() {
    let (dir, root) = spec_tree();
    write(&root, "x.json", json!({
        "definitions": {
            "Base": { "discriminator": "kind" },
            "Leaf": { "allOf": [{ "$ref": "#/definitions/Base" }] }
        }
    }));
    let collector = StaticCollector {
        paths: vec![PathBuf::from("x.json")],
    };
    let report = build_index_with(&root, &VariantConfig::default(), &collector).unwrap();

    let out = dir.path().join("variants.json");
    fs::write(&out, report.index.to_json(Default::default()).unwrap()).unwrap();
    let loaded = Index::load(&out).unwrap();
    assert_eq!(loaded, report.index);
    assert!(loaded.is_variant_of("x.json#/definitions/Base", "x.json#/definitions/Leaf"));
}

#[test]
fn test_cli_rejects_non_specification_dir() {
    let dir = tempdir().unwrap();
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_swagger-variants"))
        .arg("build")
        .arg(dir.path())
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_cli_writes_index_to_file() {
    let (dir, root) = spec_tree();
    let rm = root.join("svc/resource-manager");
    write(&rm, "api.json", json!({
        "definitions": {
            "Base": { "discriminator": "kind" },
            "Leaf": { "allOf": [{ "$ref": "#/definitions/Base" }] }
        }
    }));
    fs::write(rm.join("readme.md"), "```yaml $(tag) == 'v1'\ninput-file: api.json\n```\n").unwrap();
    let out = dir.path().join("out.json");

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_swagger-variants"))
        .arg("build")
        .arg(&root)
        .arg("--output")
        .arg(&out)
        .env("RUST_LOG", "warn")
        .status()
        .unwrap();
    assert!(status.success());

    let index = Index::load(&out).unwrap();
    assert_eq!(index.count, 1);
}

fn dangling_ref_tree() -> (TempDir, PathBuf) {
    let (dir, root) = spec_tree();
    let rm = root.join("svc/resource-manager");
    write(&rm, "api.json", json!({
        "definitions": {
            "Base": { "discriminator": "kind" },
            "Leaf": { "allOf": [{ "$ref": "#/definitions/Base" }] },
            "Dangling": { "allOf": [{ "$ref": "#/definitions/Nowhere" }] }
        }
    }));
    let readme = "```yaml $(tag) == 'v1'\ninput-file: api.json\n```\n";
    fs::write(rm.join("readme.md"), readme).unwrap();
    (dir, root)
}

#[test]
fn test_cli_writes_index_to_stdout() {
    let (_dir, root) = spec_tree();
    let rm = root.join("svc/resource-manager");
    write(&rm, "api.json", json!({
        "definitions": {
            "Base": { "discriminator": "kind" },
            "Leaf": { "allOf": [{ "$ref": "#/definitions/Base" }] }
        }
    }));
    fs::write(rm.join("readme.md"), "```yaml $(tag) == 'v1'\ninput-file: api.json\n```\n").unwrap();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_swagger-variants"))
        .arg("build")
        .arg(&root)
        .env("RUST_LOG", "info")
        .output()
        .unwrap();
    assert!(output.status.success());

    let index = Index::from_json(&String::from_utf8(output.stdout).unwrap()).unwrap();
    assert_eq!(index.count, 1);
    assert!(index.is_variant_of(
        "svc/resource-manager/api.json#/definitions/Base",
        "svc/resource-manager/api.json#/definitions/Leaf"
    ));
    assert!(String::from_utf8_lossy(&output.stderr).contains("variant index built"));
}

#[test]
fn test_cli_keep_going_writes_partial_index() {
    let (_dir, root) = dangling_ref_tree();
    let bin = env!("CARGO_BIN_EXE_swagger-variants");

    let strict = std::process::Command::new(bin)
        .arg("build")
        .arg(&root)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert_eq!(strict.status.code(), Some(1));
    assert!(strict.stdout.is_empty());

    let partial = std::process::Command::new(bin)
        .arg("build")
        .arg(&root)
        .arg("--keep-going")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert_eq!(partial.status.code(), Some(2));

    let index = Index::from_json(&String::from_utf8(partial.stdout).unwrap()).unwrap();
    assert_eq!(index.count, 1);
    assert!(index.is_variant_of(
        "svc/resource-manager/api.json#/definitions/Base",
        "svc/resource-manager/api.json#/definitions/Leaf"
    ));
    let stderr = String::from_utf8_lossy(&partial.stderr);
    assert!(stderr.contains("skipped") && stderr.contains("Dangling"));
}

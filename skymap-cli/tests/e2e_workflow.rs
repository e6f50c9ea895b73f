//! Runs the `skymap` binary through init, discover, summary and search.

mod common;

use common::{skymap, stderr, stdout, write_snapshot};
use pretty_assertions::assert_eq;
use skymap_graph::{MemoryStore, RelationshipKind};
use tempfile::tempdir;

#[test]
fn test_init_discover_summary() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path());

    let init = skymap(dir.path(), &["init"]);
    assert!(init.status.success(), "{}", stderr(&init));
    assert!(dir.path().join("skymap.yaml").exists());

    let discover = skymap(dir.path(), &["discover", "--snapshot", "snapshot.yaml"]);
    assert!(discover.status.success(), "{}", stderr(&discover));
    assert!(stdout(&discover).contains("Graph saved to"));

    let graph_path = dir.path().join(".skymap/graph.json");
    let store = MemoryStore::open(&graph_path).unwrap();
    assert_eq!(store.graph().metadata.run_count, 1);
    assert_eq!(
        store
            .graph()
            .edges_by_kind(RelationshipKind::ConnectedViaVpcPeering)
            .count(),
        1
    );

    let summary = skymap(dir.path(), &["summary"]);
    assert!(summary.status.success(), "{}", stderr(&summary));
    let text = stdout(&summary);
    assert!(text.contains("111122223333"));
    assert!(text.contains("444455556666"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = tempdir().unwrap();
    assert!(skymap(dir.path(), &["init"]).status.success());

    let again = skymap(dir.path(), &["init"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("--force"));

    assert!(skymap(dir.path(), &["init", "--force"]).status.success());
}

#[test]
fn test_missing_config_file_reports_suggestion() {
    let dir = tempdir().unwrap();

    let result = skymap(dir.path(), &["discover", "--config", "missing.yaml"]);

    assert!(!result.status.success());
    assert!(stderr(&result).contains("skymap init"));
}

#[test]
fn test_discover_without_source_fails() {
    let dir = tempdir().unwrap();

    let result = skymap(dir.path(), &["discover"]);

    assert!(!result.status.success());
    assert!(stderr(&result).contains("--snapshot"));
    assert!(!dir.path().join(".skymap/graph.json").exists());
}

#[test]
fn test_summary_without_graph_fails() {
    let dir = tempdir().unwrap();

    let result = skymap(dir.path(), &["summary"]);

    assert!(!result.status.success());
    assert!(stderr(&result).contains("skymap discover"));
}

#[test]
fn test_quiet_discover_prints_nothing() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path());

    let result = skymap(
        dir.path(),
        &["--quiet", "discover", "--snapshot", "snapshot.yaml", "--output", "out/g.json"],
    );

    assert!(result.status.success(), "{}", stderr(&result));
    assert_eq!(stdout(&result), "");
    assert!(dir.path().join("out/g.json").exists());
}

#[test]
fn test_search_saved_graph() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path());

    let discover = skymap(dir.path(), &["discover", "--snapshot", "snapshot.yaml"]);
    assert!(discover.status.success(), "{}", stderr(&discover));

    let found = skymap(dir.path(), &["search", "VPC-1"]);
    assert!(found.status.success(), "{}", stderr(&found));
    let text = stdout(&found);
    assert!(text.contains("vpc-1"));
    assert!(!text.contains("pcx-1"));

    let none = skymap(dir.path(), &["search", "lambda"]);
    assert!(none.status.success(), "{}", stderr(&none));
    assert!(stdout(&none).contains("No resources match"));
}

#[test]
fn test_search_without_graph_fails() {
    let dir = tempdir().unwrap();

    let result = skymap(dir.path(), &["search", "vpc"]);

    assert!(!result.status.success());
    assert!(stderr(&result).contains("skymap discover"));
}

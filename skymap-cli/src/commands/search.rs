//! Implementation of the `skymap search` command.
//!
//! Finds resources in a saved graph whose type, identifier, service or ARN
//! contains the search text, ignoring case.

use super::summary::open_saved_graph;
use crate::config::SkymapConfig;
use crate::errors::CliError;
use crate::output;
use serde_json::Value;
use skymap_graph::{GraphQuery, QueryRecord};

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Text to look for.
    pub query: String,

    /// Override input graph path.
    pub input: Option<String>,

    /// Stop after this many matches.
    pub limit: Option<usize>,
}

/// Run the `skymap search` command. Returns the matching node rows.
pub fn run_search(
    options: SearchOptions,
    config: &SkymapConfig,
) -> Result<Vec<QueryRecord>, CliError> {
    let text = options.query.trim();
    if text.is_empty() {
        return Err(CliError::EmptySearch);
    }

    let (store, graph_display) = open_saved_graph(options.input, config)?;
    let matches = store.graph().query(&GraphQuery::Search {
        text: text.to_string(),
        limit: options.limit,
    });
    tracing::debug!(graph = %graph_display, query = text, matches = matches.len(), "Searched graph");

    if matches.is_empty() {
        output::info(&format!("No resources match '{text}'"));
        return Ok(matches);
    }

    output::heading(&format!("{} resource(s) matching '{text}'", matches.len()));
    for row in &matches {
        let label = row.get("label").and_then(Value::as_str).unwrap_or_default();
        let key = row.get("key").and_then(Value::as_str).unwrap_or_default();
        output::stat(label, key);
        if let Some(region) = row
            .get("properties")
            .and_then(|p| p.get("region"))
            .and_then(Value::as_str)
        {
            output::verbose(&format!("region {region}"));
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use skymap_graph::{GraphStore, Label, MemoryStore, NodeKey, Properties};
    use tempfile::tempdir;

    fn saved_graph(dir: &std::path::Path) -> String {
        let mut store = MemoryStore::new();
        for (resource_type, identifier, service) in [
            ("AWS::EC2::VPC", "vpc-prod", "ec2"),
            ("AWS::RDS::DBCluster", "aurora-prod", "rds"),
            ("AWS::S3::Bucket", "audit-logs", "s3"),
        ] {
            let mut properties = Properties::new();
            properties.insert("resource_type".into(), resource_type.into());
            properties.insert("identifier".into(), identifier.into());
            properties.insert("service".into(), service.into());
            store
                .upsert_node(
                    &Label::for_resource_type(resource_type).unwrap(),
                    &NodeKey::new(format!("{resource_type}/{identifier}")).unwrap(),
                    properties,
                )
                .unwrap();
        }
        let path = dir.join("graph.json");
        store.persist(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    fn keys(rows: &[QueryRecord]) -> Vec<&str> {
        rows.iter()
            .filter_map(|row| row["key"].as_str())
            .collect()
    }

    #[test]
    fn test_search_finds_resources_by_identifier() {
        output::set_quiet(true);
        let dir = tempdir().unwrap();
        let input = saved_graph(dir.path());

        let options = SearchOptions {
            query: "PROD".into(),
            input: Some(input),
            limit: None,
        };
        let rows = run_search(options, &SkymapConfig::default()).unwrap();
        assert_eq!(
            keys(&rows),
            vec!["AWS::EC2::VPC/vpc-prod", "AWS::RDS::DBCluster/aurora-prod"]
        );
    }

    #[test]
    fn test_search_by_service_with_limit() {
        output::set_quiet(true);
        let dir = tempdir().unwrap();
        let input = saved_graph(dir.path());

        let options = SearchOptions {
            query: "aws::".into(),
            input: Some(input),
            limit: Some(2),
        };
        let rows = run_search(options, &SkymapConfig::default()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_search_without_matches_is_empty() {
        output::set_quiet(true);
        let dir = tempdir().unwrap();
        let input = saved_graph(dir.path());

        let options = SearchOptions {
            query: "lambda".into(),
            input: Some(input),
            limit: None,
        };
        assert!(run_search(options, &SkymapConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_blank_search_is_rejected() {
        let options = SearchOptions {
            query: "  ".into(),
            ..Default::default()
        };
        let result = run_search(options, &SkymapConfig::default());
        assert!(matches!(result, Err(CliError::EmptySearch)));
    }

    #[test]
    fn test_search_missing_graph() {
        let dir = tempdir().unwrap();
        let options = SearchOptions {
            query: "vpc".into(),
            input: Some(dir.path().join("none.json").to_string_lossy().to_string()),
            limit: None,
        };
        let result = run_search(options, &SkymapConfig::default());
        assert!(matches!(result, Err(CliError::GraphNotFound { .. })));
    }
}

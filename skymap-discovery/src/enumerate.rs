//! Concurrent resource enumeration.
//!
//! One task per resource type, bounded by a semaphore. Each task lists its
//! type through the [`ResourceLister`], normalizes the raw results into
//! [`ResourceRecord`]s and hands them back; nothing is shared between tasks
//! except the lister itself.

use crate::error::{DiscoveryError, ListError};
use crate::record::{RawResource, ResourceRecord};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default bound on concurrently listed resource types.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// The enumeration collaborator.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// Account the credentials belong to. Called once before any listing;
    /// an error here is fatal.
    async fn caller_account(&self) -> Result<String, ListError>;

    /// Region every listed resource belongs to.
    fn region(&self) -> &str;

    /// Every resource of one type.
    async fn list(&self, resource_type: &str) -> Result<Vec<RawResource>, ListError>;
}

/// Error messages that mean "nothing to list here" rather than a failure.
/// Every needle of an entry must appear in the lower-cased message.
const SKIPPABLE_MESSAGES: &[&[&str]] = &[
    &["throttlingexception"],
    &["rate exceeded"],
    &["too many requests"],
    &["required key", "not found"],
    &["required property"],
    &["does not support list action"],
    &["unsupportedactionexception"],
    &["typenotfoundexception"],
    &["cannot be found"],
    &["operation is not supported"],
    &["subscription does not exist"],
    &["not registered as a publisher"],
    &["linked account", "access"],
];

/// Types whose list call is known to fail: missing required keys,
/// unsupported list action, unknown type or a required subscription.
const NON_LISTABLE_TYPES: &[&str] = &[
    "AWS::AutoScaling::WarmPool",
    "AWS::AutoScaling::LifecycleHook",
    "AWS::Bedrock::FlowVersion",
    "AWS::Bedrock::PromptVersion",
    "AWS::CleanRooms::AnalysisTemplate",
    "AWS::CleanRooms::IdMappingTable",
    "AWS::CleanRooms::IdNamespaceAssociation",
    "AWS::WAFv2::RuleGroup",
    "AWS::WAFv2::WebACL",
    "AWS::WAFv2::WebACLAssociation",
    "AWS::WorkSpaces::WorkspacesPool",
    "AWS::WorkSpaces::ConnectionAlias",
    "AWS::WorkSpacesWeb::UserSettings",
    "AWS::WorkSpacesWeb::UserAccessLoggingSettings",
    "AWS::WorkSpacesWeb::TrustStore",
    "AWS::WorkSpacesWeb::Portal",
    "AWS::WorkSpacesWeb::NetworkSettings",
    "AWS::WorkSpacesWeb::IpAccessSettings",
    "AWS::WorkSpacesWeb::DataProtectionSettings",
    "AWS::WorkSpacesWeb::BrowserSettings",
    "AWS::Shield::Protection",
    "AWS::CloudFormation::Publisher",
    "AWS::CE::CostCategory",
];

/// Decides whether a list failure is a silent skip.
#[derive(Debug, Clone)]
pub struct SkipClassifier {
    messages: Vec<Vec<String>>,
    non_listable: BTreeSet<String>,
}

impl Default for SkipClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl SkipClassifier {
    pub fn standard() -> Self {
        Self {
            messages: SKIPPABLE_MESSAGES
                .iter()
                .map(|needles| needles.iter().map(|n| n.to_string()).collect())
                .collect(),
            non_listable: NON_LISTABLE_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Also treat messages containing `needle` as skips.
    pub fn with_message(mut self, needle: &str) -> Self {
        self.messages.push(vec![needle.to_ascii_lowercase()]);
        self
    }

    pub fn with_non_listable(mut self, resource_type: &str) -> Self {
        self.non_listable.insert(resource_type.to_string());
        self
    }

    pub fn is_skippable(&self, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        self.messages
            .iter()
            .any(|needles| needles.iter().all(|n| message.contains(n.as_str())))
    }

    pub fn is_non_listable(&self, resource_type: &str) -> bool {
        self.non_listable.contains(resource_type)
    }
}

/// How listing one type went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeOutcome {
    /// Number of resources found
    Listed(usize),
    /// Known-benign failure or non-listable type
    Skipped(String),
    /// Unexpected failure, recorded as an error-tagged record
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TypeReport {
    pub resource_type: String,
    pub outcome: TypeOutcome,
    pub elapsed: Duration,
}

/// Counts over a finished enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationStats {
    pub listed_types: usize,
    pub skipped_types: usize,
    pub failed_types: usize,
    pub resources: usize,
}

#[derive(Debug, Default)]
pub struct EnumerationResult {
    /// Records in the order their types were requested
    pub records: Vec<ResourceRecord>,
    pub reports: Vec<TypeReport>,
    /// Cancellation stopped new types from being listed
    pub interrupted: bool,
}

impl EnumerationResult {
    pub fn stats(&self) -> EnumerationStats {
        let mut stats = EnumerationStats::default();
        for report in &self.reports {
            match report.outcome {
                TypeOutcome::Listed(count) => {
                    stats.listed_types += 1;
                    stats.resources += count;
                }
                TypeOutcome::Skipped(_) => stats.skipped_types += 1,
                TypeOutcome::Failed(_) => stats.failed_types += 1,
            }
        }
        stats
    }

    pub fn failures(&self) -> impl Iterator<Item = &TypeReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TypeOutcome::Failed(_)))
    }
}

/// Shared stop signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Called once per finished resource type, from the worker task.
pub type ProgressHook = Arc<dyn Fn(&TypeReport) + Send + Sync>;

/// Lists many resource types concurrently.
pub struct Enumerator {
    lister: Arc<dyn ResourceLister>,
    max_workers: usize,
    classifier: Arc<SkipClassifier>,
    cancel: CancellationFlag,
    progress: Option<ProgressHook>,
}

impl Enumerator {
    pub fn new(lister: Arc<dyn ResourceLister>) -> Self {
        Self {
            lister,
            max_workers: DEFAULT_MAX_WORKERS,
            classifier: Arc::new(SkipClassifier::standard()),
            cancel: CancellationFlag::new(),
            progress: None,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_classifier(mut self, classifier: SkipClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: ProgressHook) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Credential check. Must succeed before any listing.
    pub async fn account(&self) -> Result<String, DiscoveryError> {
        self.lister
            .caller_account()
            .await
            .map_err(DiscoveryError::Credentials)
    }

    /// List every type in `resource_types` for `account`.
    pub async fn run(&self, account: &str, resource_types: &[String]) -> EnumerationResult {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();
        let mut result = EnumerationResult::default();

        tracing::info!(
            types = resource_types.len(),
            max_workers = self.max_workers,
            region = self.lister.region(),
            "Enumerating resource types"
        );

        for (order, resource_type) in resource_types.iter().enumerate() {
            if self.cancel.is_cancelled() {
                result.interrupted = true;
                break;
            }

            if self.classifier.is_non_listable(resource_type) {
                tracing::debug!(resource_type = %resource_type, "Skipping non-listable type");
                let report = TypeReport {
                    resource_type: resource_type.clone(),
                    outcome: TypeOutcome::Skipped("not listable".into()),
                    elapsed: Duration::ZERO,
                };
                if let Some(progress) = &self.progress {
                    progress(&report);
                }
                result.reports.push(report);
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            // Cancellation may have arrived while waiting for a slot
            if self.cancel.is_cancelled() {
                result.interrupted = true;
                break;
            }

            let lister = Arc::clone(&self.lister);
            let classifier = Arc::clone(&self.classifier);
            let progress = self.progress.clone();
            let account = account.to_string();
            let resource_type = resource_type.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let (records, report) =
                    list_type(lister.as_ref(), &classifier, &account, &resource_type).await;
                if let Some(progress) = &progress {
                    progress(&report);
                }
                (order, records, report)
            });
        }

        let mut batches = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((order, records, report)) => {
                    batches.push((order, records));
                    result.reports.push(report);
                }
                Err(e) => tracing::warn!(error = %e, "Enumeration task did not complete"),
            }
        }
        // A stop requested after the last spawn still marks the run incomplete
        if self.cancel.is_cancelled() {
            result.interrupted = true;
        }
        batches.sort_by_key(|(order, _)| *order);
        result.records = batches.into_iter().flat_map(|(_, records)| records).collect();

        let stats = result.stats();
        tracing::info!(
            listed = stats.listed_types,
            skipped = stats.skipped_types,
            failed = stats.failed_types,
            resources = stats.resources,
            interrupted = result.interrupted,
            "Enumeration complete"
        );
        result
    }
}

async fn list_type(
    lister: &dyn ResourceLister,
    classifier: &SkipClassifier,
    account: &str,
    resource_type: &str,
) -> (Vec<ResourceRecord>, TypeReport) {
    let started = Instant::now();
    let region = lister.region();

    let (records, outcome) = match lister.list(resource_type).await {
        Ok(raw) => {
            let records: Vec<ResourceRecord> = raw
                .iter()
                .map(|r| ResourceRecord::from_raw(resource_type, r, region, account))
                .collect();
            if records.is_empty() {
                tracing::debug!(resource_type, "No resources found");
            } else {
                tracing::info!(resource_type, count = records.len(), "Listed resources");
            }
            let count = records.len();
            (records, TypeOutcome::Listed(count))
        }
        Err(e) => {
            let message = e.to_string();
            if classifier.is_skippable(&message) {
                tracing::debug!(resource_type, reason = %message, "Skipping resource type");
                (Vec::new(), TypeOutcome::Skipped(message))
            } else {
                tracing::debug!(resource_type, error = %message, "Failed to list resource type");
                let failed = ResourceRecord::failed(resource_type, region, message.clone());
                (vec![failed], TypeOutcome::Failed(message))
            }
        }
    };

    let report = TypeReport {
        resource_type: resource_type.to_string(),
        outcome,
        elapsed: started.elapsed(),
    };
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeLister {
        responses: HashMap<String, Result<Vec<RawResource>, ListError>>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakeLister {
        fn with(mut self, resource_type: &str, result: Result<Vec<RawResource>, ListError>) -> Self {
            self.responses.insert(resource_type.to_string(), result);
            self
        }
    }

    #[async_trait]
    impl ResourceLister for FakeLister {
        async fn caller_account(&self) -> Result<String, ListError> {
            Ok("111".into())
        }

        fn region(&self) -> &str {
            "us-east-1"
        }

        async fn list(&self, resource_type: &str) -> Result<Vec<RawResource>, ListError> {
            self.calls.lock().unwrap().push(resource_type.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses
                .get(resource_type)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_outcomes_are_classified() {
        let lister = FakeLister::default()
            .with(
                "AWS::SQS::Queue",
                Ok(vec![RawResource::new("q1", r#"{"QueueName":"q1"}"#)]),
            )
            .with(
                "AWS::Foo::Bar",
                Err(ListError::Provider("ThrottlingException: Rate exceeded".into())),
            )
            .with(
                "AWS::SNS::Topic",
                Err(ListError::Provider("InternalFailure".into())),
            );

        let result = Enumerator::new(Arc::new(lister))
            .run(
                "111",
                &types(&["AWS::SQS::Queue", "AWS::Foo::Bar", "AWS::SNS::Topic"]),
            )
            .await;

        assert_eq!(
            result.stats(),
            EnumerationStats {
                listed_types: 1,
                skipped_types: 1,
                failed_types: 1,
                resources: 1,
            }
        );
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].id, "q1");
        assert!(result.records[1].has_error());
        assert_eq!(result.records[1].resource_type, "AWS::SNS::Topic");
        assert!(!result.interrupted);
    }

    #[tokio::test]
    async fn test_non_listable_types_are_never_called() {
        let lister = Arc::new(FakeLister::default());
        let result = Enumerator::new(lister.clone())
            .run("111", &types(&["AWS::Shield::Protection", "AWS::S3::Bucket"]))
            .await;

        assert_eq!(*lister.calls.lock().unwrap(), vec!["AWS::S3::Bucket".to_string()]);
        assert_eq!(result.stats().skipped_types, 1);
    }

    #[tokio::test]
    async fn test_worker_bound_is_respected() {
        let lister = Arc::new(FakeLister {
            delay: Some(Duration::from_millis(20)),
            ..FakeLister::default()
        });
        let names: Vec<String> = (0..8).map(|i| format!("AWS::Test::Kind{i}")).collect();

        let result = Enumerator::new(lister.clone())
            .with_max_workers(2)
            .run("111", &names)
            .await;

        assert_eq!(result.reports.len(), 8);
        assert!(lister.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_issues_nothing() {
        let lister = Arc::new(FakeLister::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = Enumerator::new(lister.clone())
            .with_cancellation(cancel)
            .run("111", &types(&["AWS::S3::Bucket"]))
            .await;

        assert!(result.interrupted);
        assert!(result.records.is_empty());
        assert!(lister.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_hook_sees_every_type() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let hook: ProgressHook = Arc::new(move |report: &TypeReport| {
            sink.lock().unwrap().push(report.resource_type.clone());
        });

        Enumerator::new(Arc::new(FakeLister::default()))
            .with_progress(hook)
            .run("111", &types(&["AWS::S3::Bucket", "AWS::CE::CostCategory"]))
            .await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["AWS::CE::CostCategory", "AWS::S3::Bucket"]);
    }

    #[test]
    fn test_skip_classifier_is_case_insensitive() {
        let classifier = SkipClassifier::standard();
        assert!(classifier.is_skippable("TypeNotFoundException: AWS::X::Y"));
        assert!(classifier.is_skippable("Resource cannot be found"));
        assert!(!classifier.is_skippable("AccessDenied"));
        assert!(SkipClassifier::standard().with_message("AccessDenied").is_skippable("accessdenied"));
    }

    #[test]
    fn test_paired_skip_messages_need_both_parts() {
        let classifier = SkipClassifier::standard();
        assert!(classifier.is_skippable("Required key [Name] not found"));
        assert!(!classifier.is_skippable("Missing required key"));
        assert!(classifier.is_skippable("Linked account has no access to this resource"));
        assert!(!classifier.is_skippable("Linked account is suspended"));
    }

    #[tokio::test]
    async fn test_cancel_during_drain_marks_run_interrupted() {
        let lister = Arc::new(FakeLister {
            delay: Some(Duration::from_millis(200)),
            ..FakeLister::default()
        });
        let cancel = CancellationFlag::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = Enumerator::new(lister.clone())
            .with_cancellation(cancel)
            .run("111", &types(&["AWS::S3::Bucket", "AWS::SQS::Queue"]))
            .await;

        assert_eq!(lister.calls.lock().unwrap().len(), 2);
        assert!(result.interrupted);
    }
}

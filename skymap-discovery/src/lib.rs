//! Resource discovery and graph projection for skymap.
//!
//! This crate turns the resources of one cloud account into a property
//! graph held by a [`skymap_graph::GraphStore`].
//!
//! # Overview
//!
//! A discovery run goes through these stages:
//!
//! - **Enumeration**: list every selected resource type through a
//!   [`ResourceLister`], concurrently and with a worker bound
//! - **Projection**: upsert one node per record, owned by the account node
//! - **Expansion**: synthesize sub-resources (route entries, cluster members,
//!   broker users...) through per-family [`expand::ExpansionPattern`]s
//! - **Inference**: resolve identifier-looking property values to other
//!   resources and classify each reference into a relationship kind
//! - **Cross-account detection**: find transit gateway attachments and
//!   peering connections that reach into other accounts
//!
//! # Architecture
//!
//! Provider access sits behind two traits, [`ResourceLister`] and
//! [`DetailFetcher`]. A failure while listing one type, or while expanding
//! one parent, is recorded and the run goes on. Only a lost store connection
//! aborts a projection.
//!
//! [`SnapshotSource`] implements both traits from a file so a whole run can
//! be replayed offline.

pub mod classify;
pub mod cross_account;
pub mod enumerate;
pub mod error;
pub mod expand;
pub mod fetch;
pub mod flatten;
pub mod identity;
pub mod inference;
pub mod projector;
pub mod props;
pub mod record;
pub mod registry;
pub mod report;
pub mod source;

pub use cross_account::{
    ConnectionMechanism, CrossAccountDetection, CrossAccountDetector, CrossAccountLink,
    PeeringUpdate,
};
pub use enumerate::{
    CancellationFlag, DEFAULT_MAX_WORKERS, EnumerationResult, EnumerationStats, Enumerator,
    ProgressHook, ResourceLister, SkipClassifier, TypeOutcome, TypeReport,
};
pub use error::{DiscoveryError, FetchError, ListError, ProjectionError, RecordError};
pub use expand::{ExpansionFailure, SubResourceExpander};
pub use fetch::DetailFetcher;
pub use flatten::{flatten_properties, node_properties};
pub use identity::{IdentityResolver, MatchKind, Resolution};
pub use inference::{CandidateEdge, RelationshipInference};
pub use projector::{GraphProjector, ProjectionOptions, StalePolicy};
pub use record::{RawResource, ResourceRecord};
pub use registry::{ServiceDescriptor, ServiceRegistry};
pub use report::{CrossAccountSummary, ProjectionReport};
pub use source::SnapshotSource;

//! Copper developer API module
//!
//! Client, field schema, and the bulk update engine with its rate-limit
//! resilience layer.

pub mod client;
pub mod constants;
pub mod resilience;
pub mod schema;
pub mod update;

pub use client::CopperClient;
pub use resilience::{BackoffConfig, PermitPolicy, UpdateConfig};
pub use schema::{CustomFieldDefinition, FieldRef, SchemaLookup, SchemaSnapshot};
pub use update::{
    BulkTransport, BulkUpdater, ChangeSet, DispatchOutcome, TransportResponse, UpdateMode,
    UpdateReport,
};

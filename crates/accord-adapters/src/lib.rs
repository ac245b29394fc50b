//! Adapters for the two external collaborators of the contract engine: the knowledge
//! retrieval service and the compliance-policy service.

#![deny(unsafe_code)]

pub mod error;
pub mod http;
pub mod local;

pub use error::{AdapterError, AdapterResult};
pub use http::{HttpComplianceClient, HttpExtractionClient};
pub use local::{ExtractionFixtures, RuleBasedComplianceService, StaticExtractionService};

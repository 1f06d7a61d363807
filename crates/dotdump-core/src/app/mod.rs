//! App - application layer
//!
//! Composes the ports into the two things an operator runs.
//!
//! # Components
//! - **DumpOrchestrator**: in-pod collection (provision, collect, publish)
//! - **ToolProvisioner**: platform detection and collector download
//! - **RetrievalClient**: workstation side, drives a pod through kubectl
//! - **inventory**: checksum and directory listing helpers

pub mod inventory;
pub mod orchestrator;
pub mod provisioner;
pub mod retrieval;

pub use self::orchestrator::DumpOrchestrator;
pub use self::provisioner::{PACKAGE_MANAGERS, PackageManager, ToolProvisioner};
pub use self::retrieval::{PodSelector, RetrievalClient, RetrievalOptions, RetrievedDump};

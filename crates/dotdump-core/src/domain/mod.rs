//! Domain model (request, platform, plan, artifact, errors).

pub mod artifact;
pub mod config;
pub mod errors;
pub mod plan;
pub mod platform;
pub mod request;

pub use artifact::{DumpArtifact, EntryKind, ListingEntry};
pub use config::CollectorConfig;
pub use errors::{DumpError, ErrorKind};
pub use plan::{ExecutionPlan, LATEST_LINK_NAME, TOOL_NAME};
pub use platform::{Arch, Libc, Platform};
pub use request::{CollectionParams, CollectionRequest, DumpType, Strategy, TargetPid};

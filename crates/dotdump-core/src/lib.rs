//! dotdump-core
//!
//! Building blocks for collecting a .NET process dump from inside a pod and
//! pulling it back to the operator's workstation.
//!
//! # Modules
//! - **domain**: request, platform, execution plan, artifact and error types
//! - **ports**: seams to the outside world (commands, platform probing, time)
//! - **impls**: tokio-backed and scripted implementations of the ports, plus the kubectl adapter
//! - **app**: tool provisioner, dump orchestrator and retrieval client

pub mod domain;
pub mod ports;
pub mod impls;
pub mod app;

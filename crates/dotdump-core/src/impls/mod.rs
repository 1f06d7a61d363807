//! Impls - implementations of the ports, plus the kubectl adapter
//!
//! - **TokioCommandRunner**: real child processes
//! - **HostProbe**: `uname -m` and the musl marker file
//! - **ScriptedRunner**: in-memory runner for development and tests
//! - **Kubectl**: cluster verbs on top of any CommandRunner

pub mod host_probe;
pub mod kubectl;
pub mod process_runner;
pub mod scripted_runner;

pub use self::host_probe::HostProbe;
pub use self::kubectl::{Kubectl, PodTarget};
pub use self::process_runner::TokioCommandRunner;
pub use self::scripted_runner::ScriptedRunner;

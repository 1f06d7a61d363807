//! Ports - seams to the outside world
//!
//! Core logic never spawns a process, reads `uname` or asks for the time
//! directly. It goes through these traits so tests can script every side
//! effect except the filesystem, which they point at a temp directory.

pub mod clock;
pub mod command_runner;
pub mod platform_probe;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::command_runner::{CommandOutput, CommandRunner, CommandSpec, OutputMode};
pub use self::platform_probe::PlatformProbe;

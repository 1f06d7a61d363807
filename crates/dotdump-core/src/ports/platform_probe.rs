//! PlatformProbe port - what kind of machine the collector will run on.

use async_trait::async_trait;

use crate::domain::errors::DumpError;
use crate::domain::platform::Libc;

#[async_trait]
pub trait PlatformProbe: Send + Sync {
    /// Raw hardware name as reported by the kernel (`uname -m`).
    async fn machine(&self) -> Result<String, DumpError>;

    /// C library flavor of the running distribution.
    async fn libc(&self) -> Libc;
}

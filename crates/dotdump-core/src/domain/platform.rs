//! Platform (CPU architecture x C library) and the collector download it selects.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::DumpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Maps `uname -m` output. Anything other than `x86_64` / `aarch64` is unknown.
    pub fn from_machine(machine: &str) -> Option<Self> {
        match machine.trim() {
            "x86_64" => Some(Arch::X86_64),
            "aarch64" => Some(Arch::Aarch64),
            _ => None,
        }
    }

    /// Architecture label used in download names.
    pub fn label(self) -> &'static str {
        match self {
            Arch::X86_64 => "x64",
            Arch::Aarch64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Libc {
    Glibc,
    Musl,
}

impl fmt::Display for Libc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Libc::Glibc => f.write_str("glibc"),
            Libc::Musl => f.write_str("musl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub arch: Arch,
    pub libc: Libc,
}

impl Platform {
    pub fn new(arch: Arch, libc: Libc) -> Self {
        Self { arch, libc }
    }

    /// Resolve a raw machine string. Unknown machines are rejected, never guessed.
    pub fn resolve(machine: &str, libc: Libc) -> Result<Self, DumpError> {
        let arch = Arch::from_machine(machine).ok_or_else(|| DumpError::UnsupportedPlatform {
            machine: machine.trim().to_string(),
            libc,
        })?;
        Ok(Self::new(arch, libc))
    }

    /// Fixed download location of the collector for this platform.
    pub fn collector_url(&self) -> &'static str {
        match (self.arch, self.libc) {
            (Arch::X86_64, Libc::Glibc) => "https://aka.ms/dotnet-dump/linux-x64",
            (Arch::Aarch64, Libc::Glibc) => "https://aka.ms/dotnet-dump/linux-arm64",
            (Arch::X86_64, Libc::Musl) => "https://aka.ms/dotnet-dump/linux-musl-x64",
            (Arch::Aarch64, Libc::Musl) => "https://aka.ms/dotnet-dump/linux-musl-arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.arch, self.libc)
    }
}

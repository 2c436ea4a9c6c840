//! Core type definitions for reclaim analysis

use serde::{Deserialize, Serialize};
use std::fmt;

/// Presentation unit for byte quantities such as TBW.
///
/// Units are binary: one MB is 1024 * 1024 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteUnit {
    #[serde(rename = "B")]
    Bytes,
    #[serde(rename = "MB")]
    Megabytes,
    #[serde(rename = "GB")]
    Gigabytes,
    #[serde(rename = "TB")]
    Terabytes,
}

impl ByteUnit {
    /// Number of bytes in one unit
    pub fn bytes_per_unit(&self) -> f64 {
        match self {
            ByteUnit::Bytes => 1.0,
            ByteUnit::Megabytes => 1024.0 * 1024.0,
            ByteUnit::Gigabytes => 1024.0 * 1024.0 * 1024.0,
            ByteUnit::Terabytes => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        }
    }

    /// Convert a byte count into this unit
    pub fn convert(&self, bytes: f64) -> f64 {
        bytes / self.bytes_per_unit()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ByteUnit::Bytes => "B",
            ByteUnit::Megabytes => "MB",
            ByteUnit::Gigabytes => "GB",
            ByteUnit::Terabytes => "TB",
        }
    }
}

impl Default for ByteUnit {
    fn default() -> Self {
        ByteUnit::Terabytes
    }
}

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for ByteUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "B" | "BYTES" => Ok(ByteUnit::Bytes),
            "MB" | "MIB" => Ok(ByteUnit::Megabytes),
            "GB" | "GIB" => Ok(ByteUnit::Gigabytes),
            "TB" | "TIB" => Ok(ByteUnit::Terabytes),
            _ => Err(format!("Unknown byte unit: {}", s)),
        }
    }
}

/// Kind of a device I/O operation in a replay trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Write,
    Read,
}

impl OperationKind {
    /// Numeric code used by the trace-driven simulator
    pub fn code(&self) -> u8 {
        match self {
            OperationKind::Write => 0,
            OperationKind::Read => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OperationKind::Write),
            1 => Some(OperationKind::Read),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Write => write!(f, "WRITE"),
            OperationKind::Read => write!(f, "READ"),
        }
    }
}

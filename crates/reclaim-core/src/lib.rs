//! # reclaim-core
//!
//! Shared records for estimating how a flash read-reclaim policy trades
//! reliability against endurance under repeated LLM weight streaming.
//!
//! This crate provides:
//!
//! - Immutable configuration records for the model, device and calibration
//! - The reliability strategy selection and its parameter sets
//! - Layered configuration loading (defaults, YAML file, environment)
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{
    AnalysisConfig, FlashGeometry, ModelProfile, ReadRateCalibration, RberCoefficients,
    ReliabilityConfig, WorkloadScenario,
};
pub use error::{Error, ErrorContext, Result};
pub use types::{ByteUnit, OperationKind};

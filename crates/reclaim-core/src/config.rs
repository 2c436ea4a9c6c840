//! Configuration management for reclaim analysis
//!
//! Every quantity the projection engine needs is carried in an explicit,
//! immutable record. Records are loaded from YAML files, environment
//! variables and built-in defaults, then validated before any computation.

use crate::types::ByteUnit;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "RECLAIM_CONFIG";

/// Prefix for per-field environment overrides, e.g. `RECLAIM__CAMPAIGN_TOKENS`
pub const ENV_PREFIX: &str = "RECLAIM";

/// Default thresholds swept by the trade-off analysis (reads per block)
pub const DEFAULT_THRESHOLDS: [u64; 10] = [
    10, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 100_000, 1_000_000,
];

/// Transformer model description used for byte-footprint calculations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Human readable model name
    pub name: String,
    pub hidden_size: u64,
    pub intermediate_size: u64,
    pub num_layers: u64,
    /// Bytes per parameter (2 for FP16)
    pub bytes_per_param: u64,
    /// Compute delay inserted after each layer's reads in a replay trace
    #[serde(default)]
    pub layer_compute_time_ns: Option<u64>,
}

impl ModelProfile {
    /// Llama2-70B in FP16
    pub fn llama2_70b() -> Self {
        Self {
            name: "Llama2-70B".to_string(),
            hidden_size: 8192,
            intermediate_size: 28672,
            num_layers: 80,
            bytes_per_param: 2,
            layer_compute_time_ns: None,
        }
    }

    /// Llama-7B in FP16 with a 20 ms per-layer compute delay
    pub fn llama_7b() -> Self {
        Self {
            name: "Llama-7B".to_string(),
            hidden_size: 4096,
            intermediate_size: 11008,
            num_layers: 32,
            bytes_per_param: 2,
            layer_compute_time_ns: Some(20_000_000),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(Error::config("hidden_size must be > 0"));
        }
        if self.intermediate_size == 0 {
            return Err(Error::config("intermediate_size must be > 0"));
        }
        if self.num_layers == 0 {
            return Err(Error::config("num_layers must be > 0"));
        }
        if self.bytes_per_param == 0 {
            return Err(Error::config("bytes_per_param must be > 0"));
        }
        Ok(())
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::llama2_70b()
    }
}

/// Flash device geometry, fixed per device class for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashGeometry {
    /// Blocks occupied by the model's weights
    pub total_blocks: u64,
    pub pages_per_block: u64,
    pub block_size_bytes: u64,
    /// Endurance limit in program/erase cycles
    pub pe_cycle_limit: u64,
}

impl FlashGeometry {
    /// Page size implied by the block size and page count
    pub fn page_size_bytes(&self) -> u64 {
        self.block_size_bytes / self.pages_per_block.max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_blocks == 0 {
            return Err(Error::config("total_blocks must be > 0"));
        }
        if self.pages_per_block == 0 {
            return Err(Error::config("pages_per_block must be > 0"));
        }
        if self.block_size_bytes == 0 {
            return Err(Error::config("block_size_bytes must be > 0"));
        }
        if self.pe_cycle_limit == 0 {
            return Err(Error::config("pe_cycle_limit must be > 0"));
        }
        Ok(())
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        // TLC NAND: 1536 pages x 16 KiB = 24 MiB per block
        Self {
            total_blocks: 17_920,
            pages_per_block: 1536,
            block_size_bytes: 24 * 1024 * 1024,
            pe_cycle_limit: 3000,
        }
    }
}

/// Measured flash reads per generated token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRateCalibration {
    /// Flash reads per token
    pub read_rate_per_token: f64,
    /// Coefficient of determination of the fit; informational only
    pub fit_quality: f64,
}

impl ReadRateCalibration {
    pub fn validate(&self) -> Result<()> {
        if !self.read_rate_per_token.is_finite() || self.read_rate_per_token <= 0.0 {
            return Err(Error::config(format!(
                "read_rate_per_token must be a positive number, got {}",
                self.read_rate_per_token
            )));
        }
        Ok(())
    }
}

impl Default for ReadRateCalibration {
    fn default() -> Self {
        Self {
            read_rate_per_token: 0.636,
            fit_quality: 0.999,
        }
    }
}

/// Named daily workload intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadScenario {
    pub name: String,
    pub tokens_per_day: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkloadScenario {
    pub fn new(name: impl Into<String>, tokens_per_day: u64) -> Self {
        Self {
            name: name.into(),
            tokens_per_day,
            description: None,
        }
    }

    /// Light, medium, heavy and extreme production loads
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                name: "Light Load (Research)".to_string(),
                tokens_per_day: 100_000_000,
                description: Some("Research lab, intermittent usage".to_string()),
            },
            Self {
                name: "Medium Load (Development)".to_string(),
                tokens_per_day: 500_000_000,
                description: Some("Development server, 8-hour workday".to_string()),
            },
            Self {
                name: "Heavy Load (Production)".to_string(),
                tokens_per_day: 1_000_000_000,
                description: Some("Production inference, continuous usage".to_string()),
            },
            Self {
                name: "Extreme Load (Data Center)".to_string(),
                tokens_per_day: 5_000_000_000,
                description: Some("High-throughput data center, multi-tenant".to_string()),
            },
        ]
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("scenario name cannot be empty"));
        }
        if self.tokens_per_day == 0 {
            return Err(Error::config(format!(
                "scenario '{}': tokens_per_day must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Coefficients of the power-law raw bit error rate model
///
/// `rber = epsilon + alpha*c^k + beta*c^m*t^n + gamma*c^p*r^q`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RberCoefficients {
    /// Error floor of fresh flash
    pub epsilon: f64,
    /// Wear-out term
    pub alpha: f64,
    pub k: f64,
    /// Retention term
    pub beta: f64,
    pub m: f64,
    pub n: f64,
    /// Read-disturb term
    pub gamma: f64,
    pub p: f64,
    pub q: f64,
}

impl RberCoefficients {
    /// Fit for 72-layer TLC NAND
    pub fn tlc_72_layer() -> Self {
        Self {
            epsilon: 1.48e-03,
            alpha: 3.90e-10,
            k: 2.05,
            beta: 6.28e-05,
            m: 0.14,
            n: 0.54,
            gamma: 3.73e-09,
            p: 0.33,
            q: 1.71,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("epsilon", self.epsilon),
            ("alpha", self.alpha),
            ("k", self.k),
            ("beta", self.beta),
            ("m", self.m),
            ("n", self.n),
            ("gamma", self.gamma),
            ("p", self.p),
            ("q", self.q),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(format!(
                    "RBER coefficient {} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for RberCoefficients {
    fn default() -> Self {
        Self::tlc_72_layer()
    }
}

/// Reliability strategy selection and its parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum ReliabilityConfig {
    /// Linear placeholder: `0.5*c + c*reads/1000`
    #[serde(rename = "simplified")]
    Simplified {
        /// Measured ECC failure rate per read
        ecc_failure_rate: f64,
    },
    /// Power-law RBER with wear-out, retention and read-disturb terms
    #[serde(rename = "physical")]
    Physical {
        coefficients: RberCoefficients,
        /// P/E cycles the evaluated blocks have already seen
        pe_cycles: f64,
        /// Hours since the evaluated blocks were programmed
        retention_hours: f64,
    },
}

impl ReliabilityConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ReliabilityConfig::Simplified { .. } => "simplified",
            ReliabilityConfig::Physical { .. } => "physical",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ReliabilityConfig::Simplified { ecc_failure_rate } => {
                if !ecc_failure_rate.is_finite() || *ecc_failure_rate <= 0.0 {
                    return Err(Error::config(format!(
                        "ecc_failure_rate must be a positive number, got {}",
                        ecc_failure_rate
                    )));
                }
            }
            ReliabilityConfig::Physical {
                coefficients,
                pe_cycles,
                retention_hours,
            } => {
                coefficients.validate()?;
                if !pe_cycles.is_finite() || *pe_cycles < 0.0 {
                    return Err(Error::config("pe_cycles must be finite and >= 0"));
                }
                if !retention_hours.is_finite() || *retention_hours < 0.0 {
                    return Err(Error::config("retention_hours must be finite and >= 0"));
                }
            }
        }
        Ok(())
    }
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        ReliabilityConfig::Simplified {
            ecc_failure_rate: 0.031,
        }
    }
}

/// Complete input contract of one threshold sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub model: ModelProfile,
    pub geometry: FlashGeometry,
    pub calibration: ReadRateCalibration,
    /// Ratio of hottest-block reads to the population average
    pub concentration_factor: f64,
    /// Fraction of blocks treated as hot
    pub hot_block_fraction: f64,
    /// Reclaim thresholds in reads per block
    pub thresholds: Vec<u64>,
    /// Campaign length in generated tokens
    pub campaign_tokens: u64,
    /// Daily token volume behind each result's `lifetime_years`
    #[serde(default = "default_reference_tokens_per_day")]
    pub reference_tokens_per_day: u64,
    #[serde(default)]
    pub scenarios: Vec<WorkloadScenario>,
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    /// Evaluate thresholds on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Presentation unit for TBW
    #[serde(default)]
    pub tbw_unit: ByteUnit,
}

fn default_parallel() -> bool {
    true
}

fn default_reference_tokens_per_day() -> u64 {
    1_000_000
}

impl AnalysisConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (`RECLAIM__*`)
    /// 2. Configuration file (`$RECLAIM_CONFIG` or `./reclaim.yaml`)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(config::File::with_name(&config_path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("./reclaim.yaml").required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Load configuration from a specific file layered over the defaults
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?)
            .add_source(config::File::from(path));

        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Read a complete configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(format!("failed to read {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.geometry.validate()?;
        self.calibration.validate()?;
        self.reliability.validate()?;

        if !self.concentration_factor.is_finite() || self.concentration_factor <= 0.0 {
            return Err(Error::config(format!(
                "concentration_factor must be a positive number, got {}",
                self.concentration_factor
            )));
        }
        if !self.hot_block_fraction.is_finite()
            || self.hot_block_fraction <= 0.0
            || self.hot_block_fraction > 1.0
        {
            return Err(Error::config(format!(
                "hot_block_fraction must be in (0, 1], got {}",
                self.hot_block_fraction
            )));
        }
        if self.campaign_tokens == 0 {
            return Err(Error::config("campaign_tokens must be > 0"));
        }
        if self.reference_tokens_per_day == 0 {
            return Err(Error::config("reference_tokens_per_day must be > 0"));
        }
        if self.thresholds.is_empty() {
            return Err(Error::config("Must specify at least one reclaim threshold"));
        }
        if self.thresholds.contains(&0) {
            return Err(Error::config("Reclaim thresholds must be > 0"));
        }
        let mut names = std::collections::HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate workload scenario name '{}'",
                    scenario.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: ModelProfile::default(),
            geometry: FlashGeometry::default(),
            calibration: ReadRateCalibration::default(),
            concentration_factor: 10.0,
            hot_block_fraction: 0.1,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            campaign_tokens: 10_000_000,
            reference_tokens_per_day: default_reference_tokens_per_day(),
            scenarios: WorkloadScenario::defaults(),
            reliability: ReliabilityConfig::default(),
            parallel: true,
            tbw_unit: ByteUnit::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geometry.total_blocks, 17_920);
        assert_eq!(config.geometry.page_size_bytes(), 16 * 1024);
        assert_eq!(config.thresholds.len(), 10);
        assert_eq!(config.scenarios.len(), 4);
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let mut config = AnalysisConfig::default();
        config.geometry.total_blocks = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));

        let mut config = AnalysisConfig::default();
        config.calibration.read_rate_per_token = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.concentration_factor = -1.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.hot_block_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.thresholds = vec![100, 0];
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.model.hidden_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_thresholds_rejected() {
        let mut config = AnalysisConfig::default();
        config.thresholds.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scenario_validation() {
        assert!(WorkloadScenario::new("idle", 0).validate().is_err());
        assert!(WorkloadScenario::new("", 10).validate().is_err());
        assert!(WorkloadScenario::new("busy", 10).validate().is_ok());
    }

    #[test]
    fn test_duplicate_scenario_names_rejected() {
        let config = AnalysisConfig {
            scenarios: vec![
                WorkloadScenario::new("x", 100),
                WorkloadScenario::new("x", 1_000_000_000),
            ],
            ..AnalysisConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_reliability_config_validation() {
        let bad = ReliabilityConfig::Simplified {
            ecc_failure_rate: 0.0,
        };
        assert!(bad.validate().is_err());

        let mut coefficients = RberCoefficients::tlc_72_layer();
        coefficients.q = f64::NAN;
        let bad = ReliabilityConfig::Physical {
            coefficients,
            pe_cycles: 0.0,
            retention_hours: 0.0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_preserves_reliability_tag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis.yaml");

        let mut config = AnalysisConfig::default();
        config.reliability = ReliabilityConfig::Physical {
            coefficients: RberCoefficients::tlc_72_layer(),
            pe_cycles: 1000.0,
            retention_hours: 24.0,
        };
        config.to_yaml_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("model: physical"));

        let loaded = AnalysisConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_from_file_layers_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "campaign_tokens: 5000000\nconcentration_factor: 20.0\n").unwrap();

        let config = AnalysisConfig::load_from_file(&path).unwrap();
        assert_eq!(config.campaign_tokens, 5_000_000);
        assert_eq!(config.concentration_factor, 20.0);
        assert_eq!(config.geometry, FlashGeometry::default());
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.yaml");
        std::fs::write(&path, "hot_block_fraction: 0.0\n").unwrap();

        assert!(AnalysisConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = AnalysisConfig::from_yaml_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}

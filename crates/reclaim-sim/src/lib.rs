//! # Read-Reclaim Trade-off Analysis
//!
//! Closed-form projection of how a flash read-reclaim threshold trades ECC
//! reliability against endurance when an LLM streams its weights from
//! storage for every generated token.
//!
//! ## Features
//!
//! - Model footprint and read-rate calibration from measured samples
//! - Hot-block trigger points, reclaim frequency and wear per threshold
//! - Pluggable reliability models: simplified linear or power-law RBER
//! - Lifespan projection for daily workload scenarios
//! - JSON, CSV and terminal reports
//! - Block-level replay traces for an external SSD simulator

pub mod distribution;
pub mod ecc;
pub mod policy;
pub mod reliability;
pub mod report;
pub mod serde_float;
pub mod sweep;
pub mod trace;
pub mod wear;
pub mod workload;

pub use distribution::{ReadDistribution, DEFAULT_CONCENTRATION_FACTOR};
pub use ecc::{DecodeOutcome, EccDecoder};
pub use policy::ReclaimPolicy;
pub use reliability::{
    PhysicalRber, ReadExposure, ReliabilityFactory, ReliabilityModel, SimplifiedReliability,
};
pub use report::{ReportInputs, SweepReport, TradeoffSummary};
pub use sweep::{
    ProjectionFault, ReclaimThresholdResult, ScenarioLifespan, ScenarioProjection, ThresholdSweep,
};
pub use trace::{TraceConfig, TraceGenerator, TraceRecord, TraceSummary};
pub use wear::{Lifetime, LifespanSeverity, WearProjection, DEFAULT_HOT_BLOCK_FRACTION};
pub use workload::{ModelFootprint, ReadRateFit, ReadSample, WorkloadModel, SECTOR_SIZE_BYTES};

pub use reclaim_core::{AnalysisConfig, Error, Result};

/// Wires one configuration through the models, the sweep and the report
#[derive(Debug)]
pub struct AnalysisRunner {
    config: AnalysisConfig,
    workload: WorkloadModel,
    sweep: ThresholdSweep,
}

impl AnalysisRunner {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let workload = WorkloadModel::new(&config.model)?;
        let sweep = ThresholdSweep::new(&config)?;

        let occupied = workload.blocks_occupied(&config.geometry);
        if occupied > config.geometry.total_blocks {
            tracing::warn!(
                "{} needs {} blocks but the device holds {}",
                config.model.name,
                occupied,
                config.geometry.total_blocks
            );
        }

        Ok(Self {
            config,
            workload,
            sweep,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn workload(&self) -> &WorkloadModel {
        &self.workload
    }

    pub fn sweep(&self) -> &ThresholdSweep {
        &self.sweep
    }

    /// Evaluate a single threshold outside the configured list
    pub fn evaluate_threshold(&self, threshold: u64) -> Result<ReclaimThresholdResult> {
        self.sweep.evaluate(threshold)
    }

    /// Run the configured sweep and assemble the report
    pub fn run(&self) -> Result<SweepReport> {
        tracing::info!(
            "Sweeping {} thresholds for {} over {} tokens ({} reliability model)",
            self.config.thresholds.len(),
            self.config.model.name,
            self.config.campaign_tokens,
            self.sweep.reliability().name()
        );

        let results = self.sweep.run(&self.config.thresholds)?;
        let faulted = results.iter().filter(|r| r.is_faulted()).count();
        if faulted > 0 {
            tracing::warn!("{} of {} thresholds carry a fault", faulted, results.len());
        }

        let scenarios = self.sweep.scenario_lifespans(&results, &self.config.scenarios);

        Ok(SweepReport::new(
            ReportInputs::new(&self.config, &self.sweep),
            self.workload.footprint(&self.config.geometry),
            *self.sweep.distribution(),
            results,
            scenarios,
        ))
    }
}

use rayon::prelude::*;
use reclaim_core::{AnalysisConfig, ByteUnit, Error, Result, WorkloadScenario};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::distribution::ReadDistribution;
use crate::ecc::{DecodeOutcome, EccDecoder};
use crate::policy::ReclaimPolicy;
use crate::reliability::{ReadExposure, ReliabilityFactory, ReliabilityModel};
use crate::serde_float;
use crate::wear::{Lifetime, LifespanSeverity, WearProjection};
use crate::workload::WorkloadModel;

/// A failure attached to one result row instead of aborting the sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionFault {
    pub category: String,
    pub message: String,
}

impl From<&Error> for ProjectionFault {
    fn from(err: &Error) -> Self {
        Self {
            category: err.category().to_string(),
            message: err.to_string(),
        }
    }
}

/// Projection for one reclaim threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReclaimThresholdResult {
    /// Reads per block that trigger a reclaim
    pub threshold: u64,
    /// Tokens until the hottest block first reaches the threshold
    #[serde(with = "serde_float")]
    pub tokens_to_trigger: f64,
    /// Reclaims of one hot block over the campaign
    pub reclaims_per_hot_block: f64,
    /// Block migrations over the campaign
    pub total_reclaims: f64,
    /// Campaign P/E cycles averaged over all blocks
    pub avg_pe_cycles: f64,
    /// Bytes written by reclaim over the campaign
    pub tbw_bytes: f64,
    /// `tbw_bytes` in `tbw_unit`
    pub tbw: f64,
    pub tbw_unit: ByteUnit,
    /// Reads a block holds when the reclaim fires (or at campaign end)
    pub accumulated_reads: f64,
    #[serde(with = "serde_float::option", default)]
    pub ecc_failure_rate: Option<f64>,
    /// Decoder outcome when the reliability model yields a raw bit error rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode: Option<DecodeOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_latency_ns: Option<u64>,
    /// Lifetime at the reference daily token volume
    #[serde(with = "serde_float")]
    pub lifetime_years: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<ProjectionFault>,
}

impl ReclaimThresholdResult {
    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    /// The policy fires at least once within the campaign
    pub fn fires(&self) -> bool {
        self.reclaims_per_hot_block > 0.0
    }
}

/// Lifespan of one threshold under one workload scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLifespan {
    pub threshold: u64,
    #[serde(flatten)]
    pub lifetime: Lifetime,
    /// Reclaim bytes written per day
    pub tbw_bytes_per_day: f64,
    pub severity: LifespanSeverity,
}

/// All threshold lifespans for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioProjection {
    pub scenario: WorkloadScenario,
    pub lifespans: Vec<ScenarioLifespan>,
}

fn check_threshold(threshold: u64) -> Result<()> {
    if threshold == 0 {
        return Err(Error::config("Reclaim thresholds must be > 0"));
    }
    Ok(())
}

/// Evaluates every threshold against a single immutable parameter set.
///
/// Each threshold is evaluated independently, so output order always
/// matches input order whether the sweep runs on the rayon pool or not.
#[derive(Debug)]
pub struct ThresholdSweep {
    policy: ReclaimPolicy,
    wear: WearProjection,
    distribution: ReadDistribution,
    reliability: Box<dyn ReliabilityModel>,
    decoder: EccDecoder,
    reference_tokens_per_day: u64,
    tbw_unit: ByteUnit,
    parallel: bool,
}

impl ThresholdSweep {
    /// Build the sweep from a validated configuration
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let total_reads =
            WorkloadModel::flash_reads(&config.calibration, config.campaign_tokens as f64);
        let distribution = ReadDistribution::estimate(
            total_reads,
            config.geometry.total_blocks,
            config.concentration_factor,
        )?;

        Ok(Self {
            policy: ReclaimPolicy::new(
                config.calibration.read_rate_per_token,
                config.concentration_factor,
                config.geometry.total_blocks,
            ),
            wear: WearProjection::new(
                &config.geometry,
                config.hot_block_fraction,
                config.campaign_tokens,
            )?,
            distribution,
            reliability: ReliabilityFactory::create(&config.reliability),
            decoder: EccDecoder::default(),
            reference_tokens_per_day: config.reference_tokens_per_day,
            tbw_unit: config.tbw_unit,
            parallel: config.parallel,
        })
    }

    /// Assemble a sweep from already-built components
    pub fn from_parts(
        policy: ReclaimPolicy,
        wear: WearProjection,
        distribution: ReadDistribution,
        reliability: Box<dyn ReliabilityModel>,
        reference_tokens_per_day: u64,
    ) -> Self {
        Self {
            policy,
            wear,
            distribution,
            reliability,
            decoder: EccDecoder::default(),
            reference_tokens_per_day,
            tbw_unit: ByteUnit::default(),
            parallel: false,
        }
    }

    pub fn with_decoder(mut self, decoder: EccDecoder) -> Result<Self> {
        decoder.validate()?;
        self.decoder = decoder;
        Ok(self)
    }

    pub fn with_tbw_unit(mut self, unit: ByteUnit) -> Self {
        self.tbw_unit = unit;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn distribution(&self) -> &ReadDistribution {
        &self.distribution
    }

    pub fn reliability(&self) -> &dyn ReliabilityModel {
        self.reliability.as_ref()
    }

    pub fn wear(&self) -> &WearProjection {
        &self.wear
    }

    /// Evaluate a single threshold
    pub fn evaluate(&self, threshold: u64) -> Result<ReclaimThresholdResult> {
        check_threshold(threshold)?;

        let campaign_tokens = self.wear.campaign_tokens();
        let tokens_to_trigger = self.policy.trigger_point(threshold)?;
        let reclaims_per_hot_block = self.policy.reclaim_frequency(threshold, campaign_tokens)?;

        let total_reclaims = self.wear.total_reclaims(reclaims_per_hot_block);
        let avg_pe_cycles = self.wear.avg_pe_cycles_per_block(reclaims_per_hot_block);
        let tbw_bytes = self.wear.tbw_bytes(reclaims_per_hot_block);

        // a block never holds more reads than the threshold allows
        let accumulated_reads = self.distribution.max_reads_per_block.min(threshold as f64);
        // the evaluated block is the hot one, erased once per reclaim
        let exposure = ReadExposure {
            accumulated_reads,
            pe_cycles: reclaims_per_hot_block,
            retention_hours: 0.0,
        };

        let (ecc_failure_rate, fault) = match self.reliability.failure_rate(&exposure) {
            Ok(rate) => (Some(rate), None),
            Err(e) => {
                tracing::warn!("threshold {}: {}", threshold, e);
                (None, Some(ProjectionFault::from(&e)))
            }
        };

        let decode = ecc_failure_rate
            .filter(|_| self.reliability.reports_rber())
            .map(|rber| self.decoder.decode(rber));
        let decode_latency_ns = decode.map(|outcome| self.decoder.latency_ns(outcome));

        let lifetime = self.wear.lifetime(avg_pe_cycles, self.reference_tokens_per_day);
        tracing::debug!(
            "threshold {}: trigger {:.0} tokens, {:.3} reclaims/hot block, {:.4} avg P/E",
            threshold,
            tokens_to_trigger,
            reclaims_per_hot_block,
            avg_pe_cycles
        );

        Ok(ReclaimThresholdResult {
            threshold,
            tokens_to_trigger,
            reclaims_per_hot_block,
            total_reclaims,
            avg_pe_cycles,
            tbw_bytes,
            tbw: self.tbw_unit.convert(tbw_bytes),
            tbw_unit: self.tbw_unit,
            accumulated_reads,
            ecc_failure_rate,
            decode,
            decode_latency_ns,
            lifetime_years: lifetime.years,
            fault,
        })
    }

    /// Evaluate every threshold, preserving input order.
    ///
    /// Every threshold is checked before any is evaluated.
    pub fn run(&self, thresholds: &[u64]) -> Result<Vec<ReclaimThresholdResult>> {
        thresholds.iter().try_for_each(|t| check_threshold(*t))?;

        if self.parallel {
            tracing::info!("Evaluating {} thresholds in parallel", thresholds.len());
            thresholds.par_iter().map(|t| self.evaluate(*t)).collect()
        } else {
            tracing::info!("Evaluating {} thresholds sequentially", thresholds.len());
            thresholds.iter().map(|t| self.evaluate(*t)).collect()
        }
    }

    fn lifespan(&self, result: &ReclaimThresholdResult, tokens_per_day: u64) -> ScenarioLifespan {
        let lifetime = self.wear.lifetime(result.avg_pe_cycles, tokens_per_day);
        ScenarioLifespan {
            threshold: result.threshold,
            lifetime,
            tbw_bytes_per_day: self.wear.tbw_bytes_per_day(result.tbw_bytes, tokens_per_day),
            severity: lifetime.severity(),
        }
    }

    /// Project each result onto each workload scenario
    pub fn scenario_lifespans(
        &self,
        results: &[ReclaimThresholdResult],
        scenarios: &[WorkloadScenario],
    ) -> BTreeMap<String, ScenarioProjection> {
        scenarios
            .iter()
            .map(|scenario| {
                let lifespans = results
                    .iter()
                    .map(|r| self.lifespan(r, scenario.tokens_per_day))
                    .collect();

                (
                    scenario.name.clone(),
                    ScenarioProjection {
                        scenario: scenario.clone(),
                        lifespans,
                    },
                )
            })
            .collect()
    }
}

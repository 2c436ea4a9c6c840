use reclaim_core::{Error, RberCoefficients, ReliabilityConfig, Result};
use serde::{Deserialize, Serialize};

/// Read-disturb exposure of a block at the moment it is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadExposure {
    /// Reads accumulated since the block was last programmed
    pub accumulated_reads: f64,
    /// P/E cycles the block has seen
    pub pe_cycles: f64,
    /// Hours since the block was programmed
    pub retention_hours: f64,
}

impl ReadExposure {
    pub fn reads_only(accumulated_reads: f64) -> Self {
        Self {
            accumulated_reads,
            pe_cycles: 0.0,
            retention_hours: 0.0,
        }
    }
}

/// Strategy mapping read exposure to an ECC failure rate.
///
/// Implementations must return a value in `[0, 1)`. Anything else is
/// reported as `ModelDivergence` and never clamped.
pub trait ReliabilityModel: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn failure_rate(&self, exposure: &ReadExposure) -> Result<f64>;

    /// Failure rate of a block with no exposure at all
    fn floor(&self) -> f64;

    /// Parameter set, for reports
    fn parameters(&self) -> serde_json::Value;

    /// Output is a raw bit error rate that an ECC decoder can consume
    fn reports_rber(&self) -> bool {
        false
    }
}

fn check_range(model: &str, value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::divergence(model, value))
    }
}

/// Linear placeholder relating accumulated reads to failure rate.
///
/// `rate = 0.5*c + c * reads / 1000` where `c` is the measured ECC failure
/// rate per read. Kept for illustrative trade-off analysis; the coefficients
/// are not derived from the power-law model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedReliability {
    ecc_failure_rate: f64,
}

impl SimplifiedReliability {
    pub fn new(ecc_failure_rate: f64) -> Self {
        Self { ecc_failure_rate }
    }

    pub fn base_failure_rate(&self) -> f64 {
        0.5 * self.ecc_failure_rate
    }
}

impl ReliabilityModel for SimplifiedReliability {
    fn name(&self) -> &'static str {
        "simplified"
    }

    fn failure_rate(&self, exposure: &ReadExposure) -> Result<f64> {
        let rate = self.base_failure_rate()
            + self.ecc_failure_rate * exposure.accumulated_reads / 1000.0;
        check_range(self.name(), rate)
    }

    fn floor(&self) -> f64 {
        self.base_failure_rate()
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "ecc_failure_rate": self.ecc_failure_rate,
            "base_failure_rate": self.base_failure_rate(),
            "reads_scale": 1000.0,
        })
    }
}

/// Power-law raw bit error rate model.
///
/// `rber = epsilon + alpha*c^k + beta*c^m*t^n + gamma*c^p*r^q` with `c` the
/// P/E cycles, `t` the retention time in hours and `r` the accumulated reads.
/// The evaluation adds the configured baseline wear to the exposure's cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalRber {
    coefficients: RberCoefficients,
    baseline_pe_cycles: f64,
    retention_hours: f64,
}

impl PhysicalRber {
    pub fn new(
        coefficients: RberCoefficients,
        baseline_pe_cycles: f64,
        retention_hours: f64,
    ) -> Self {
        Self {
            coefficients,
            baseline_pe_cycles,
            retention_hours,
        }
    }

    /// Raw bit error rate with every term evaluated as given
    pub fn rber(&self, cycles: f64, time: f64, reads: f64) -> f64 {
        let c = &self.coefficients;
        c.epsilon
            + c.alpha * cycles.powf(c.k)
            + c.beta * cycles.powf(c.m) * time.powf(c.n)
            + c.gamma * cycles.powf(c.p) * reads.powf(c.q)
    }

    /// Contribution of each term, in formula order
    pub fn terms(&self, cycles: f64, time: f64, reads: f64) -> [f64; 4] {
        let c = &self.coefficients;
        [
            c.epsilon,
            c.alpha * cycles.powf(c.k),
            c.beta * cycles.powf(c.m) * time.powf(c.n),
            c.gamma * cycles.powf(c.p) * reads.powf(c.q),
        ]
    }
}

impl ReliabilityModel for PhysicalRber {
    fn name(&self) -> &'static str {
        "physical"
    }

    fn failure_rate(&self, exposure: &ReadExposure) -> Result<f64> {
        let cycles = self.baseline_pe_cycles + exposure.pe_cycles;
        let time = self.retention_hours + exposure.retention_hours;
        check_range(self.name(), self.rber(cycles, time, exposure.accumulated_reads))
    }

    fn floor(&self) -> f64 {
        self.coefficients.epsilon
    }

    fn reports_rber(&self) -> bool {
        true
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "coefficients": self.coefficients,
            "baseline_pe_cycles": self.baseline_pe_cycles,
            "retention_hours": self.retention_hours,
        })
    }
}

/// Builds a reliability strategy from its configuration
pub struct ReliabilityFactory;

impl ReliabilityFactory {
    pub fn create(config: &ReliabilityConfig) -> Box<dyn ReliabilityModel> {
        match config {
            ReliabilityConfig::Simplified { ecc_failure_rate } => {
                Box::new(SimplifiedReliability::new(*ecc_failure_rate))
            }
            ReliabilityConfig::Physical {
                coefficients,
                pe_cycles,
                retention_hours,
            } => Box::new(PhysicalRber::new(
                coefficients.clone(),
                *pe_cycles,
                *retention_hours,
            )),
        }
    }
}

use reclaim_core::{Error, FlashGeometry, Result};
use serde::{Deserialize, Serialize};

use crate::serde_float;

/// Default fraction of blocks treated as hot
pub const DEFAULT_HOT_BLOCK_FRACTION: f64 = 0.1;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Converts reclaim frequency into device wear.
///
/// Each reclaim of a hot block is one erase plus reprogram, i.e. one P/E
/// cycle. Wear is averaged over the whole block population, hot and cold.
#[derive(Debug, Clone, PartialEq)]
pub struct WearProjection {
    geometry: FlashGeometry,
    hot_block_fraction: f64,
    campaign_tokens: u64,
}

impl WearProjection {
    pub fn new(
        geometry: &FlashGeometry,
        hot_block_fraction: f64,
        campaign_tokens: u64,
    ) -> Result<Self> {
        geometry.validate()?;
        if !hot_block_fraction.is_finite() || hot_block_fraction <= 0.0 || hot_block_fraction > 1.0
        {
            return Err(Error::config(format!(
                "hot_block_fraction must be in (0, 1], got {}",
                hot_block_fraction
            )));
        }
        if campaign_tokens == 0 {
            return Err(Error::config("campaign_tokens must be > 0"));
        }

        Ok(Self {
            geometry: geometry.clone(),
            hot_block_fraction,
            campaign_tokens,
        })
    }

    pub fn campaign_tokens(&self) -> u64 {
        self.campaign_tokens
    }

    /// Number of hot blocks (may be fractional)
    pub fn hot_blocks(&self) -> f64 {
        self.geometry.total_blocks as f64 * self.hot_block_fraction
    }

    /// Block migrations over the campaign
    pub fn total_reclaims(&self, reclaims_per_hot_block: f64) -> f64 {
        self.hot_blocks() * reclaims_per_hot_block
    }

    /// Campaign P/E cycles averaged over every block on the device
    pub fn avg_pe_cycles_per_block(&self, reclaims_per_hot_block: f64) -> f64 {
        self.total_reclaims(reclaims_per_hot_block) / self.geometry.total_blocks as f64
    }

    /// Bytes written by reclaim migrations over the campaign
    pub fn tbw_bytes(&self, reclaims_per_hot_block: f64) -> f64 {
        self.total_reclaims(reclaims_per_hot_block) * self.geometry.block_size_bytes as f64
    }

    /// Project calendar lifetime at `tokens_per_day`.
    ///
    /// A policy that never fires consumes no P/E cycles and the lifetime is
    /// unbounded.
    pub fn lifetime(&self, avg_pe_per_block: f64, tokens_per_day: u64) -> Lifetime {
        if avg_pe_per_block == 0.0 || tokens_per_day == 0 {
            return Lifetime::unbounded();
        }

        let pe_per_day = avg_pe_per_block * tokens_per_day as f64 / self.campaign_tokens as f64;
        let days = self.geometry.pe_cycle_limit as f64 / pe_per_day;

        Lifetime {
            pe_per_day,
            days,
            years: days / DAYS_PER_YEAR,
        }
    }

    /// Reclaim bytes written per day at `tokens_per_day`
    pub fn tbw_bytes_per_day(&self, tbw_bytes: f64, tokens_per_day: u64) -> f64 {
        tbw_bytes * tokens_per_day as f64 / self.campaign_tokens as f64
    }
}

/// Calendar lifetime against the endurance limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    /// P/E cycles consumed per day, averaged over all blocks
    pub pe_per_day: f64,
    #[serde(rename = "lifespan_days", with = "serde_float")]
    pub days: f64,
    #[serde(rename = "lifespan_years", with = "serde_float")]
    pub years: f64,
}

impl Lifetime {
    pub fn unbounded() -> Self {
        Self {
            pe_per_day: 0.0,
            days: f64::INFINITY,
            years: f64::INFINITY,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.days.is_infinite()
    }

    pub fn severity(&self) -> LifespanSeverity {
        LifespanSeverity::classify(self.days)
    }
}

/// How a projected lifespan compares with a normal 5-10 year SSD life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifespanSeverity {
    /// Under a month
    Critical,
    /// Under a year
    Severe,
    /// Under five years
    Moderate,
    Acceptable,
    /// The policy never fires
    Unbounded,
}

impl LifespanSeverity {
    pub fn classify(days: f64) -> Self {
        if days.is_infinite() {
            LifespanSeverity::Unbounded
        } else if days < 30.0 {
            LifespanSeverity::Critical
        } else if days < 365.0 {
            LifespanSeverity::Severe
        } else if days < 1825.0 {
            LifespanSeverity::Moderate
        } else {
            LifespanSeverity::Acceptable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LifespanSeverity::Critical => "CRITICAL",
            LifespanSeverity::Severe => "SEVERE",
            LifespanSeverity::Moderate => "MODERATE",
            LifespanSeverity::Acceptable => "ACCEPTABLE",
            LifespanSeverity::Unbounded => "UNBOUNDED",
        }
    }
}

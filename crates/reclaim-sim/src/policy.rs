use reclaim_core::{Error, Result};

/// Read-reclaim trigger model for the hottest block.
///
/// The hottest block accumulates `read_rate * tokens / blocks * concentration`
/// reads. Once it reaches the threshold it is migrated, its counter resets and
/// it starts accumulating again at the same rate, so reclaims repeat
/// periodically over the campaign.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReclaimPolicy {
    pub read_rate_per_token: f64,
    pub concentration_factor: f64,
    pub total_blocks: u64,
}

impl ReclaimPolicy {
    pub fn new(read_rate_per_token: f64, concentration_factor: f64, total_blocks: u64) -> Self {
        Self {
            read_rate_per_token,
            concentration_factor,
            total_blocks,
        }
    }

    /// Tokens until the hottest block first reaches `threshold` reads.
    ///
    /// Fails with `UndefinedProjection` when the read rate or concentration
    /// is exactly zero, and with `InvalidConfiguration` when either is
    /// negative or not finite.
    pub fn tokens_to_trigger(&self, threshold: u64) -> Result<f64> {
        for (name, value) in [
            ("read_rate_per_token", self.read_rate_per_token),
            ("concentration_factor", self.concentration_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        let hot_reads_per_token = self.read_rate_per_token * self.concentration_factor;
        if hot_reads_per_token == 0.0 {
            return Err(Error::undefined_projection(format!(
                "hot-block read rate is {} (read_rate={}, concentration={})",
                hot_reads_per_token, self.read_rate_per_token, self.concentration_factor
            )));
        }

        Ok(threshold as f64 * self.total_blocks as f64 / hot_reads_per_token)
    }

    /// Trigger point with an undefined projection read as "never triggers".
    ///
    /// Configuration errors are still returned.
    pub fn trigger_point(&self, threshold: u64) -> Result<f64> {
        match self.tokens_to_trigger(threshold) {
            Err(e @ Error::UndefinedProjection(_)) => {
                tracing::debug!("threshold {}: {}; policy never fires", threshold, e);
                Ok(f64::INFINITY)
            }
            other => other,
        }
    }

    /// Reclaims of one hot block over a campaign of `campaign_tokens`.
    ///
    /// Zero when the first trigger lies beyond the campaign.
    pub fn reclaim_frequency(&self, threshold: u64, campaign_tokens: u64) -> Result<f64> {
        let tokens_per_trigger = self.trigger_point(threshold)?;
        let campaign = campaign_tokens as f64;

        if tokens_per_trigger > campaign {
            return Ok(0.0);
        }
        Ok(campaign / tokens_per_trigger)
    }
}

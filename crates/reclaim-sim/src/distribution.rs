use reclaim_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default ratio of hottest-block reads to the population average.
///
/// Attention weights are read disproportionately often, so the hottest
/// block is assumed to see ten times the average.
pub const DEFAULT_CONCENTRATION_FACTOR: f64 = 10.0;

/// Average and worst-case per-block read counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadDistribution {
    pub avg_reads_per_block: f64,
    pub max_reads_per_block: f64,
}

impl ReadDistribution {
    /// Spread `total_reads` over `total_blocks` with a hot-block concentration
    pub fn estimate(
        total_reads: f64,
        total_blocks: u64,
        concentration_factor: f64,
    ) -> Result<Self> {
        if total_blocks == 0 {
            return Err(Error::config("total_blocks must be > 0"));
        }

        let avg_reads_per_block = total_reads / total_blocks as f64;
        Ok(Self {
            avg_reads_per_block,
            max_reads_per_block: avg_reads_per_block * concentration_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_distribution() {
        let dist = ReadDistribution::estimate(1000.0, 10, 1.0).unwrap();
        assert_eq!(dist.avg_reads_per_block, 100.0);
        assert_eq!(dist.max_reads_per_block, 100.0);
    }

    #[test]
    fn test_concentrated_distribution() {
        // 10M token campaign at 0.636 reads/token over 17920 blocks
        let dist = ReadDistribution::estimate(6_360_000.0, 17_920, DEFAULT_CONCENTRATION_FACTOR)
            .unwrap();
        assert!((dist.avg_reads_per_block - 354.910_714).abs() < 1e-3);
        assert!((dist.max_reads_per_block - 3549.107_14).abs() < 1e-2);
    }

    #[test]
    fn test_zero_blocks_rejected() {
        assert!(matches!(
            ReadDistribution::estimate(100.0, 0, 10.0),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

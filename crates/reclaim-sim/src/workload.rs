use reclaim_core::{Error, FlashGeometry, ModelProfile, ReadRateCalibration, Result};
use serde::{Deserialize, Serialize};

/// Logical sector size used by the trace-driven simulator
pub const SECTOR_SIZE_BYTES: u64 = 512;

/// Per-token storage footprint of a transformer model
#[derive(Debug, Clone)]
pub struct WorkloadModel {
    profile: ModelProfile,
    params_per_layer: u64,
    bytes_per_layer: u64,
    bytes_per_token: u64,
}

impl WorkloadModel {
    /// Create a workload model, rejecting non-positive dimensions and
    /// footprints that overflow 64 bits
    pub fn new(profile: &ModelProfile) -> Result<Self> {
        profile.validate()?;

        let hidden = profile.hidden_size;
        let intermediate = profile.intermediate_size;
        let overflow = || {
            Error::config(format!(
                "model '{}' footprint overflows 64 bits (hidden={}, intermediate={}, layers={})",
                profile.name, hidden, intermediate, profile.num_layers
            ))
        };

        // attention 4h^2 plus feed-forward 3hi
        let attention = hidden.checked_mul(hidden).and_then(|v| v.checked_mul(4));
        let feed_forward = hidden.checked_mul(intermediate).and_then(|v| v.checked_mul(3));
        let params_per_layer = attention
            .zip(feed_forward)
            .and_then(|(a, f)| a.checked_add(f))
            .ok_or_else(overflow)?;
        let bytes_per_layer = params_per_layer
            .checked_mul(profile.bytes_per_param)
            .ok_or_else(overflow)?;
        let bytes_per_token = bytes_per_layer
            .checked_mul(profile.num_layers)
            .ok_or_else(overflow)?;

        Ok(Self {
            profile: profile.clone(),
            params_per_layer,
            bytes_per_layer,
            bytes_per_token,
        })
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Parameters per transformer layer: attention `4h^2` plus feed-forward `3hi`
    pub fn params_per_layer(&self) -> u64 {
        self.params_per_layer
    }

    pub fn bytes_per_layer(&self) -> u64 {
        self.bytes_per_layer
    }

    /// Sectors needed to hold one layer, rounding the last partial sector up
    pub fn sectors_per_layer(&self, sector_size: u64) -> u64 {
        self.bytes_per_layer().div_ceil(sector_size.max(1))
    }

    /// Bytes streamed from storage for one generated token (the whole model)
    pub fn bytes_per_token(&self) -> u64 {
        self.bytes_per_token
    }

    /// Flash blocks needed to store the model's weights
    pub fn blocks_occupied(&self, geometry: &FlashGeometry) -> u64 {
        self.bytes_per_token().div_ceil(geometry.block_size_bytes.max(1))
    }

    pub fn footprint(&self, geometry: &FlashGeometry) -> ModelFootprint {
        ModelFootprint {
            params_per_layer: self.params_per_layer(),
            bytes_per_layer: self.bytes_per_layer(),
            sectors_per_layer: self.sectors_per_layer(SECTOR_SIZE_BYTES),
            bytes_per_token: self.bytes_per_token(),
            blocks_occupied: self.blocks_occupied(geometry),
        }
    }

    /// Aggregate flash reads over a campaign of `tokens` generated tokens
    pub fn flash_reads(calibration: &ReadRateCalibration, tokens: f64) -> f64 {
        calibration.read_rate_per_token * tokens
    }
}

/// Storage footprint summary for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFootprint {
    pub params_per_layer: u64,
    pub bytes_per_layer: u64,
    pub sectors_per_layer: u64,
    pub bytes_per_token: u64,
    pub blocks_occupied: u64,
}

/// One measured (tokens, flash reads) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadSample {
    pub tokens: f64,
    pub flash_reads: f64,
}

/// Least-squares fit of flash reads against generated tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRateFit {
    pub samples: usize,
    pub calibration: ReadRateCalibration,
}

impl ReadRateFit {
    /// Fit `reads = rate * tokens` through the origin.
    ///
    /// `fit_quality` is the coefficient of determination of the fitted line.
    pub fn fit(samples: &[ReadSample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::data("cannot fit a read rate without samples"));
        }
        for (i, sample) in samples.iter().enumerate() {
            if !sample.tokens.is_finite() || sample.tokens <= 0.0 {
                return Err(Error::data(format!(
                    "sample {}: token count must be positive, got {}",
                    i, sample.tokens
                )));
            }
            if !sample.flash_reads.is_finite() || sample.flash_reads < 0.0 {
                return Err(Error::data(format!(
                    "sample {}: flash read count must be >= 0, got {}",
                    i, sample.flash_reads
                )));
            }
        }

        let sum_tr: f64 = samples.iter().map(|s| s.tokens * s.flash_reads).sum();
        let sum_tt: f64 = samples.iter().map(|s| s.tokens * s.tokens).sum();
        let rate = sum_tr / sum_tt;

        if rate <= 0.0 {
            return Err(Error::data("fitted read rate is not positive; all samples read nothing"));
        }

        let mean = samples.iter().map(|s| s.flash_reads).sum::<f64>() / samples.len() as f64;
        let ss_res: f64 = samples
            .iter()
            .map(|s| (s.flash_reads - rate * s.tokens).powi(2))
            .sum();
        let ss_tot: f64 = samples.iter().map(|s| (s.flash_reads - mean).powi(2)).sum();

        let fit_quality = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        tracing::debug!(
            "Fitted read rate {:.6} reads/token over {} samples (R^2 = {:.4})",
            rate,
            samples.len(),
            fit_quality
        );

        Ok(Self {
            samples: samples.len(),
            calibration: ReadRateCalibration {
                read_rate_per_token: rate,
                fit_quality,
            },
        })
    }

    /// Parse `tokens,flash_reads` rows; a non-numeric first line is treated as a header
    pub fn parse_csv(content: &str) -> Result<Vec<ReadSample>> {
        let mut samples = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((tokens, reads)) = line.split_once(',') else {
                return Err(Error::data(format!(
                    "line {}: expected 'tokens,flash_reads'",
                    line_no + 1
                )));
            };
            let parsed = (tokens.trim().parse::<f64>(), reads.trim().parse::<f64>());
            match parsed {
                (Ok(tokens), Ok(flash_reads)) => samples.push(ReadSample {
                    tokens,
                    flash_reads,
                }),
                _ if samples.is_empty() && line_no == 0 => continue,
                _ => {
                    return Err(Error::data(format!(
                        "line {}: could not parse '{}'",
                        line_no + 1,
                        line
                    )))
                }
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llama_7b_footprint() {
        let model = WorkloadModel::new(&ModelProfile::llama_7b()).unwrap();
        // 4 * 4096^2 + 3 * 4096 * 11008
        assert_eq!(model.params_per_layer(), 67_108_864 + 135_266_304);
        assert_eq!(model.bytes_per_layer(), 2 * 202_375_168);
        assert_eq!(model.sectors_per_layer(SECTOR_SIZE_BYTES), 790_528);
        assert_eq!(model.bytes_per_token(), 32 * 404_750_336);
    }

    #[test]
    fn test_sectors_round_up() {
        let profile = ModelProfile {
            name: "tiny".to_string(),
            hidden_size: 3,
            intermediate_size: 5,
            num_layers: 1,
            bytes_per_param: 1,
            layer_compute_time_ns: None,
        };
        let model = WorkloadModel::new(&profile).unwrap();
        // 36 + 45 = 81 bytes -> one partial sector
        assert_eq!(model.bytes_per_layer(), 81);
        assert_eq!(model.sectors_per_layer(SECTOR_SIZE_BYTES), 1);
        assert_eq!(model.sectors_per_layer(40), 3);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut profile = ModelProfile::llama_7b();
        profile.num_layers = 0;
        assert!(matches!(
            WorkloadModel::new(&profile),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_overflowing_footprint_rejected() {
        let mut profile = ModelProfile::llama_7b();
        profile.hidden_size = u64::MAX / 2;
        let err = WorkloadModel::new(&profile).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));

        // each layer fits, the whole model does not
        let mut profile = ModelProfile::llama_7b();
        profile.num_layers = u64::MAX / 1000;
        assert!(matches!(
            WorkloadModel::new(&profile),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_blocks_occupied() {
        let model = WorkloadModel::new(&ModelProfile::llama2_70b()).unwrap();
        let geometry = FlashGeometry::default();
        let blocks = model.blocks_occupied(&geometry);
        let expected = (model.bytes_per_token() as f64 / geometry.block_size_bytes as f64).ceil();
        assert_eq!(blocks as f64, expected);
    }

    #[test]
    fn test_flash_reads_scale_with_tokens() {
        let calibration = ReadRateCalibration::default();
        let reads = WorkloadModel::flash_reads(&calibration, 10_000_000.0);
        assert!((reads - 6_360_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_exact_line() {
        let samples = vec![
            ReadSample { tokens: 10_000.0, flash_reads: 6_360.0 },
            ReadSample { tokens: 50_000.0, flash_reads: 31_800.0 },
            ReadSample { tokens: 100_000.0, flash_reads: 63_600.0 },
        ];
        let fit = ReadRateFit::fit(&samples).unwrap();
        assert_eq!(fit.samples, 3);
        assert!((fit.calibration.read_rate_per_token - 0.636).abs() < 1e-12);
        assert!((fit.calibration.fit_quality - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_noisy_line_has_lower_quality() {
        let samples = vec![
            ReadSample { tokens: 10_000.0, flash_reads: 7_000.0 },
            ReadSample { tokens: 50_000.0, flash_reads: 30_000.0 },
            ReadSample { tokens: 100_000.0, flash_reads: 65_000.0 },
        ];
        let fit = ReadRateFit::fit(&samples).unwrap();
        assert!(fit.calibration.fit_quality < 1.0);
        assert!(fit.calibration.fit_quality > 0.9);
    }

    #[test]
    fn test_fit_rejects_bad_samples() {
        assert!(matches!(ReadRateFit::fit(&[]), Err(Error::Data(_))));

        let zero_tokens = [ReadSample { tokens: 0.0, flash_reads: 10.0 }];
        assert!(matches!(ReadRateFit::fit(&zero_tokens), Err(Error::Data(_))));

        let negative_reads = [ReadSample { tokens: 10.0, flash_reads: -1.0 }];
        assert!(matches!(ReadRateFit::fit(&negative_reads), Err(Error::Data(_))));

        let no_reads = [ReadSample { tokens: 10.0, flash_reads: 0.0 }];
        assert!(matches!(ReadRateFit::fit(&no_reads), Err(Error::Data(_))));
    }

    #[test]
    fn test_parse_csv_with_header() {
        let csv = "tokens,flash_reads\n10000,6360\n# comment\n\n50000, 31800\n";
        let samples = ReadRateFit::parse_csv(csv).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].tokens, 50_000.0);
        assert_eq!(samples[1].flash_reads, 31_800.0);
    }

    #[test]
    fn test_parse_csv_rejects_garbage_rows() {
        assert!(ReadRateFit::parse_csv("10000,6360\nabc,def\n").is_err());
        assert!(ReadRateFit::parse_csv("10000 6360\n").is_err());
    }
}

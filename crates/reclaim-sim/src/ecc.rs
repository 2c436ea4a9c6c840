use reclaim_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Outcome of decoding one codeword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecodeOutcome {
    /// Corrected after `retries` soft-decode retries (0 = hard decode)
    Corrected { retries: u32 },
    Uncorrectable,
}

/// LDPC-style decoder with soft-decision retries.
///
/// Each soft retry raises the effective correction capability by half of
/// the hard-decode capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EccDecoder {
    /// Codeword size in bytes
    pub codeword_bytes: u64,
    /// Correctable bit errors per codeword on the first pass
    pub correction_capability: u32,
    pub max_retries: u32,
    /// Latency of one decode attempt
    pub decode_latency_ns: u64,
}

impl Default for EccDecoder {
    fn default() -> Self {
        Self {
            codeword_bytes: 1024,
            correction_capability: 40,
            max_retries: 3,
            decode_latency_ns: 10_000,
        }
    }
}

impl EccDecoder {
    pub fn validate(&self) -> Result<()> {
        if self.codeword_bytes == 0 {
            return Err(Error::config("codeword_bytes must be > 0"));
        }
        if self.correction_capability == 0 {
            return Err(Error::config("correction_capability must be > 0"));
        }
        Ok(())
    }

    pub fn codeword_bits(&self) -> f64 {
        (self.codeword_bytes * 8) as f64
    }

    /// Expected raw bit errors in one codeword at `rber`
    pub fn expected_errors(&self, rber: f64) -> f64 {
        rber * self.codeword_bits()
    }

    pub fn decode(&self, rber: f64) -> DecodeOutcome {
        let expected = self.expected_errors(rber);
        let base = self.correction_capability as f64;

        if expected <= base {
            return DecodeOutcome::Corrected { retries: 0 };
        }

        (1..=self.max_retries)
            .find(|retry| expected <= base * (1.0 + 0.5 * *retry as f64))
            .map(|retries| DecodeOutcome::Corrected { retries })
            .unwrap_or(DecodeOutcome::Uncorrectable)
    }

    /// Total decode latency; an uncorrectable codeword pays every retry
    pub fn latency_ns(&self, outcome: DecodeOutcome) -> u64 {
        match outcome {
            DecodeOutcome::Corrected { retries } => self.decode_latency_ns * (1 + retries as u64),
            DecodeOutcome::Uncorrectable => self.decode_latency_ns * (1 + self.max_retries as u64),
        }
    }

    /// Largest RBER the decoder can still correct
    pub fn max_correctable_rber(&self) -> f64 {
        let capability = self.correction_capability as f64 * (1.0 + 0.5 * self.max_retries as f64);
        capability / self.codeword_bits()
    }
}

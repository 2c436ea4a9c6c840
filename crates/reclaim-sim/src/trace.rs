//! Block-level replay traces for an external SSD simulator.
//!
//! A trace optionally starts with a prefill phase that writes every layer's
//! weights once, then reads the full model back for each generated token.
//! Records are produced lazily so long traces never sit in memory.

use reclaim_core::{Error, ModelProfile, OperationKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::workload::{WorkloadModel, SECTOR_SIZE_BYTES};

/// Default per-layer compute delay when the profile gives none
pub const DEFAULT_LAYER_COMPUTE_NS: u64 = 10_000_000;

/// Request pacing and sizing for generated traces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub sector_size_bytes: u64,
    /// Largest single request
    pub max_request_bytes: u64,
    pub write_interval_ns: u64,
    pub read_interval_ns: u64,
    /// Idle gap between prefill and the first token
    pub prefill_gap_ns: u64,
    pub device_id: u32,
    /// Emit the model write phase before inference
    pub prefill: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            sector_size_bytes: SECTOR_SIZE_BYTES,
            max_request_bytes: 256 * 1024,
            write_interval_ns: 150,
            read_interval_ns: 100,
            prefill_gap_ns: 10_000_000_000,
            device_id: 0,
            prefill: true,
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sector_size_bytes == 0 {
            return Err(Error::config("sector_size_bytes must be > 0"));
        }
        if self.max_request_bytes < self.sector_size_bytes {
            return Err(Error::config(format!(
                "max_request_bytes ({}) is smaller than one sector ({})",
                self.max_request_bytes, self.sector_size_bytes
            )));
        }
        Ok(())
    }

    pub fn max_request_sectors(&self) -> u64 {
        self.max_request_bytes / self.sector_size_bytes
    }
}

/// One line of a replay trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub timestamp_ns: u64,
    pub device_id: u32,
    /// Start sector
    pub lba: u64,
    pub sector_count: u64,
    pub op: OperationKind,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.timestamp_ns,
            self.device_id,
            self.lba,
            self.sector_count,
            self.op.code()
        )
    }
}

impl FromStr for TraceRecord {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::data(format!(
                "expected 5 trace fields, got {}: '{}'",
                fields.len(),
                line
            )));
        }

        let number = |idx: usize| -> Result<u64> {
            fields[idx]
                .parse::<u64>()
                .map_err(|e| Error::data(format!("bad trace field '{}': {}", fields[idx], e)))
        };

        let code = number(4)?;
        let op = u8::try_from(code)
            .ok()
            .and_then(OperationKind::from_code)
            .ok_or_else(|| Error::data(format!("unknown operation code {}", code)))?;
        let device_id = u32::try_from(number(1)?)
            .map_err(|_| Error::data(format!("device id out of range: '{}'", fields[1])))?;

        Ok(Self {
            timestamp_ns: number(0)?,
            device_id,
            lba: number(2)?,
            sector_count: number(3)?,
            op,
        })
    }
}

/// Totals for a generated trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub requests: u64,
    pub write_requests: u64,
    pub read_requests: u64,
    pub sectors_written: u64,
    pub sectors_read: u64,
    /// LBA following the last request
    pub final_lba: u64,
    pub duration_ns: u64,
}

impl TraceSummary {
    fn record(&mut self, record: &TraceRecord) {
        self.requests += 1;
        match record.op {
            OperationKind::Write => {
                self.write_requests += 1;
                self.sectors_written += record.sector_count;
            }
            OperationKind::Read => {
                self.read_requests += 1;
                self.sectors_read += record.sector_count;
            }
        }
        self.final_lba = record.lba + record.sector_count;
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ns as f64 / 1e9
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prefill,
    Inference { token: u64 },
    Done,
}

/// Lazy iterator over the records of one trace
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    config: TraceConfig,
    sectors_per_layer: u64,
    max_request_sectors: u64,
    num_layers: u64,
    tokens: u64,
    layer_compute_ns: u64,

    phase: Phase,
    layer: u64,
    lba: u64,
    remaining: u64,
    now_ns: u64,
}

impl TraceGenerator {
    pub fn new(profile: &ModelProfile, tokens: u64, config: TraceConfig) -> Result<Self> {
        config.validate()?;
        let workload = WorkloadModel::new(profile)?;
        let sectors_per_layer = workload.sectors_per_layer(config.sector_size_bytes);

        let phase = if config.prefill {
            Phase::Prefill
        } else if tokens > 0 {
            Phase::Inference { token: 0 }
        } else {
            Phase::Done
        };

        tracing::debug!(
            "trace for {}: {} sectors/layer, {} layers, {} tokens",
            profile.name,
            sectors_per_layer,
            profile.num_layers,
            tokens
        );

        Ok(Self {
            max_request_sectors: config.max_request_sectors(),
            layer_compute_ns: profile.layer_compute_time_ns.unwrap_or(DEFAULT_LAYER_COMPUTE_NS),
            config,
            sectors_per_layer,
            num_layers: profile.num_layers,
            tokens,
            phase,
            layer: 0,
            lba: 0,
            remaining: sectors_per_layer,
            now_ns: 0,
        })
    }

    /// Simulated time reached so far
    pub fn elapsed_ns(&self) -> u64 {
        self.now_ns
    }

    /// Stream every record to `writer`, one per line
    pub fn write_to<W: Write>(mut self, mut writer: W) -> Result<TraceSummary> {
        let mut summary = TraceSummary::default();

        for record in self.by_ref() {
            writeln!(writer, "{}", record)?;
            summary.record(&record);
        }
        writer.flush()?;

        summary.duration_ns = self.elapsed_ns();
        Ok(summary)
    }

    /// Consume the trace without writing it
    pub fn summarize(self) -> TraceSummary {
        self.write_to(std::io::sink()).unwrap_or_default()
    }

    fn start_token(&mut self, token: u64) {
        self.phase = if token < self.tokens {
            Phase::Inference { token }
        } else {
            Phase::Done
        };
        // every token reads the model from the first sector
        self.layer = 0;
        self.lba = 0;
        self.remaining = self.sectors_per_layer;
    }

    /// Advance past a finished layer; returns false when the trace is over
    fn finish_layer(&mut self) -> bool {
        if let Phase::Inference { .. } = self.phase {
            self.now_ns += self.layer_compute_ns;
        }

        self.layer += 1;
        if self.layer < self.num_layers {
            self.remaining = self.sectors_per_layer;
            return true;
        }

        match self.phase {
            Phase::Prefill => {
                tracing::debug!("prefill complete, end LBA {}", self.lba);
                self.now_ns += self.config.prefill_gap_ns;
                self.start_token(0);
            }
            Phase::Inference { token } => self.start_token(token + 1),
            Phase::Done => {}
        }
        self.phase != Phase::Done
    }
}

impl Iterator for TraceGenerator {
    type Item = TraceRecord;

    fn next(&mut self) -> Option<TraceRecord> {
        loop {
            let (op, interval) = match self.phase {
                Phase::Done => return None,
                Phase::Prefill => (OperationKind::Write, self.config.write_interval_ns),
                Phase::Inference { .. } => (OperationKind::Read, self.config.read_interval_ns),
            };

            if self.remaining == 0 {
                if !self.finish_layer() {
                    return None;
                }
                continue;
            }

            let sector_count = self.remaining.min(self.max_request_sectors);
            let record = TraceRecord {
                timestamp_ns: self.now_ns,
                device_id: self.config.device_id,
                lba: self.lba,
                sector_count,
                op,
            };

            self.lba += sector_count;
            self.remaining -= sector_count;
            self.now_ns += interval;
            return Some(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2560 params per layer -> 5120 bytes -> 10 sectors
    fn tiny_profile() -> ModelProfile {
        ModelProfile {
            name: "tiny".to_string(),
            hidden_size: 16,
            intermediate_size: 32,
            num_layers: 2,
            bytes_per_param: 2,
            layer_compute_time_ns: Some(1000),
        }
    }

    fn tiny_config() -> TraceConfig {
        TraceConfig {
            max_request_bytes: 2048,
            ..TraceConfig::default()
        }
    }

    #[test]
    fn test_prefill_then_one_token() {
        let records: Vec<TraceRecord> = TraceGenerator::new(&tiny_profile(), 1, tiny_config())
            .unwrap()
            .collect();
        assert_eq!(records.len(), 12);

        let lines: Vec<String> = records.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            &lines[..6],
            &[
                "0 0 0 4 0",
                "150 0 4 4 0",
                "300 0 8 2 0",
                "450 0 10 4 0",
                "600 0 14 4 0",
                "750 0 18 2 0",
            ]
        );
        assert_eq!(
            &lines[6..],
            &[
                "10000000900 0 0 4 1",
                "10000001000 0 4 4 1",
                "10000001100 0 8 2 1",
                "10000002200 0 10 4 1",
                "10000002300 0 14 4 1",
                "10000002400 0 18 2 1",
            ]
        );
    }

    #[test]
    fn test_write_to_and_summary() {
        let generator = TraceGenerator::new(&tiny_profile(), 1, tiny_config()).unwrap();
        let mut out = Vec::new();
        let summary = generator.write_to(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("0 0 0 4 0\n150 0 4 4 0\n"));
        assert!(text.ends_with("10000002400 0 18 2 1\n"));

        assert_eq!(summary.requests, 12);
        assert_eq!(summary.write_requests, 6);
        assert_eq!(summary.read_requests, 6);
        assert_eq!(summary.sectors_written, 20);
        assert_eq!(summary.sectors_read, 20);
        assert_eq!(summary.final_lba, 20);
        assert_eq!(summary.duration_ns, 10_000_003_500);
    }

    #[test]
    fn test_tokens_restart_at_lba_zero() {
        let config = TraceConfig {
            prefill: false,
            ..tiny_config()
        };
        let records: Vec<TraceRecord> = TraceGenerator::new(&tiny_profile(), 3, config)
            .unwrap()
            .collect();

        assert_eq!(records.len(), 18);
        assert!(records.iter().all(|r| r.op == OperationKind::Read));
        let starts: Vec<u64> = records
            .iter()
            .filter(|r| r.lba == 0)
            .map(|r| r.timestamp_ns)
            .collect();
        // 600 ns of requests + 2 x 1000 ns compute per token
        assert_eq!(starts, vec![0, 2600, 5200]);
        assert!(records.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
    }

    #[test]
    fn test_llama_7b_request_count() {
        let summary = TraceGenerator::new(&ModelProfile::llama_7b(), 1, TraceConfig::default())
            .unwrap()
            .summarize();
        // 790528 sectors/layer in 512-sector requests, 32 layers
        assert_eq!(summary.write_requests, 1544 * 32);
        assert_eq!(summary.read_requests, 1544 * 32);
        assert_eq!(summary.final_lba, 790_528 * 32);
    }

    #[test]
    fn test_default_compute_delay() {
        let mut profile = tiny_profile();
        profile.layer_compute_time_ns = None;
        let config = TraceConfig {
            prefill: false,
            ..tiny_config()
        };
        let summary = TraceGenerator::new(&profile, 1, config).unwrap().summarize();
        assert_eq!(summary.duration_ns, 600 + 2 * DEFAULT_LAYER_COMPUTE_NS);
    }

    #[test]
    fn test_empty_trace() {
        let config = TraceConfig {
            prefill: false,
            ..tiny_config()
        };
        assert_eq!(TraceGenerator::new(&tiny_profile(), 0, config).unwrap().count(), 0);
    }

    #[test]
    fn test_request_smaller_than_sector_rejected() {
        let config = TraceConfig {
            max_request_bytes: 256,
            ..TraceConfig::default()
        };
        let err = TraceGenerator::new(&tiny_profile(), 1, config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_record_parses_back() {
        let record: TraceRecord = "10000000900 0 0 4 1".parse().unwrap();
        assert_eq!(record.timestamp_ns, 10_000_000_900);
        assert_eq!(record.op, OperationKind::Read);
        assert!("1 0 0 4 7".parse::<TraceRecord>().is_err());
        assert!("1 0 0".parse::<TraceRecord>().is_err());
    }
}

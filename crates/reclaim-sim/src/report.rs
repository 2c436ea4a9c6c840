//! Result export: JSON, CSV and a fixed-width terminal table

use reclaim_core::{AnalysisConfig, ByteUnit, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::distribution::ReadDistribution;
use crate::serde_float;
use crate::sweep::{ReclaimThresholdResult, ScenarioProjection, ThresholdSweep};
use crate::workload::ModelFootprint;

/// Trigger points above this are shown as ">1B tok"
const TRIGGER_DISPLAY_CAP: f64 = 1e9;
/// Lifetimes above this are shown as ">100 yr"
const LIFETIME_DISPLAY_CAP_YEARS: f64 = 100.0;

/// Inputs echoed into every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInputs {
    pub model_name: String,
    pub campaign_tokens: u64,
    pub reference_tokens_per_day: u64,
    pub read_rate_per_token: f64,
    pub fit_quality: f64,
    pub concentration_factor: f64,
    pub hot_block_fraction: f64,
    pub total_blocks: u64,
    pub block_size_bytes: u64,
    pub pe_cycle_limit: u64,
    pub reliability_model: String,
    pub reliability_parameters: serde_json::Value,
    pub tbw_unit: ByteUnit,
}

impl ReportInputs {
    pub fn new(config: &AnalysisConfig, sweep: &ThresholdSweep) -> Self {
        Self {
            model_name: config.model.name.clone(),
            campaign_tokens: config.campaign_tokens,
            reference_tokens_per_day: config.reference_tokens_per_day,
            read_rate_per_token: config.calibration.read_rate_per_token,
            fit_quality: config.calibration.fit_quality,
            concentration_factor: config.concentration_factor,
            hot_block_fraction: config.hot_block_fraction,
            total_blocks: config.geometry.total_blocks,
            block_size_bytes: config.geometry.block_size_bytes,
            pe_cycle_limit: config.geometry.pe_cycle_limit,
            reliability_model: sweep.reliability().name().to_string(),
            reliability_parameters: sweep.reliability().parameters(),
            tbw_unit: config.tbw_unit,
        }
    }
}

/// Lowest versus highest threshold.
///
/// Ratios are oriented so a value above 1 means the lowest threshold pays
/// more (TBW) or gains more (reliability) than the highest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffSummary {
    pub lowest_threshold: u64,
    pub highest_threshold: u64,
    /// ECC failure rate at the highest threshold over the lowest
    #[serde(with = "serde_float::option", default)]
    pub failure_rate_ratio: Option<f64>,
    /// TBW at the lowest threshold over the highest
    #[serde(with = "serde_float")]
    pub tbw_ratio: f64,
    /// Lifetime at the highest threshold over the lowest
    #[serde(with = "serde_float")]
    pub lifetime_ratio: f64,
}

impl TradeoffSummary {
    /// `None` when there are no results
    pub fn compare(results: &[ReclaimThresholdResult]) -> Option<Self> {
        let lowest = results.iter().min_by_key(|r| r.threshold)?;
        let highest = results.iter().max_by_key(|r| r.threshold)?;

        let failure_rate_ratio = match (highest.ecc_failure_rate, lowest.ecc_failure_rate) {
            (Some(high), Some(low)) => Some(ratio(high, low)),
            _ => None,
        };

        Some(Self {
            lowest_threshold: lowest.threshold,
            highest_threshold: highest.threshold,
            failure_rate_ratio,
            tbw_ratio: ratio(lowest.tbw_bytes, highest.tbw_bytes),
            lifetime_ratio: ratio(highest.lifetime_years, lowest.lifetime_years),
        })
    }
}

/// Quotient where equal values (including two zeros or two infinities) give 1
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if numerator == denominator {
        1.0
    } else if denominator == 0.0 {
        f64::INFINITY
    } else {
        numerator / denominator
    }
}

/// Complete output of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub inputs: ReportInputs,
    pub footprint: ModelFootprint,
    pub distribution: ReadDistribution,
    pub results: Vec<ReclaimThresholdResult>,
    pub scenarios: BTreeMap<String, ScenarioProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradeoff: Option<TradeoffSummary>,
}

impl SweepReport {
    pub fn new(
        inputs: ReportInputs,
        footprint: ModelFootprint,
        distribution: ReadDistribution,
        results: Vec<ReclaimThresholdResult>,
        scenarios: BTreeMap<String, ScenarioProjection>,
    ) -> Self {
        let tradeoff = TradeoffSummary::compare(&results);
        Self {
            inputs,
            footprint,
            distribution,
            results,
            scenarios,
            tradeoff,
        }
    }

    /// Export to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Export to CSV, one row per threshold
    pub fn to_csv(&self) -> Result<String> {
        let unit = self.inputs.tbw_unit;
        let mut csv = String::new();

        csv.push_str(&format!(
            "threshold,tokens_to_trigger,reclaims_per_hot_block,total_reclaims,avg_pe_cycles,tbw_{},accumulated_reads,ecc_failure_rate,lifetime_years,fault\n",
            unit.label().to_lowercase()
        ));

        for r in &self.results {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{}\n",
                r.threshold,
                csv_float(r.tokens_to_trigger),
                csv_float(r.reclaims_per_hot_block),
                csv_float(r.total_reclaims),
                csv_float(r.avg_pe_cycles),
                csv_float(unit.convert(r.tbw_bytes)),
                csv_float(r.accumulated_reads),
                r.ecc_failure_rate.map(csv_float).unwrap_or_default(),
                csv_float(r.lifetime_years),
                r.fault.as_ref().map(|f| f.category.as_str()).unwrap_or(""),
            ));
        }

        Ok(csv)
    }

    /// Export scenario lifespans to CSV, one row per scenario and threshold
    pub fn scenarios_to_csv(&self) -> Result<String> {
        let unit = self.inputs.tbw_unit;
        let mut csv = String::new();

        csv.push_str(&format!(
            "scenario,tokens_per_day,threshold,pe_per_day,lifespan_days,lifespan_years,tbw_{}_per_day,severity\n",
            unit.label().to_lowercase()
        ));

        for (name, projection) in &self.scenarios {
            for lifespan in &projection.lifespans {
                csv.push_str(&format!(
                    "{},{},{},{},{},{},{},{}\n",
                    csv_text(name),
                    projection.scenario.tokens_per_day,
                    lifespan.threshold,
                    csv_float(lifespan.lifetime.pe_per_day),
                    csv_float(lifespan.lifetime.days),
                    csv_float(lifespan.lifetime.years),
                    csv_float(unit.convert(lifespan.tbw_bytes_per_day)),
                    lifespan.severity.label(),
                ));
            }
        }

        Ok(csv)
    }

    /// Fixed-width table for terminal output
    pub fn render_table(&self) -> String {
        let unit = self.inputs.tbw_unit;
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Read-reclaim trade-off: {} ({} tokens, {:.3} reads/token, concentration {}x)",
            self.inputs.model_name,
            self.inputs.campaign_tokens,
            self.inputs.read_rate_per_token,
            self.inputs.concentration_factor
        );
        let _ = writeln!(
            out,
            "{:>10} {:>14} {:>10} {:>10} {:>14} {:>10} {:>12}",
            "Threshold",
            "Trigger",
            "Reclaims",
            "Avg P/E",
            format!("TBW ({})", unit.label()),
            "ECC fail",
            "Lifetime"
        );
        let _ = writeln!(out, "{}", "-".repeat(86));

        for r in &self.results {
            let ecc = match (r.ecc_failure_rate, &r.fault) {
                (Some(rate), _) => format!("{:.4}", rate),
                (None, Some(fault)) => fault.category.clone(),
                (None, None) => "-".to_string(),
            };
            let _ = writeln!(
                out,
                "{:>10} {:>14} {:>10.2} {:>10.4} {:>14.3} {:>10} {:>12}",
                r.threshold,
                display_trigger(r.tokens_to_trigger),
                r.reclaims_per_hot_block,
                r.avg_pe_cycles,
                unit.convert(r.tbw_bytes),
                ecc,
                display_lifetime(r.lifetime_years),
            );
        }

        if let Some(tradeoff) = &self.tradeoff {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Threshold {} vs {}: {}x TBW, {}x lifetime, {} failure rate",
                tradeoff.lowest_threshold,
                tradeoff.highest_threshold,
                display_ratio(tradeoff.tbw_ratio),
                display_ratio(tradeoff.lifetime_ratio),
                tradeoff
                    .failure_rate_ratio
                    .map(|r| format!("{}x", display_ratio(r)))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
        }

        out
    }
}

fn csv_float(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}

fn csv_text(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn display_trigger(tokens: f64) -> String {
    if tokens > TRIGGER_DISPLAY_CAP {
        ">1B tok".to_string()
    } else {
        format!("{:.0}", tokens)
    }
}

fn display_lifetime(years: f64) -> String {
    if years > LIFETIME_DISPLAY_CAP_YEARS {
        ">100 yr".to_string()
    } else {
        format!("{:.2} yr", years)
    }
}

fn display_ratio(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}", value)
    } else {
        "inf".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::WorkloadModel;

    fn reference_report() -> SweepReport {
        let config = AnalysisConfig {
            parallel: false,
            ..AnalysisConfig::default()
        };
        let sweep = ThresholdSweep::new(&config).unwrap();
        let results = sweep.run(&config.thresholds).unwrap();
        let scenarios = sweep.scenario_lifespans(&results, &config.scenarios);
        let footprint = WorkloadModel::new(&config.model).unwrap().footprint(&config.geometry);
        SweepReport::new(
            ReportInputs::new(&config, &sweep),
            footprint,
            *sweep.distribution(),
            results,
            scenarios,
        )
    }

    #[test]
    fn test_json_keeps_infinity() {
        let report = reference_report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"lifetime_years\": \"inf\""));

        let back = SweepReport::from_json(&json).unwrap();
        assert_eq!(back.results.len(), report.results.len());
        let last = back.results.last().unwrap();
        assert_eq!(last.threshold, 1_000_000);
        assert_eq!(last.lifetime_years, f64::INFINITY);
        assert_eq!(back.inputs.model_name, "Llama2-70B");
    }

    #[test]
    fn test_csv_one_row_per_threshold() {
        let report = reference_report();
        let csv = report.to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 1 + report.results.len());
        assert!(lines[0].starts_with("threshold,tokens_to_trigger"));
        assert!(lines[0].contains("tbw_tb"));
        assert!(lines[1].starts_with("10,"));
        assert!(lines.last().unwrap().starts_with("1000000,"));
        assert!(lines.last().unwrap().contains(",inf,"));
        for line in &lines {
            assert_eq!(line.split(',').count(), 10);
        }
    }

    #[test]
    fn test_scenario_csv_rows() {
        let report = reference_report();
        let csv = report.scenarios_to_csv().unwrap();
        // 4 scenarios x 10 thresholds
        assert_eq!(csv.lines().count(), 1 + 40);
        assert!(csv.contains("Heavy Load (Production),1000000000,100,"));
        assert!(csv.contains("UNBOUNDED"));
        assert!(csv.contains("CRITICAL"));
    }

    #[test]
    fn test_table_caps() {
        let table = reference_report().render_table();
        assert!(table.contains("Llama2-70B"));
        assert!(table.contains(">1B tok"));
        assert!(table.contains(">100 yr"));
        assert!(table.contains("TBW (TB)"));
        assert!(table.contains("Threshold 10 vs 1000000"));
    }

    #[test]
    fn test_tradeoff_summary() {
        let report = reference_report();
        let tradeoff = report.tradeoff.as_ref().unwrap();
        assert_eq!(tradeoff.lowest_threshold, 10);
        assert_eq!(tradeoff.highest_threshold, 1_000_000);
        // the highest threshold never fires
        assert_eq!(tradeoff.tbw_ratio, f64::INFINITY);
        assert_eq!(tradeoff.lifetime_ratio, f64::INFINITY);
        // 0.0155 + 0.031*3.549 against 0.0155 + 0.031*0.01
        let ratio = tradeoff.failure_rate_ratio.unwrap();
        assert!((ratio - 0.125_523_221_428_571_4 / 0.015_81).abs() < 1e-6);
    }

    #[test]
    fn test_tradeoff_empty_and_equal() {
        assert!(TradeoffSummary::compare(&[]).is_none());
        assert_eq!(ratio(0.0, 0.0), 1.0);
        assert_eq!(ratio(f64::INFINITY, f64::INFINITY), 1.0);
        assert_eq!(ratio(4.0, 2.0), 2.0);
    }

    #[test]
    fn test_csv_text_quoting() {
        assert_eq!(csv_text("plain"), "plain");
        assert_eq!(csv_text("a,b"), "\"a,b\"");
    }
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reclaim_core::{AnalysisConfig, Error, ModelProfile};
use reclaim_sim::{AnalysisRunner, ReadRateFit, SweepReport, TraceConfig, TraceGenerator};

/// Read-reclaim reliability versus endurance analysis
#[derive(Parser)]
#[command(name = "reclaim-sim")]
#[command(about = "Project read-reclaim wear and reliability for LLM weight streaming")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep reclaim thresholds and export the trade-off report
    Sweep {
        /// Configuration YAML file (defaults to $RECLAIM_CONFIG or ./reclaim.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Export format (json, csv, both)
        #[arg(long, default_value = "both")]
        format: String,

        /// Override the campaign length in tokens
        #[arg(long)]
        campaign_tokens: Option<u64>,

        /// Evaluate thresholds on a single thread
        #[arg(long)]
        sequential: bool,
    },

    /// Generate an example configuration file
    Generate {
        /// Model profile (llama2-70b, llama-7b)
        #[arg(short, long, default_value = "llama2-70b")]
        model: String,

        /// Output file path
        #[arg(short, long, default_value = "reclaim.yaml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration YAML file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Write a block-level replay trace for an SSD simulator
    Trace {
        /// Model profile (llama2-70b, llama-7b)
        #[arg(short, long, default_value = "llama-7b")]
        model: String,

        /// Number of generated tokens
        #[arg(short, long, default_value_t = 1)]
        tokens: u64,

        /// Output trace file
        #[arg(short, long, default_value = "llm.trace")]
        output: PathBuf,

        /// Largest request size in KiB
        #[arg(long, default_value_t = 256)]
        max_request_kb: u64,

        /// Skip the model write phase
        #[arg(long)]
        no_prefill: bool,
    },

    /// Fit a read rate from measured `tokens,flash_reads` samples
    Fit {
        /// CSV file with one sample per line
        #[arg(short, long)]
        input: PathBuf,

        /// Base configuration to update with the fitted calibration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the updated configuration here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.verbose)?;

    match cli.command {
        Commands::Sweep {
            config,
            output,
            format,
            campaign_tokens,
            sequential,
        } => run_sweep(config, output, format, campaign_tokens, sequential),
        Commands::Generate { model, output } => generate_example(model, output),
        Commands::Validate { config } => validate_config(config),
        Commands::Trace {
            model,
            tokens,
            output,
            max_request_kb,
            no_prefill,
        } => write_trace(model, tokens, output, max_request_kb, no_prefill),
        Commands::Fit {
            input,
            config,
            output,
        } => fit_read_rate(input, config, output),
    }
}

fn init_tracing(log_level: &str, verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        match log_level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("reclaim_sim={},reclaim_core={}", level, level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

fn profile_by_name(name: &str) -> Result<ModelProfile> {
    match name.to_lowercase().as_str() {
        "llama2-70b" => Ok(ModelProfile::llama2_70b()),
        "llama-7b" => Ok(ModelProfile::llama_7b()),
        _ => {
            error!("Unknown model: {}. Use 'llama2-70b' or 'llama-7b'", name);
            Err(anyhow::anyhow!("Unknown model: {}", name))
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            AnalysisConfig::load_from_file(path)
                .with_context(|| format!("failed to load configuration from {:?}", path))
        }
        None => {
            info!("Loading configuration from environment and defaults");
            AnalysisConfig::load().context("failed to load configuration")
        }
    }
}

fn run_sweep(
    config_path: Option<PathBuf>,
    output_dir: PathBuf,
    format: String,
    campaign_tokens: Option<u64>,
    sequential: bool,
) -> Result<()> {
    if !matches!(format.as_str(), "json" | "csv" | "both") {
        error!("Unknown format: {}. Use 'json', 'csv', or 'both'", format);
        return Err(anyhow::anyhow!("Unknown format: {}", format));
    }

    let mut config = load_config(config_path.as_deref())?;
    if let Some(tokens) = campaign_tokens {
        config.campaign_tokens = tokens;
    }
    if sequential {
        config.parallel = false;
    }

    info!("Validating configuration");
    config.validate()?;

    let runner = AnalysisRunner::new(config.clone())?;
    let report = runner.run()?;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create output directory {:?}", output_dir))?;
    config.to_yaml_file(output_dir.join("config.yaml"))?;
    export_report(&report, &output_dir, &format)?;

    println!("{}", report.render_table());
    info!("Sweep completed successfully. Results saved to {:?}", output_dir);
    Ok(())
}

fn export_report(report: &SweepReport, output_dir: &Path, format: &str) -> Result<()> {
    if format == "json" || format == "both" {
        std::fs::write(output_dir.join("report.json"), report.to_json()?)?;
    }
    if format == "csv" || format == "both" {
        std::fs::write(output_dir.join("thresholds.csv"), report.to_csv()?)?;
        std::fs::write(output_dir.join("scenarios.csv"), report.scenarios_to_csv()?)?;
    }
    Ok(())
}

fn generate_example(model: String, output_path: PathBuf) -> Result<()> {
    info!("Generating {} example configuration", model);

    let config = AnalysisConfig {
        model: profile_by_name(&model)?,
        ..AnalysisConfig::default()
    };

    config.to_yaml_file(&output_path)?;
    info!("Example configuration saved to {:?}", output_path);
    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_path);

    let config = AnalysisConfig::from_yaml_file(&config_path)
        .with_context(|| format!("invalid configuration {:?}", config_path))?;

    info!("Configuration is valid!");
    info!("  - Model: {} ({} layers)", config.model.name, config.model.num_layers);
    info!("  - Blocks: {}", config.geometry.total_blocks);
    info!("  - Read rate: {} reads/token", config.calibration.read_rate_per_token);
    info!("  - Campaign: {} tokens", config.campaign_tokens);
    info!("  - Thresholds: {:?}", config.thresholds);
    info!("  - Reliability model: {}", config.reliability.name());

    Ok(())
}

fn write_trace(
    model: String,
    tokens: u64,
    output_path: PathBuf,
    max_request_kb: u64,
    no_prefill: bool,
) -> Result<()> {
    let profile = profile_by_name(&model)?;
    let max_request_bytes = max_request_kb
        .checked_mul(1024)
        .ok_or_else(|| Error::config(format!("max request of {} KiB overflows", max_request_kb)))?;
    let config = TraceConfig {
        max_request_bytes,
        prefill: !no_prefill,
        ..TraceConfig::default()
    };

    info!("Generating {} trace for {} tokens", profile.name, tokens);
    let generator = TraceGenerator::new(&profile, tokens, config)?;

    let file = File::create(&output_path)
        .with_context(|| format!("failed to create trace file {:?}", output_path))?;
    let summary = generator.write_to(BufWriter::new(file))?;

    info!(
        "Trace saved to {:?}: {} requests, end LBA {}, duration {:.4} s",
        output_path,
        summary.requests,
        summary.final_lba,
        summary.duration_secs()
    );
    Ok(())
}

fn fit_read_rate(
    input: PathBuf,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read samples from {:?}", input))?;
    let samples = ReadRateFit::parse_csv(&content)?;
    let fit = ReadRateFit::fit(&samples)?;

    println!(
        "read_rate_per_token = {:.6} (R^2 = {:.4}, {} samples)",
        fit.calibration.read_rate_per_token, fit.calibration.fit_quality, fit.samples
    );

    if let Some(output) = output {
        let mut config = match config_path {
            Some(path) => AnalysisConfig::from_yaml_file(&path)
                .with_context(|| format!("invalid configuration {:?}", path))?,
            None => AnalysisConfig::default(),
        };
        config.calibration = fit.calibration;
        config.to_yaml_file(&output)?;
        info!("Calibrated configuration saved to {:?}", output);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_example_generation() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("test.yaml");

        let result = generate_example("llama-7b".to_string(), output_path.clone());
        assert!(result.is_ok());
        assert!(output_path.exists());

        let config = AnalysisConfig::from_yaml_file(&output_path).unwrap();
        assert_eq!(config.model.num_layers, 32);
        assert!(validate_config(output_path).is_ok());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let temp_dir = tempdir().unwrap();
        assert!(generate_example("gpt-9".to_string(), temp_dir.path().join("x.yaml")).is_err());
    }

    #[test]
    fn test_sweep_writes_outputs() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let output_dir = temp_dir.path().join("results");
        AnalysisConfig::default().to_yaml_file(&config_path).unwrap();

        run_sweep(
            Some(config_path),
            output_dir.clone(),
            "both".to_string(),
            Some(20_000_000),
            true,
        )
        .unwrap();

        assert!(output_dir.join("config.yaml").exists());
        assert!(output_dir.join("thresholds.csv").exists());
        assert!(output_dir.join("scenarios.csv").exists());

        let json = std::fs::read_to_string(output_dir.join("report.json")).unwrap();
        let report = SweepReport::from_json(&json).unwrap();
        assert_eq!(report.inputs.campaign_tokens, 20_000_000);
        assert_eq!(report.results.len(), 10);
    }

    #[test]
    fn test_sweep_rejects_unknown_format() {
        let temp_dir = tempdir().unwrap();
        let result = run_sweep(None, temp_dir.path().to_path_buf(), "xml".to_string(), None, true);
        assert!(result.is_err());
    }

    #[test]
    fn test_trace_file() {
        let temp_dir = tempdir().unwrap();
        let trace_path = temp_dir.path().join("llama.trace");

        write_trace("llama-7b".to_string(), 1, trace_path.clone(), 256, true).unwrap();

        let content = std::fs::read_to_string(&trace_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("0 0 0 512 1"));
        assert_eq!(content.lines().count(), 1544 * 32);
    }

    #[test]
    fn test_trace_rejects_oversized_request() {
        let temp_dir = tempdir().unwrap();
        let trace_path = temp_dir.path().join("huge.trace");

        let err = write_trace("llama-7b".to_string(), 1, trace_path.clone(), u64::MAX, true)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidConfiguration(_))
        ));
        assert!(!trace_path.exists());
    }

    #[test]
    fn test_fit_updates_config() {
        let temp_dir = tempdir().unwrap();
        let samples = temp_dir.path().join("samples.csv");
        let output = temp_dir.path().join("calibrated.yaml");
        std::fs::write(&samples, "tokens,flash_reads\n1000,500\n2000,1000\n4000,2000\n").unwrap();

        fit_read_rate(samples, None, Some(output.clone())).unwrap();

        let config = AnalysisConfig::from_yaml_file(&output).unwrap();
        assert!((config.calibration.read_rate_per_token - 0.5).abs() < 1e-12);
        assert!((config.calibration.fit_quality - 1.0).abs() < 1e-12);
    }
}

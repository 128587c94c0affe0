//! Run configuration shared by every `linkfault` subcommand.
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, ValueHint};
use serde::{Deserialize, Serialize};

use linkfault_models::config::{ModelConfig, ModelType};
use linkfault_models::io::FeatureCsvConfig;
use linkfault_models::models::driver::{DEFAULT_BENCHMARK_RUNS, DEFAULT_BENCHMARK_SAMPLES};
use linkfault_models::resampling::UndersampleMethod;
use linkfault_models::snapshot::DEFAULT_SNAPSHOT_ROOT;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub model: ModelConfig,
    pub label_column: String,
    pub drop_columns: Vec<String>,
    pub snapshot_root: PathBuf,
    pub benchmark_samples: usize,
    pub benchmark_runs: usize,
    pub plot_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let csv = FeatureCsvConfig::default();
        Self {
            model: ModelConfig::default(),
            label_column: csv.label_column,
            drop_columns: csv.drop_columns,
            snapshot_root: PathBuf::from(DEFAULT_SNAPSHOT_ROOT),
            benchmark_samples: DEFAULT_BENCHMARK_SAMPLES,
            benchmark_runs: DEFAULT_BENCHMARK_RUNS,
            plot_dir: None,
        }
    }
}

impl RunConfig {
    pub fn csv_config(&self) -> FeatureCsvConfig {
        FeatureCsvConfig {
            label_column: self.label_column.clone(),
            drop_columns: self.drop_columns.clone(),
        }
    }

    /// Load the `--config` file when given, otherwise defaults, then apply
    /// command-line overrides.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => {
                log::info!("Using config: {}", path.display());
                load_run_config(path)?
            }
            None => {
                let config = RunConfig::default();
                log::info!("No config file provided; using defaults.");
                config
            }
        };
        config.apply_overrides(matches)?;

        if matches.get_one::<PathBuf>("config").is_none() {
            let json = serde_json::to_string_pretty(&config).unwrap_or_default();
            log::info!("Effective config:\n{}", json);
        }
        Ok(config)
    }

    fn apply_overrides(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(model_type) = matches.get_one::<String>("model_type") {
            self.model.model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
        }
        if let Some(method) = matches.get_one::<String>("undersample") {
            self.model.undersample = UndersampleMethod::from_str(method)?;
        }
        if let Some(root) = matches.get_one::<PathBuf>("snapshot_root") {
            self.snapshot_root = root.clone();
        }
        if let Some(dir) = matches.get_one::<PathBuf>("plot_dir") {
            self.plot_dir = Some(dir.clone());
        }
        if let Some(&samples) = matches.get_one::<usize>("samples") {
            self.benchmark_samples = samples;
        }
        if let Some(&runs) = matches.get_one::<usize>("runs") {
            self.benchmark_runs = runs;
        }
        if let Some(label) = matches.get_one::<String>("label_column") {
            self.label_column = label.clone();
        }
        Ok(())
    }
}

/// Arguments read by [`RunConfig::from_arguments`]. Every subcommand that
/// builds a `RunConfig` must register all of them.
pub fn run_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .short('c')
            .long("config")
            .help("Path to a JSON run configuration file")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("model_type")
            .short('m')
            .long("model-type")
            .help("Override the model type from the JSON config.")
            .value_parser(["gbdt", "logistic", "rule"])
            .value_hint(ValueHint::Other),
        Arg::new("undersample")
            .long("undersample")
            .help("Undersampling applied to the training split.")
            .value_parser(["none", "random", "nearmiss"])
            .value_hint(ValueHint::Other),
        Arg::new("snapshot_root")
            .long("snapshot-root")
            .help("Directory that snapshot files are written under.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("plot_dir")
            .long("plot-dir")
            .help("Write HTML plots into this directory.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("samples")
            .long("samples")
            .help("Test rows predicted per benchmark run.")
            .value_parser(clap::value_parser!(usize)),
        Arg::new("runs")
            .long("runs")
            .help("Number of benchmark runs.")
            .value_parser(clap::value_parser!(usize)),
        Arg::new("label_column")
            .long("label-column")
            .help("Name of the boolean fault label column.")
            .value_parser(clap::builder::NonEmptyStringValueParser::new()),
    ]
}

/// Load a run configuration from a JSON file.
pub fn load_run_config<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: RunConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

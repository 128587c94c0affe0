use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use linkfault_cli::commands::compare::{plot_compare, run_compare};
use linkfault_cli::commands::evaluate::{run_benchmark, run_validate};
use linkfault_cli::commands::importance::{run_importance, DEFAULT_REPEATS};
use linkfault_cli::commands::predict::run_predict;
use linkfault_cli::commands::snapshot::{run_granularity, run_resampling, run_snapshot};
use linkfault_cli::config::{run_args, RunConfig};
use linkfault_models::shap::KernelShapConfig;

fn data_arg() -> Arg {
    Arg::new("data")
        .help("Path to a preprocessed feature CSV")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("LINKFAULT_LOG", "error,linkfault=info"))
        .init();

    let matches = Command::new("linkfault")
        .version(clap::crate_version!())
        .about("Train, validate, benchmark and snapshot network-link fault predictors")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("snapshot")
                .about("Retrain a model and write its predictor and metrics snapshot")
                .arg(data_arg())
                .args(run_args())
                .arg(
                    Arg::new("best")
                        .long("best")
                        .help("Grid-search hyper-parameters before taking the snapshot.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("model_name")
                        .long("model-name")
                        .help("Name used in the snapshot file name. Defaults to the predictor name.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                )
                .arg(
                    Arg::new("dataset")
                        .short('d')
                        .long("dataset")
                        .help("Snapshot directory name. Defaults to the data file stem.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new()),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Train a model and print its error report")
                .arg(data_arg())
                .args(run_args())
                .arg(
                    Arg::new("train")
                        .long("train")
                        .help("Report the training error instead of the test error.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("benchmark")
                .about("Measure prediction time, disk footprint and RAM footprint")
                .arg(data_arg())
                .args(run_args()),
        )
        .subcommand(
            Command::new("granularity")
                .about("Snapshot every feature CSV in a directory, one per aggregation interval")
                .arg(
                    Arg::new("dir")
                        .help("Directory of feature CSV files")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .args(run_args()),
        )
        .subcommand(
            Command::new("resampling")
                .about("Snapshot a dataset once per undersampling method")
                .arg(data_arg())
                .args(run_args()),
        )
        .subcommand(
            Command::new("importance")
                .about("Rank features by built-in, permutation and SHAP importance on the test split")
                .arg(data_arg())
                .args(run_args())
                .arg(
                    Arg::new("repeats")
                        .long("repeats")
                        .help("Shuffles per feature.")
                        .default_value("5")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("top")
                        .long("top")
                        .help("Only show the highest ranked features.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("shap")
                        .long("shap")
                        .help("Also rank by kernel SHAP, globally and per prediction outcome.")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("shap_samples")
                        .long("shap-samples")
                        .help("Coalitions evaluated per explained row.")
                        .requires("shap")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("shap_rows")
                        .long("shap-rows")
                        .help("Test rows explained by SHAP.")
                        .requires("shap")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Tabulate the snapshots of one dataset directory")
                .arg(
                    Arg::new("dir")
                        .help("Snapshot dataset directory")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("plot")
                        .long("plot")
                        .help("Write a scatter plot of two metrics to this HTML file.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("x_metric")
                        .long("x-metric")
                        .default_value("Compute per Analysis")
                        .help("Metric on the x axis of the plot."),
                )
                .arg(
                    Arg::new("y_metric")
                        .long("y-metric")
                        .default_value("F1 Score")
                        .help("Metric on the y axis of the plot."),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict faults with a saved snapshot predictor")
                .arg(
                    Arg::new("snapshot")
                        .short('s')
                        .long("snapshot")
                        .help("Predictor file written by a snapshot (*.json)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(data_arg())
                .args(run_args())
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help("Path to write predictions (CSV). Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("snapshot", sub_m)) => handle_snapshot(sub_m),
        Some(("validate", sub_m)) => handle_validate(sub_m),
        Some(("benchmark", sub_m)) => handle_benchmark(sub_m),
        Some(("granularity", sub_m)) => handle_granularity(sub_m),
        Some(("resampling", sub_m)) => handle_resampling(sub_m),
        Some(("importance", sub_m)) => handle_importance(sub_m),
        Some(("compare", sub_m)) => handle_compare(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn exit_on_error<T>(result: Result<T>, what: &str) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("{} failed: {:#}", what, e);
            std::process::exit(1)
        }
    }
}

fn handle_snapshot(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches.get_one("data").unwrap();
    log::info!("[linkfault] Snapshot of {:?}", data);
    let config = RunConfig::from_arguments(matches)?;
    let result = run_snapshot(
        data,
        &config,
        matches.get_flag("best"),
        matches.get_one::<String>("model_name").map(String::as_str),
        matches.get_one::<String>("dataset").map(String::as_str),
    );
    exit_on_error(result, "Snapshot")
}

fn handle_validate(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches.get_one("data").unwrap();
    let config = RunConfig::from_arguments(matches)?;
    exit_on_error(
        run_validate(data, &config, matches.get_flag("train")),
        "Validation",
    )
}

fn handle_benchmark(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches.get_one("data").unwrap();
    let config = RunConfig::from_arguments(matches)?;
    exit_on_error(run_benchmark(data, &config), "Benchmark")
}

fn handle_granularity(matches: &ArgMatches) -> Result<()> {
    let dir: &PathBuf = matches.get_one("dir").unwrap();
    log::info!("[linkfault] Granularity sweep over {:?}", dir);
    let config = RunConfig::from_arguments(matches)?;
    exit_on_error(run_granularity(dir, &config), "Granularity sweep")
}

fn handle_resampling(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches.get_one("data").unwrap();
    let config = RunConfig::from_arguments(matches)?;
    exit_on_error(run_resampling(data, &config), "Resampling sweep")
}

fn handle_importance(matches: &ArgMatches) -> Result<()> {
    let data: &PathBuf = matches.get_one("data").unwrap();
    let config = RunConfig::from_arguments(matches)?;
    let repeats = matches
        .get_one::<usize>("repeats")
        .copied()
        .unwrap_or(DEFAULT_REPEATS);
    let top = matches.get_one::<usize>("top").copied();
    let shap = matches.get_flag("shap").then(|| {
        let mut shap = KernelShapConfig::default();
        if let Some(&n) = matches.get_one::<usize>("shap_samples") {
            shap.n_samples = n;
        }
        if let Some(&n) = matches.get_one::<usize>("shap_rows") {
            shap.max_rows = n;
        }
        shap
    });
    exit_on_error(
        run_importance(data, &config, repeats, top, shap.as_ref()),
        "Feature importance",
    )
}

fn handle_compare(matches: &ArgMatches) -> Result<()> {
    let dir: &PathBuf = matches.get_one("dir").unwrap();
    let result = run_compare(dir).and_then(|snapshots| match matches.get_one::<PathBuf>("plot") {
        Some(output) => {
            let x_metric: &String = matches.get_one("x_metric").unwrap();
            let y_metric: &String = matches.get_one("y_metric").unwrap();
            plot_compare(&snapshots, x_metric, y_metric, output)
        }
        None => Ok(()),
    });
    exit_on_error(result, "Comparison")
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let snapshot: &PathBuf = matches.get_one("snapshot").unwrap();
    let data: &PathBuf = matches.get_one("data").unwrap();
    let output: Option<&PathBuf> = matches.get_one("output_file");
    let config = RunConfig::from_arguments(matches)?;
    exit_on_error(
        run_predict(snapshot, data, &config, output.map(PathBuf::as_path)),
        "Prediction",
    )
}

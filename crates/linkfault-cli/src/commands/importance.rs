use std::path::Path;

use anyhow::Result;

use linkfault_models::feature_importance::{
    permutation_importance, plot_ranked, rank_importances, PermutationImportance,
};
use linkfault_models::shap::{shap_importance_by_outcome, KernelShapConfig, ShapImportance};

use crate::commands::{build_driver, load_dataset};
use crate::config::RunConfig;

pub const DEFAULT_REPEATS: usize = 5;
const PERMUTATION_SEED: u64 = 0;

#[derive(Debug)]
pub struct ImportanceReport {
    /// Scores the predictor exposes itself, e.g. impurity decrease.
    pub builtin: Option<Vec<(String, f64)>>,
    pub permutation: Vec<PermutationImportance>,
    /// One ranking per prediction outcome, empty unless SHAP was requested.
    pub shap: Vec<ShapImportance>,
}

fn print_ranked(ranked: &[(String, f64)]) {
    for (name, score) in ranked {
        println!("  {:<24} {:.6}", name, score);
    }
}

/// Feature importance on the test split: the predictor's own scores when it
/// has any, permutation importance, and with `shap` set, kernel SHAP mean
/// |phi| globally and per prediction outcome against the training split.
pub fn run_importance(
    data: &Path,
    config: &RunConfig,
    n_repeats: usize,
    top: Option<usize>,
    shap: Option<&KernelShapConfig>,
) -> Result<ImportanceReport> {
    let dataset = load_dataset(data, config)?;
    let feature_names = dataset.feature_names.clone();
    let mut driver = build_driver(dataset, config, &config.model)?;
    driver.model_mut().train(false)?;

    let model = driver.model();
    let builtin = match model.predictor().feature_importances() {
        Some(scores) => {
            let ranked = rank_importances(&feature_names, &scores, top)?;
            println!("Built-in importance ({}):", model.name());
            print_ranked(&ranked);
            if let Some(dir) = &config.plot_dir {
                let path = dir.join(format!("{}-builtin-importance.html", model.name()));
                plot_ranked(&ranked, "Built-in Importance", &path)?;
            }
            Some(ranked)
        }
        None => None,
    };

    let importances = permutation_importance(
        model.predictor(),
        model.x_test()?,
        model.y_test()?,
        &feature_names,
        n_repeats,
        PERMUTATION_SEED,
    )?;

    println!("Permutation importance ({} repeats):", n_repeats);
    let shown = top.unwrap_or(importances.len()).min(importances.len());
    for item in &importances[..shown] {
        println!("  {:<24} {:.6} +/- {:.6}", item.feature, item.mean, item.std);
    }

    if let Some(dir) = &config.plot_dir {
        let ranked: Vec<(String, f64)> = importances[..shown]
            .iter()
            .map(|p| (p.feature.clone(), p.mean))
            .collect();
        let path = dir.join(format!("{}-permutation-importance.html", model.name()));
        plot_ranked(&ranked, "Permutation Importance", &path)?;
        log::info!("Importance plot written to {}", path.display());
    }

    let shap = match shap {
        Some(shap_config) => {
            let y_test = model.y_test()?.to_vec();
            let summaries = shap_importance_by_outcome(
                model.predictor(),
                model.x_train()?.view(),
                model.x_test()?.view(),
                &y_test,
                &feature_names,
                shap_config,
                top,
            )?;
            for summary in &summaries {
                println!(
                    "SHAP mean |phi|, {} ({} rows):",
                    summary.outcome.label(),
                    summary.rows
                );
                print_ranked(&summary.ranked);
                if let (Some(dir), false) = (&config.plot_dir, summary.ranked.is_empty()) {
                    let path = dir.join(format!(
                        "{}-shap-{}.html",
                        model.name(),
                        summary.outcome.label()
                    ));
                    plot_ranked(
                        &summary.ranked,
                        &format!("SHAP Importance ({})", summary.outcome.label()),
                        &path,
                    )?;
                }
            }
            summaries
        }
        None => Vec::new(),
    };

    Ok(ImportanceReport {
        builtin,
        permutation: importances,
        shap,
    })
}

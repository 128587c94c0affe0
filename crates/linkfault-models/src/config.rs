use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::data_handling::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION};
#[cfg(feature = "linfa")]
use crate::models::decision_tree::TreeParams;
use crate::models::gbdt::GBDTParams;
#[cfg(feature = "linfa")]
use crate::models::logistic::LogisticParams;
use crate::models::rule_based::RuleParams;
use crate::resampling::UndersampleMethod;

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub model_type: ModelType,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub undersample: UndersampleMethod,
}

/// Supported predictor backends and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    GBDT(GBDTParams),
    #[cfg(feature = "linfa")]
    LogisticRegression(LogisticParams),
    #[cfg(feature = "linfa")]
    DecisionTree(TreeParams),
    RuleBased(RuleParams),
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT(GBDTParams::default())
    }
}

impl ModelType {
    /// Short name accepted by `FromStr`.
    pub fn short_name(&self) -> &'static str {
        match self {
            ModelType::GBDT(_) => "gbdt",
            #[cfg(feature = "linfa")]
            ModelType::LogisticRegression(_) => "logistic",
            #[cfg(feature = "linfa")]
            ModelType::DecisionTree(_) => "tree",
            ModelType::RuleBased(_) => "rule",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::GBDT(GBDTParams::default())),
            #[cfg(feature = "linfa")]
            "logistic" | "logistic_regression" => {
                Ok(ModelType::LogisticRegression(LogisticParams::default()))
            }
            #[cfg(feature = "linfa")]
            "tree" | "decision_tree" => Ok(ModelType::DecisionTree(TreeParams::default())),
            "rule" | "rule_based" => Ok(ModelType::RuleBased(RuleParams::default())),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: gbdt, logistic, tree, rule \
                 (logistic and tree require the `linfa` feature)",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            ..Self::default()
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::default(),
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
            undersample: UndersampleMethod::default(),
        }
    }
}

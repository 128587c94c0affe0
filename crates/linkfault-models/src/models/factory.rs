use crate::config::{ModelConfig, ModelType};
use crate::error::Result;
use crate::models::classifier_trait::Predictor;
use crate::models::gbdt::GBDTClassifier;
use crate::models::rule_based::RuleBasedModel;

/// Build an unfitted boxed predictor from a `ModelConfig`.
///
/// `feature_names` are the dataset columns; the rule-based model resolves its
/// inputs by name and fails when they are missing.
pub fn build_model(config: &ModelConfig, feature_names: &[String]) -> Result<Box<dyn Predictor>> {
    match &config.model_type {
        ModelType::GBDT(params) => Ok(Box::new(GBDTClassifier::new(params.clone()))),

        #[cfg(feature = "linfa")]
        ModelType::LogisticRegression(params) => Ok(Box::new(
            crate::models::logistic::LogisticRegressionClassifier::new(params.clone()),
        )),

        #[cfg(feature = "linfa")]
        ModelType::DecisionTree(params) => Ok(Box::new(
            crate::models::decision_tree::DecisionTreeClassifier::new(params.clone()),
        )),

        ModelType::RuleBased(params) => {
            Ok(Box::new(RuleBasedModel::new(feature_names, params.clone())?))
        }
    }
}

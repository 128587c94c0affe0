//! Versioned on-disk format for fitted predictors.
//!
//! Each predictor writes a JSON envelope `{format_version, kind, params,
//! weights}`; loading dispatches on `kind`. A model saved with its dataset
//! also records the `feature_names` it was trained on.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::Predictor;
use crate::models::gbdt::GBDTClassifier;
#[cfg(feature = "linfa")]
use crate::models::decision_tree::DecisionTreeClassifier;
#[cfg(feature = "linfa")]
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::rule_based::RuleBasedModel;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    Gbdt,
    LogisticRegression,
    DecisionTree,
    RuleBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorEnvelope {
    pub format_version: u32,
    pub kind: PredictorKind,
    pub params: serde_json::Value,
    pub weights: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
}

impl PredictorEnvelope {
    pub fn new<P: Serialize, W: Serialize>(kind: PredictorKind, params: &P, weights: &W) -> Result<Self> {
        Ok(PredictorEnvelope {
            format_version: FORMAT_VERSION,
            kind,
            params: serde_json::to_value(params)?,
            weights: serde_json::to_value(weights)?,
            feature_names: Vec::new(),
        })
    }

    pub fn with_feature_names(mut self, feature_names: &[String]) -> Self {
        self.feature_names = feature_names.to_vec();
        self
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let envelope: PredictorEnvelope = serde_json::from_reader(reader)?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(EvalError::Serialization(format!(
                "unsupported predictor format version {} (expected {})",
                envelope.format_version, FORMAT_VERSION
            )));
        }
        Ok(envelope)
    }

    pub fn params<P: for<'de> Deserialize<'de>>(&self) -> Result<P> {
        Ok(serde_json::from_value(self.params.clone())?)
    }

    pub fn weights<W: for<'de> Deserialize<'de>>(&self) -> Result<W> {
        Ok(serde_json::from_value(self.weights.clone())?)
    }
}

/// Record the training columns in a predictor file written by
/// [`Predictor::save`].
pub fn attach_feature_names(path: &Path, feature_names: &[String]) -> Result<()> {
    PredictorEnvelope::read(path)?
        .with_feature_names(feature_names)
        .write(path)
}

/// Load any predictor written by [`Predictor::save`].
pub fn load_predictor(path: &Path) -> Result<Box<dyn Predictor>> {
    Ok(load_predictor_with_names(path)?.0)
}

/// Load a predictor and the feature names stored with it, empty when the
/// file records none.
pub fn load_predictor_with_names(path: &Path) -> Result<(Box<dyn Predictor>, Vec<String>)> {
    let envelope = PredictorEnvelope::read(path)?;
    let predictor = predictor_from_envelope(&envelope)?;
    Ok((predictor, envelope.feature_names))
}

fn predictor_from_envelope(envelope: &PredictorEnvelope) -> Result<Box<dyn Predictor>> {
    match envelope.kind {
        PredictorKind::Gbdt => Ok(Box::new(GBDTClassifier::from_envelope(envelope)?)),
        #[cfg(feature = "linfa")]
        PredictorKind::LogisticRegression => Ok(Box::new(
            LogisticRegressionClassifier::from_envelope(envelope)?,
        )),
        #[cfg(feature = "linfa")]
        PredictorKind::DecisionTree => Ok(Box::new(DecisionTreeClassifier::from_envelope(envelope)?)),
        #[cfg(not(feature = "linfa"))]
        PredictorKind::LogisticRegression | PredictorKind::DecisionTree => {
            Err(EvalError::UnsupportedOption(format!(
                "{:?} predictors require the `linfa` feature",
                envelope.kind
            )))
        }
        PredictorKind::RuleBased => Ok(Box::new(RuleBasedModel::from_envelope(envelope)?)),
    }
}

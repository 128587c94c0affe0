//! linkfault-models: evaluation and benchmarking harness for network-link
//! fault predictors.
//!
//! A [`models::base::BaseModel`] owns the seeded train/test split and the
//! undersampled training set of one dataset, and wraps a predictor backend
//! (gradient-boosted trees, logistic regression or a decision tree behind the
//! `linfa` feature, or a fixed rule). [`models::driver::ModelDriver`] trains
//! it lazily, reports errors, benchmarks it and writes snapshot files for
//! later comparison across models and aggregation granularities.
pub mod benchmark;
pub mod config;
pub mod confusion;
pub mod data_handling;
pub mod error;
pub mod feature_importance;
pub mod io;
pub mod metrics;
pub mod models;
pub mod report;
pub mod resampling;
pub mod shap;
pub mod snapshot;

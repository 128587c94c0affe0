pub mod base;
pub mod classifier_trait;
#[cfg(feature = "linfa")]
pub mod decision_tree;
pub mod driver;
pub mod factory;
pub mod gbdt;
pub mod grid_search;
#[cfg(feature = "linfa")]
pub mod logistic;
pub mod persist;
pub mod rule_based;

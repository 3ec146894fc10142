pub mod adaboost;
pub mod boosting;
pub mod classification_tree;
pub mod classifier;
pub mod figures;
pub mod forest;
pub mod metrics;
pub mod output;
pub mod params;
pub mod pipeline;
pub mod regression_tree;
pub mod runner;
pub mod scaler;
pub mod select;
pub mod split;
pub mod stats;
pub mod trajectory;

pub mod telemetry_csv;

pub use telemetry_csv::{read_feature_csv, read_feature_csv_with_config, FeatureCsvConfig};

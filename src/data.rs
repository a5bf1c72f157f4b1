mod detection;
mod device_type;
mod manifest;
mod metrics;
mod model_config;

pub use detection::{OmrBox, OmrDetection};
pub use device_type::DeviceType;
pub use manifest::{Category, CategoryManifest, SplitManifest};
pub use metrics::TrainingMetrics;
pub use model_config::ModelConfig;

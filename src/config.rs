use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Context;
use serde::Deserialize;
use crate::data::{DeviceType, ModelConfig};

/// Process-wide configuration, read once at startup and passed by reference
/// into each pipeline component. No hot reload.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub local: LocalConfig,
    pub train: TrainConfig,
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub model: ModelSection,
}

/// Object store credentials and dataset location.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Key prefix of the dataset inside the bucket, without trailing slash.
    pub datasets_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Destination of the split dataset and `data.yaml`.
    #[serde(default = "default_datasets_local_path")]
    pub datasets_local_path: PathBuf,
    /// Staging area mirroring the remote dataset before splitting.
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            datasets_local_path: default_datasets_local_path(),
            staging_path: default_staging_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainConfig {
    pub num_of_epochs: u32,
    pub image_size: u32,
    /// Model name without extension, e.g. `yolov8n`.
    pub model: String,
    /// External training command invoked with the manifest.
    #[serde(default = "default_train_command")]
    pub command: String,
    /// Where the trainer writes its run output (`results.csv`, weights).
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Base URI of the MLflow tracking server.
    pub uri: String,
    #[serde(default = "default_experiment")]
    pub experiment: String,
    #[serde(default = "default_run_name")]
    pub run_name: String,
    #[serde(default = "default_artifact_location")]
    pub artifact_location: String,
    /// Local directory holding the artifact files to upload.
    #[serde(default = "default_results_path")]
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Raw `[model]` section; converted into a [`ModelConfig`] once the device
/// string has been validated.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    pub weights: String,
    pub ort_lib: String,
    pub classes: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub device_id: usize,
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,
    #[serde(default = "default_model_side")]
    pub width: u32,
    #[serde(default = "default_model_side")]
    pub height: u32,
    #[serde(default = "default_target_label")]
    pub target_label: String,
    #[serde(default)]
    pub font: Option<String>,
}

impl ModelSection {
    pub fn to_model_config(&self) -> anyhow::Result<ModelConfig> {
        let device_type = DeviceType::from_str(&self.device, self.device_id)
            .with_context(|| format!("unknown inference device {:?}", self.device))?;
        Ok(ModelConfig {
            weights_path: self.weights.clone(),
            ort_lib_path: self.ort_lib.clone(),
            classes_path: self.classes.clone(),
            device_type,
            conf_threshold: self.conf_threshold,
            width: self.width,
            height: self.height,
            target_label: self.target_label.clone(),
            font_path: self.font.clone(),
        })
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: PipelineConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Path of the generated training configuration file.
    pub fn manifest_path(&self) -> PathBuf {
        self.local.datasets_local_path.join("data.yaml")
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_datasets_local_path() -> PathBuf {
    PathBuf::from("datasets")
}

fn default_staging_path() -> PathBuf {
    PathBuf::from("datasets_temp")
}

fn default_train_command() -> String {
    "yolo".to_string()
}

fn default_results_path() -> PathBuf {
    PathBuf::from("runs/detect/train")
}

fn default_experiment() -> String {
    "omr".to_string()
}

fn default_run_name() -> String {
    "testing".to_string()
}

fn default_artifact_location() -> String {
    "omr_artifacts".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_conf_threshold() -> f32 {
    0.5
}

fn default_model_side() -> u32 {
    640
}

fn default_target_label() -> String {
    "shade".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [store]
        endpoint = "http://localhost:9000"
        access_key = "minio"
        secret_key = "minio123"
        bucket = "omr-datasets"
        datasets_path = "omr/v6"

        [train]
        num_of_epochs = 2
        image_size = 640
        model = "yolov8n"

        [tracking]
        uri = "http://localhost:5000"

        [model]
        weights = "shade_v6.onnx"
        ort_lib = "libonnxruntime.so"
        classes = "classes.txt"
    "#;

    #[test]
    fn parses_with_defaults() {
        let config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.store.region, "us-east-1");
        assert_eq!(config.local.staging_path, PathBuf::from("datasets_temp"));
        assert_eq!(config.train.command, "yolo");
        assert_eq!(config.tracking.experiment, "omr");
        assert_eq!(config.tracking.run_name, "testing");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.model.target_label, "shade");
        assert_eq!(config.manifest_path(), PathBuf::from("datasets/data.yaml"));
    }

    #[test]
    fn model_section_converts() {
        let config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        let model = config.model.to_model_config().unwrap();
        assert!(matches!(model.device_type, DeviceType::CPU));
        assert_eq!(model.conf_threshold, 0.5);
        assert_eq!(model.width, 640);
    }

    #[test]
    fn bad_device_is_rejected() {
        let mut config: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        config.model.device = "tpu".to_string();
        assert!(config.model.to_model_config().is_err());
    }

    #[test]
    fn missing_required_section_fails() {
        assert!(toml::from_str::<PipelineConfig>("[store]\nendpoint = \"x\"").is_err());
    }
}

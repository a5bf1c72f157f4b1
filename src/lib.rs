pub mod config;
pub mod data;
pub mod detection_runners;
pub mod ingest;
pub mod object_store;
pub mod pipeline;
pub mod predict;
pub mod server;
pub mod split;
pub mod track;
pub mod train;
mod utils;

use std::time::Instant;
use image::DynamicImage;
use crate::data::{ModelConfig, OmrDetection};
use crate::detection_runners::OrtYolo;

pub use crate::config::PipelineConfig;
pub use crate::predict::{decide, DetectError, Predictor};

pub fn init_detector(model_details: &ModelConfig) -> anyhow::Result<OrtYolo> {
    tracing::info!(
        "Initializing ORT session with ({}) execution provider",
        model_details.device_type.as_str()
    );
    OrtYolo::new(model_details)
}

pub fn run_detection(
    yolo: &mut OrtYolo,
    image: &DynamicImage,
) -> anyhow::Result<Vec<OmrDetection>> {
    let now = Instant::now();

    let detections = yolo.detect(image)?;

    tracing::debug!("Processing time: {:?}", now.elapsed());

    Ok(detections)
}

use anyhow::Context;
use image::DynamicImage;
use ort::{
    inputs, CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
    GraphOptimizationLevel, Session, SessionOutputs, TensorRTExecutionProvider,
};
use crate::data::{DeviceType, ModelConfig, OmrDetection};
use crate::detection_runners::processing;
use crate::utils;

/// ONNX Runtime session wrapped with the model's class list and input
/// geometry. Single image in, scaled detections out.
pub struct OrtYolo {
    session: Session,
    classes: Vec<String>,
    input_name: String,
    output_name: String,
    conf_threshold: f32,
    width: u32,
    height: u32,
}

impl OrtYolo {
    pub fn new(model_details: &ModelConfig) -> anyhow::Result<Self> {
        // Dynamically load the runtime library from the configured path
        ort::init_from(&model_details.ort_lib_path)
            .commit()
            .context("failed to commit ONNX Runtime environment")?;

        let execution_provider: ExecutionProviderDispatch = match model_details.device_type {
            DeviceType::CPU => CPUExecutionProvider::default().build(),
            DeviceType::CUDA(device_id) => CUDAExecutionProvider::default()
                .with_device_id(device_id as i32)
                .build(),
            DeviceType::TensorRT(device_id) => TensorRTExecutionProvider::default()
                .with_device_id(device_id as i32)
                .build(),
        };

        let classes = utils::file_to_vec(&model_details.classes_path)
            .with_context(|| format!("failed to read classes list {}", model_details.classes_path))?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([execution_provider])?
            .commit_from_file(&model_details.weights_path)?;

        let input_name = session
            .inputs
            .first()
            .context("model has no inputs")?
            .name
            .clone();
        let output_name = session
            .outputs
            .first()
            .context("model has no outputs")?
            .name
            .clone();

        Ok(Self {
            session,
            classes,
            input_name,
            output_name,
            conf_threshold: model_details.conf_threshold,
            width: model_details.width,
            height: model_details.height,
        })
    }

    pub fn detect(&mut self, image: &DynamicImage) -> anyhow::Result<Vec<OmrDetection>> {
        let (img_width, img_height, input) =
            processing::process_image(image, self.width, self.height);

        let outputs: SessionOutputs = self
            .session
            .run(inputs![self.input_name.as_str() => input.view()]?)?;

        let output = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()?
            .t()
            .into_owned();

        Ok(processing::process_predictions(
            &output,
            &self.classes,
            self.conf_threshold,
            self.width as f32,
            self.height as f32,
            img_width as f32,
            img_height as f32,
        ))
    }
}

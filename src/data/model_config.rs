use crate::data::DeviceType;

/// Everything the detector needs to build a session and interpret its
/// output. Constructed once from the `[model]` config section and passed
/// by reference.
#[derive(Default, Debug, Clone)]
pub struct ModelConfig {
    pub weights_path: String,
    pub ort_lib_path: String,
    pub classes_path: String,
    pub device_type: DeviceType,
    pub conf_threshold: f32,
    pub width: u32,
    pub height: u32,
    pub target_label: String,
    pub font_path: Option<String>,
}

impl ModelConfig {
    pub fn summary(&self) -> String {
        format!(
            "Weights File Path: {}\n\
            Classes Path: {}\n\
            OnnxRuntime Lib Path: {}\n\
            Device Type (execution provider): {:?}\n\
            Model Input Resolution: {}x{}\n\
            Detection Threshold: {}\n\
            Target Label: {}",
            self.weights_path,
            self.classes_path,
            self.ort_lib_path,
            self.device_type,
            self.width,
            self.height,
            self.conf_threshold,
            self.target_label
        )
    }
}

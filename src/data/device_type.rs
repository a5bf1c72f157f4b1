#[derive(Debug, Default, Clone, Copy)]
pub enum DeviceType {
    #[default]
    CPU,
    CUDA(usize),
    TensorRT(usize),
}

impl DeviceType {
    pub fn from_str(device: &str, device_id: usize) -> Option<Self> {
        match device.to_lowercase().as_str() {
            "cpu" => Some(DeviceType::CPU),
            "cuda" => Some(DeviceType::CUDA(device_id)),
            "tensorrt" => Some(DeviceType::TensorRT(device_id)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::CPU => "CPU",
            DeviceType::CUDA(_) => "CUDA",
            DeviceType::TensorRT(_) => "TensorRT",
        }
    }
}

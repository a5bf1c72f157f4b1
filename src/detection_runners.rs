mod ort_detector;
pub mod processing;

pub use ort_detector::OrtYolo;

use std::fs;
use std::io::Cursor;
use ab_glyph::{FontVec, PxScale};
use anyhow::Context;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use crate::data::{ModelConfig, OmrDetection};
use crate::detection_runners::OrtYolo;

/// Inference failures collapse into exactly three kinds: the two sentinel
/// conditions pass through unchanged, everything else becomes the generic
/// detection error. Callers never see the underlying cause's message; it is
/// kept only as the error source.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("OMRB_NOT_FOUND:OMR bubble not found")]
    BubbleNotFound,
    #[error("DPLICATE_OMR:Duplicate OMR found")]
    DuplicateBubble,
    #[error("OMR_ERR: OMR Error")]
    Detection(anyhow::Error),
}

impl DetectError {
    pub fn from_inference(err: anyhow::Error) -> Self {
        match err.downcast::<DetectError>() {
            Ok(sentinel) => sentinel,
            Err(other) => DetectError::Detection(other),
        }
    }
}

/// Binary "target class present" decision over one inference result.
///
/// `None` on zero detections (no detection, not an error). Otherwise the
/// single globally highest-confidence box decides: `Some(1)` iff its label
/// equals the target, `Some(0)` otherwise. Strictly-greater comparison, so
/// ties keep the first-seen box. Confidences of competing non-target boxes
/// are irrelevant once a stronger box is seen.
pub fn decide(detections: &[OmrDetection], target_label: &str) -> Option<u8> {
    let first = detections.first()?;
    let mut best = first;
    for detection in &detections[1..] {
        if detection.confidence > best.confidence {
            best = detection;
        }
    }
    tracing::debug!(
        "Final class_id: {} Probability: {}",
        best.get_label(),
        best.confidence
    );
    Some(u8::from(best.get_label() == target_label))
}

/// The annotated image plus the decision for one request.
pub struct Prediction {
    pub flag: Option<u8>,
    pub detections: Vec<OmrDetection>,
    pub image_jpeg: Vec<u8>,
}

/// Owns the detector session and renders annotated responses.
pub struct Predictor {
    yolo: OrtYolo,
    target_label: String,
    font: Option<FontVec>,
}

impl Predictor {
    pub fn new(model_details: &ModelConfig) -> anyhow::Result<Self> {
        let yolo = OrtYolo::new(model_details)?;
        let font = match &model_details.font_path {
            Some(path) => {
                let bytes =
                    fs::read(path).with_context(|| format!("failed to read font {path}"))?;
                Some(FontVec::try_from_vec(bytes).context("failed to parse annotation font")?)
            }
            None => None,
        };
        Ok(Self {
            yolo,
            target_label: model_details.target_label.clone(),
            font,
        })
    }

    pub fn predict(&mut self, image_bytes: &[u8]) -> Result<Prediction, DetectError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|err| DetectError::Detection(err.into()))?;

        let detections = self
            .yolo
            .detect(&image)
            .map_err(DetectError::from_inference)?;

        for detection in &detections {
            tracing::debug!(
                "class_id: {} probability: {}",
                detection.get_label(),
                detection.confidence
            );
        }
        let flag = decide(&detections, &self.target_label);

        let annotated = self.annotate(&image, &detections);
        let mut image_jpeg = Vec::new();
        DynamicImage::ImageRgb8(annotated)
            .write_to(&mut Cursor::new(&mut image_jpeg), ImageFormat::Jpeg)
            .map_err(|err| DetectError::Detection(err.into()))?;

        Ok(Prediction {
            flag,
            detections,
            image_jpeg,
        })
    }

    fn annotate(&self, image: &DynamicImage, detections: &[OmrDetection]) -> RgbImage {
        let mut img = image.to_rgb8();

        for detection in detections {
            let (x, y, w, h) = detection.bbox.as_xy_wh_i32();
            if w <= 0 || h <= 0 {
                continue;
            }
            let colour = self.detection_colour(detection);
            let rect = Rect::at(x, y).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, colour);

            if let Some(font) = &self.font {
                let height = 20.;
                let scale = PxScale {
                    x: height * 2.0,
                    y: height,
                };
                draw_text_mut(
                    &mut img,
                    colour,
                    x,
                    y,
                    scale,
                    font,
                    detection.get_label().as_str(),
                );
            }
        }

        img
    }

    fn detection_colour(&self, detection: &OmrDetection) -> Rgb<u8> {
        if detection.get_label() == self.target_label {
            Rgb([0, 255, 0])
        } else {
            Rgb([255, 0, 0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OmrBox;

    fn det(label: &str, confidence: f32) -> OmrDetection {
        OmrDetection::new(0, Some(label.to_string()), confidence, OmrBox::default())
    }

    #[test]
    fn zero_detections_is_absent_not_an_error() {
        assert_eq!(decide(&[], "shade"), None);
    }

    #[test]
    fn non_target_with_highest_confidence_wins() {
        let detections = vec![det("shade", 0.4), det("other", 0.9)];
        assert_eq!(decide(&detections, "shade"), Some(0));
    }

    #[test]
    fn target_with_highest_confidence_wins() {
        let detections = vec![det("shade", 0.9), det("other", 0.4)];
        assert_eq!(decide(&detections, "shade"), Some(1));
    }

    #[test]
    fn ties_keep_the_first_seen_box() {
        let detections = vec![det("shade", 0.7), det("other", 0.7)];
        assert_eq!(decide(&detections, "shade"), Some(1));

        let reversed = vec![det("other", 0.7), det("shade", 0.7)];
        assert_eq!(decide(&reversed, "shade"), Some(0));
    }

    #[test]
    fn later_weak_target_does_not_override() {
        let detections = vec![det("other", 0.9), det("shade", 0.8), det("shade", 0.85)];
        assert_eq!(decide(&detections, "shade"), Some(0));
    }

    #[test]
    fn sentinel_errors_pass_through_unchanged() {
        let err = DetectError::from_inference(anyhow::Error::new(DetectError::BubbleNotFound));
        assert!(matches!(err, DetectError::BubbleNotFound));
        assert_eq!(err.to_string(), "OMRB_NOT_FOUND:OMR bubble not found");

        let err = DetectError::from_inference(anyhow::Error::new(DetectError::DuplicateBubble));
        assert!(matches!(err, DetectError::DuplicateBubble));
        assert_eq!(err.to_string(), "DPLICATE_OMR:Duplicate OMR found");
    }

    #[test]
    fn everything_else_collapses_to_the_generic_error() {
        let err = DetectError::from_inference(anyhow::anyhow!("session exploded"));
        assert!(matches!(err, DetectError::Detection(_)));
        // The cause never leaks into the display text.
        assert_eq!(err.to_string(), "OMR_ERR: OMR Error");
    }
}

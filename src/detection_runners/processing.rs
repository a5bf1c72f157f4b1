use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::{Array, Ix4, IxDyn};
use crate::data::{OmrBox, OmrDetection};

const IOU_THRESHOLD: f32 = 0.7;

/// Resizes the image to the model input resolution and lays it out as a
/// normalized NCHW tensor.
pub fn process_image(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> (u32, u32, Array<f32, Ix4>) {
    let (img_width, img_height) = (image.width(), image.height());

    let mut resizer = fast_image_resize::Resizer::new();
    let options = fast_image_resize::ResizeOptions {
        algorithm: fast_image_resize::ResizeAlg::Convolution(
            fast_image_resize::FilterType::Bilinear,
        ),
        ..Default::default()
    };

    let mut new_image = DynamicImage::new(width, height, image.color());
    if let Err(err) = resizer.resize(image, &mut new_image, &options) {
        tracing::warn!(?err, "Failed to use `fast_image_resize`. Falling back.");
        new_image = image.resize_exact(width, height, FilterType::Nearest);
    }

    let rgb = new_image.to_rgb8();
    let mut input: Array<f32, Ix4> = Array::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        input[[0, 0, y as usize, x as usize]] = (r as f32) / 255.;
        input[[0, 1, y as usize, x as usize]] = (g as f32) / 255.;
        input[[0, 2, y as usize, x as usize]] = (b as f32) / 255.;
    }

    (img_width, img_height, input)
}

/// Decodes the transposed model output (one row per candidate box:
/// `[cx, cy, w, h, class scores...]`), keeps rows above the confidence
/// threshold, scales boxes back to source-image pixels, and suppresses
/// overlapping boxes.
pub fn process_predictions(
    output: &Array<f32, IxDyn>,
    classes_list: &[String],
    conf_threshold: f32,
    width_f32: f32,
    height_f32: f32,
    img_width: f32,
    img_height: f32,
) -> Vec<OmrDetection> {
    let shape = output.shape();
    if shape.len() < 2 {
        return Vec::new();
    }
    let (rows, cols) = (shape[0], shape[1]);
    if cols <= 4 {
        return Vec::new();
    }
    let reshaped = match output.to_shape((rows, cols)) {
        Ok(reshaped) => reshaped,
        Err(err) => {
            tracing::error!("Failed to reshape model output {shape:?}: {err}");
            return Vec::new();
        }
    };

    let mut boxes: Vec<(OmrBox, usize, f32)> = Vec::new();
    for detection in reshaped.outer_iter() {
        let (class_id, prob) = detection
            .iter()
            .skip(4)
            .enumerate()
            .fold((0usize, 0f32), |best, (idx, &score)| {
                if score > best.1 {
                    (idx, score)
                } else {
                    best
                }
            });

        if prob < conf_threshold {
            continue;
        }

        let xc = detection[0] / width_f32 * img_width;
        let yc = detection[1] / height_f32 * img_height;
        let w = detection[2] / width_f32 * img_width;
        let h = detection[3] / height_f32 * img_height;

        boxes.push((
            OmrBox::with_x1y1_x2y2(xc - w / 2.0, yc - h / 2.0, xc + w / 2.0, yc + h / 2.0),
            class_id,
            prob,
        ));
    }

    non_max_suppression(boxes, IOU_THRESHOLD)
        .into_iter()
        .map(|(bbox, class_id, confidence)| {
            let label = classes_list.get(class_id).cloned();
            OmrDetection::new(class_id, label, confidence, bbox)
        })
        .collect()
}

fn non_max_suppression(
    mut boxes: Vec<(OmrBox, usize, f32)>,
    iou_threshold: f32,
) -> Vec<(OmrBox, usize, f32)> {
    boxes.sort_by(|box1, box2| box2.2.total_cmp(&box1.2));

    let mut kept: Vec<(OmrBox, usize, f32)> = Vec::new();
    while !boxes.is_empty() {
        let current = boxes.remove(0);
        boxes.retain(|candidate| current.0.iou(&candidate.0) < iou_threshold);
        kept.push(current);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_from_rows(rows: &[[f32; 6]]) -> Array<f32, IxDyn> {
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array::from_shape_vec(IxDyn(&[rows.len(), 6]), flat).unwrap()
    }

    fn classes() -> Vec<String> {
        vec!["shade".to_string(), "blank".to_string()]
    }

    #[test]
    fn empty_output_yields_no_detections() {
        let output = output_from_rows(&[]);
        let detections =
            process_predictions(&output, &classes(), 0.5, 640.0, 640.0, 640.0, 640.0);
        assert!(detections.is_empty());
    }

    #[test]
    fn low_confidence_rows_are_dropped() {
        let output = output_from_rows(&[[320.0, 320.0, 100.0, 100.0, 0.2, 0.1]]);
        let detections =
            process_predictions(&output, &classes(), 0.5, 640.0, 640.0, 640.0, 640.0);
        assert!(detections.is_empty());
    }

    #[test]
    fn picks_best_class_and_scales_boxes() {
        // Model space is 640x640, source image 1280x1280: boxes scale 2x.
        let output = output_from_rows(&[[320.0, 320.0, 100.0, 100.0, 0.1, 0.9]]);
        let detections =
            process_predictions(&output, &classes(), 0.5, 640.0, 640.0, 1280.0, 1280.0);

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 1);
        assert_eq!(det.get_label(), "blank");
        assert_eq!(det.confidence, 0.9);
        assert_eq!(det.bbox.x1, 540);
        assert_eq!(det.bbox.x2, 740);
    }

    #[test]
    fn overlapping_boxes_are_suppressed() {
        let output = output_from_rows(&[
            [320.0, 320.0, 100.0, 100.0, 0.9, 0.0],
            [322.0, 322.0, 100.0, 100.0, 0.8, 0.0],
            [100.0, 100.0, 50.0, 50.0, 0.7, 0.0],
        ]);
        let detections =
            process_predictions(&output, &classes(), 0.5, 640.0, 640.0, 640.0, 640.0);

        // The two near-identical boxes collapse into the stronger one.
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence, 0.9);
        assert_eq!(detections[1].confidence, 0.7);
    }

    #[test]
    fn unknown_class_id_keeps_detection_without_label() {
        let output = output_from_rows(&[[320.0, 320.0, 100.0, 100.0, 0.0, 0.9]]);
        let only_one_class = vec!["shade".to_string()];
        let detections =
            process_predictions(&output, &only_one_class, 0.5, 640.0, 640.0, 640.0, 640.0);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, None);
        assert_eq!(detections[0].get_label(), "Unknown");
    }
}

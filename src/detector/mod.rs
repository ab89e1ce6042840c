//! Batch detection pipeline.
//!
//! For every image: decode the boxes once, transpose the scores into
//! per-class lists, suppress each non-background class, cap the pooled
//! survivors, and emit rows grouped by class. Images are independent and
//! only share the validated anchor set, so with the `rayon` feature each one
//! runs on its own worker and owns a disjoint block of the output buffer.

use crate::candidate::nms::{nms_boxes, SuppressParams};
use crate::candidate::topk::{select_top_k, ClassSurvivors};
use crate::decode::AnchorSet;
use crate::extract::{ClassScores, MultiboxInput};
use crate::geometry::BBox;
use crate::output::{Detection, OutputLayout, RowWriter, DETECTION_COLUMNS};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{MultiboxError, MultiboxResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

mod config;

pub use config::DetectorConfig;

/// Per-image outcome of [`MultiboxDetector::detect_into`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageReport {
    /// Rows written to the output block.
    pub detections: usize,
    /// Detections that did not fit in `out_height` rows.
    pub clipped: usize,
    /// Classes skipped because their score list could not be found.
    pub missing_classes: Vec<usize>,
}

/// Decoding and selection stage of a multibox (SSD-style) detector.
#[derive(Clone, Debug, Default)]
pub struct MultiboxDetector {
    cfg: DetectorConfig,
}

impl MultiboxDetector {
    /// Creates a detector with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, cfg: DetectorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Runs the pipeline and returns each image's detections in output order.
    pub fn detect(&self, input: &MultiboxInput<'_>) -> MultiboxResult<Vec<Vec<Detection>>> {
        self.cfg.validate()?;
        let _span = trace_span!("multibox_detect", batch = input.batch_size()).entered();
        let anchors = input.anchors()?;

        let run = |image: usize| -> MultiboxResult<Vec<Detection>> {
            let mut detections = Vec::new();
            self.detect_image(input, &anchors, image, |det| detections.push(*det))?;
            Ok(detections)
        };

        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return (0..input.batch_size()).into_par_iter().map(run).collect();
        }

        (0..input.batch_size()).map(run).collect()
    }

    /// Runs the pipeline and writes rows into a caller-initialized buffer.
    ///
    /// `output` must hold `batch_size * out_height * 6` values and
    /// `out_width` must be 6. Only detection rows are written.
    pub fn detect_into(
        &self,
        input: &MultiboxInput<'_>,
        output: &mut [f32],
        out_height: usize,
        out_width: usize,
    ) -> MultiboxResult<Vec<ImageReport>> {
        self.cfg.validate()?;
        if out_width != DETECTION_COLUMNS {
            return Err(MultiboxError::InvalidOutputWidth { got: out_width });
        }
        let block_len = out_height
            .checked_mul(DETECTION_COLUMNS)
            .ok_or(MultiboxError::InvalidInput("out_height overflows"))?;
        let expected = block_len
            .checked_mul(input.batch_size())
            .ok_or(MultiboxError::InvalidInput("output size overflows"))?;
        if output.len() != expected {
            return Err(MultiboxError::ShapeMismatch {
                context: "output",
                expected,
                got: output.len(),
            });
        }
        if input.batch_size() == 0 {
            return Ok(Vec::new());
        }

        let _span = trace_span!("multibox_detect", batch = input.batch_size()).entered();
        let anchors = input.anchors()?;
        if block_len == 0 {
            return self.count_only(input, &anchors);
        }
        let layout = self.cfg.layout;

        let run = |(image, block): (usize, &mut [f32])| -> MultiboxResult<ImageReport> {
            let mut writer = RowWriter::new(block, out_height, layout)?;
            let missing_classes = self.detect_image(input, &anchors, image, |det| writer.push(det))?;
            trace_event!("rows_written", image = image, rows = writer.count());
            Ok(ImageReport {
                detections: writer.count(),
                clipped: writer.clipped(),
                missing_classes,
            })
        };

        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return output
                .par_chunks_mut(block_len)
                .enumerate()
                .map(run)
                .collect();
        }

        output.chunks_mut(block_len).enumerate().map(run).collect()
    }

    /// Zero-row output: every detection is clipped.
    fn count_only(
        &self,
        input: &MultiboxInput<'_>,
        anchors: &AnchorSet,
    ) -> MultiboxResult<Vec<ImageReport>> {
        (0..input.batch_size())
            .map(|image| -> MultiboxResult<ImageReport> {
                let mut clipped = 0usize;
                let missing_classes = self.detect_image(input, anchors, image, |_| clipped += 1)?;
                if clipped > 0 {
                    trace_warn!("output_rows_exhausted", image = image, clipped = clipped);
                }
                Ok(ImageReport {
                    detections: 0,
                    clipped,
                    missing_classes,
                })
            })
            .collect()
    }

    /// Runs one image and hands every final detection to `emit` in output
    /// order. Returns the classes skipped as anomalies.
    fn detect_image<F>(
        &self,
        input: &MultiboxInput<'_>,
        anchors: &AnchorSet,
        image: usize,
        mut emit: F,
    ) -> MultiboxResult<Vec<usize>>
    where
        F: FnMut(&Detection),
    {
        let _span = trace_span!("multibox_image", image = image).entered();
        let locations = input
            .locations(image)
            .ok_or(MultiboxError::InvalidInput("image index out of range"))?;
        let confidences = input
            .confidences(image)
            .ok_or(MultiboxError::InvalidInput("image index out of range"))?;

        let boxes = anchors.decode_all(locations)?;
        let scores =
            ClassScores::from_anchor_major(confidences, input.num_priors(), input.num_classes())?;

        let (survivors, mut missing) = self.suppress_classes(&boxes, &scores)?;
        trace_event!(
            "pooled_survivors",
            image = image,
            count = survivors.iter().map(|s| s.anchors.len()).sum::<usize>()
        );

        let selection = select_top_k(survivors, &scores, self.cfg.keep_top_k);
        missing.extend(selection.missing_classes);

        missing.extend(emit_selected(&selection.kept, &scores, &boxes, &mut emit));

        missing.sort_unstable();
        missing.dedup();
        Ok(missing)
    }

    /// Suppresses every non-background class. Also returns the classes whose
    /// score list could not be found.
    fn suppress_classes(
        &self,
        boxes: &[BBox],
        scores: &ClassScores,
    ) -> MultiboxResult<(Vec<ClassSurvivors>, Vec<usize>)> {
        let params = SuppressParams {
            conf_thresh: self.cfg.conf_thresh,
            nms_thresh: self.cfg.nms_thresh,
            nms_top_k: self.cfg.nms_top_k,
        };
        let suppress = |class_index: usize| -> MultiboxResult<Result<ClassSurvivors, usize>> {
            let Some(class_scores) = scores.class(class_index) else {
                trace_warn!("missing_class_scores", class = class_index);
                return Ok(Err(class_index));
            };
            let anchors = nms_boxes(boxes, class_scores, &params)?;
            trace_event!("class_survivors", class = class_index, count = anchors.len());
            Ok(Ok(ClassSurvivors {
                class_index,
                anchors,
            }))
        };

        let classes = (0..scores.num_classes()).filter(|&c| !self.cfg.is_background(c));

        #[cfg(feature = "rayon")]
        let per_class: Vec<Result<ClassSurvivors, usize>> = if self.cfg.parallel {
            classes
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(suppress)
                .collect::<MultiboxResult<_>>()?
        } else {
            classes.map(suppress).collect::<MultiboxResult<_>>()?
        };
        #[cfg(not(feature = "rayon"))]
        let per_class: Vec<Result<ClassSurvivors, usize>> =
            classes.map(suppress).collect::<MultiboxResult<_>>()?;

        let mut survivors = Vec::with_capacity(per_class.len());
        let mut missing = Vec::new();
        for entry in per_class {
            match entry {
                Ok(class) => survivors.push(class),
                Err(class_index) => missing.push(class_index),
            }
        }
        Ok((survivors, missing))
    }
}

/// Emits the kept survivors in output order: ascending class, then
/// within-class order. Returns classes skipped because their scores are absent.
fn emit_selected<F>(
    kept: &[ClassSurvivors],
    scores: &ClassScores,
    boxes: &[BBox],
    emit: &mut F,
) -> Vec<usize>
where
    F: FnMut(&Detection),
{
    let mut missing = Vec::new();
    for class in kept {
        let Some(class_scores) = scores.class(class.class_index) else {
            trace_warn!("missing_class_scores", class = class.class_index);
            missing.push(class.class_index);
            continue;
        };
        for &anchor in &class.anchors {
            let (Some(&score), Some(&bbox)) = (class_scores.get(anchor), boxes.get(anchor)) else {
                trace_warn!("anchor_out_of_range", class = class.class_index, anchor = anchor);
                continue;
            };
            emit(&Detection {
                class_index: class.class_index,
                score,
                bbox,
                anchor_index: anchor,
            });
        }
    }
    missing
}

/// Flat entry point over raw buffers with integer parameter conventions.
///
/// Negative `nms_top_k`/`keep_top_k` disable the respective cap;
/// `background_label` is one-based and values below 1 match no class. Rows are
/// written column-major per image (see [`OutputLayout::ColumnMajor`]).
#[allow(clippy::too_many_arguments)]
pub fn detect(
    output: &mut [f32],
    locations: &[f32],
    confidences: &[f32],
    priors: &[f32],
    nms_top_k: i32,
    keep_top_k: i32,
    num_classes: usize,
    nms_thresh: f32,
    conf_thresh: f32,
    background_label: i32,
    out_height: usize,
    out_width: usize,
    batch_size: usize,
    num_priors: usize,
) -> MultiboxResult<Vec<ImageReport>> {
    let input = MultiboxInput::new(
        locations,
        confidences,
        priors,
        batch_size,
        num_priors,
        num_classes,
    )?;
    let cfg = DetectorConfig {
        layout: OutputLayout::ColumnMajor,
        ..DetectorConfig::from_raw(nms_top_k, keep_top_k, nms_thresh, conf_thresh, background_label)
    };
    MultiboxDetector::new()
        .with_config(cfg)
        .detect_into(&input, output, out_height, out_width)
}

#[cfg(test)]
mod tests {
    use super::{emit_selected, DetectorConfig, MultiboxDetector};
    use crate::candidate::topk::ClassSurvivors;
    use crate::extract::{ClassScores, MultiboxInput};
    use crate::geometry::BBox;
    use crate::output::Detection;

    const PRIORS: [f32; 16] = [
        0.0, 0.0, 10.0, 10.0, //
        20.0, 20.0, 30.0, 30.0, //
        1.0, 1.0, 1.0, 1.0, //
        1.0, 1.0, 1.0, 1.0,
    ];

    fn cfg() -> DetectorConfig {
        DetectorConfig {
            nms_top_k: Some(10),
            keep_top_k: Some(10),
            nms_thresh: 0.5,
            conf_thresh: 0.5,
            background_label: Some(1),
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn background_class_is_skipped() {
        let locations = [0.0f32; 8];
        // background scores high everywhere
        let confidences = [0.99, 0.6, 0.99, 0.2];
        let input = MultiboxInput::new(&locations, &confidences, &PRIORS, 1, 2, 2).unwrap();
        let dets = MultiboxDetector::new().with_config(cfg()).detect(&input).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].len(), 1);
        assert_eq!(dets[0][0].label(), 2);
        assert_eq!(dets[0][0].anchor_index, 0);
        assert_eq!(dets[0][0].bbox, BBox::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn rows_are_grouped_by_class() {
        let locations = [0.0f32; 8];
        // class 2 has the best score but class 1 rows come first
        let confidences = [0.0, 0.6, 0.7, 0.0, 0.8, 0.95];
        let input = MultiboxInput::new(&locations, &confidences, &PRIORS, 1, 2, 3).unwrap();
        let dets = MultiboxDetector::new().with_config(cfg()).detect(&input).unwrap();
        let order: Vec<(usize, usize)> = dets[0]
            .iter()
            .map(|d| (d.class_index, d.anchor_index))
            .collect();
        assert_eq!(order, vec![(1, 1), (1, 0), (2, 1), (2, 0)]);
    }

    #[test]
    fn detect_into_leaves_padding_untouched() {
        let locations = [0.0f32; 8];
        let confidences = [0.0, 0.9, 0.0, 0.1];
        let input = MultiboxInput::new(&locations, &confidences, &PRIORS, 1, 2, 2).unwrap();
        let mut output = vec![-7.0f32; 3 * 6];
        let reports = MultiboxDetector::new()
            .with_config(cfg())
            .detect_into(&input, &mut output, 3, 6)
            .unwrap();
        assert_eq!(reports[0].detections, 1);
        assert_eq!(reports[0].clipped, 0);
        assert!(reports[0].missing_classes.is_empty());
        // column-major: row 0 of each column, rows 1..3 untouched
        assert_eq!(output[0], 2.0);
        assert_eq!(output[3], 0.9);
        assert_eq!(output[1], -7.0);
        assert_eq!(output[4], -7.0);
    }

    #[test]
    fn emit_skips_out_of_range_anchors_and_unknown_classes() {
        let boxes = [BBox::new(0.0, 0.0, 1.0, 1.0), BBox::new(2.0, 2.0, 3.0, 3.0)];
        let scores = ClassScores::from_anchor_major(&[0.1, 0.9, 0.2, 0.8], 2, 2).unwrap();
        let kept = vec![
            ClassSurvivors {
                class_index: 1,
                anchors: vec![0, 5, 1],
            },
            ClassSurvivors {
                class_index: 4,
                anchors: vec![0],
            },
        ];
        let mut emitted = Vec::new();
        let missing = emit_selected(&kept, &scores, &boxes, &mut |det: &Detection| emitted.push(*det));
        assert_eq!(missing, vec![4]);
        let order: Vec<(usize, usize)> = emitted
            .iter()
            .map(|d| (d.class_index, d.anchor_index))
            .collect();
        assert_eq!(order, vec![(1, 0), (1, 1)]);
        assert_eq!(emitted[1].score, 0.8);
    }

    #[test]
    fn zero_height_output_matches_full_run_counts() {
        let locations = [0.0f32; 16];
        let confidences = [0.0, 0.9, 0.7, 0.0, 0.6, 0.8, 0.0, 0.2, 0.1, 0.0, 0.95, 0.99];
        let input = MultiboxInput::new(&locations, &confidences, &PRIORS, 2, 2, 3).unwrap();
        let detector = MultiboxDetector::new().with_config(cfg());

        let mut full = vec![0.0f32; 2 * 4 * 6];
        let full_reports = detector.detect_into(&input, &mut full, 4, 6).unwrap();
        let empty_reports = detector.detect_into(&input, &mut [], 0, 6).unwrap();

        assert_eq!(empty_reports.len(), 2);
        for (empty, full) in empty_reports.iter().zip(full_reports.iter()) {
            assert_eq!(empty.detections, 0);
            assert_eq!(empty.clipped, full.detections);
            assert_eq!(empty.missing_classes, full.missing_classes);
        }
        assert_eq!(empty_reports[0].clipped, 4);
        assert_eq!(empty_reports[1].clipped, 2);
    }
}

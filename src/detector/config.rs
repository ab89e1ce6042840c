//! Detector configuration.

use crate::output::OutputLayout;
use crate::util::{MultiboxError, MultiboxResult};

/// Configuration for [`MultiboxDetector`](crate::MultiboxDetector).
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    /// Per-class cap applied before NMS (`None` keeps every candidate).
    pub nms_top_k: Option<usize>,
    /// Per-image cap across all classes (`None` keeps every survivor).
    pub keep_top_k: Option<usize>,
    /// Overlaps above this value suppress the lower-scoring box.
    pub nms_thresh: f32,
    /// Candidates must score strictly above this value.
    pub conf_thresh: f32,
    /// One-based label of the background class, if any.
    pub background_label: Option<usize>,
    /// Run images and classes on rayon workers (requires the `rayon` feature).
    pub parallel: bool,
    /// Memory order of the output blocks written by `detect_into`.
    pub layout: OutputLayout,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            nms_top_k: Some(400),
            keep_top_k: Some(200),
            nms_thresh: 0.45,
            conf_thresh: 0.01,
            background_label: Some(1),
            parallel: false,
            layout: OutputLayout::ColumnMajor,
        }
    }
}

impl DetectorConfig {
    /// Builds a config from the integer conventions of flat callers.
    ///
    /// Negative top-K values mean "no cap"; a `background_label` below 1
    /// matches no class.
    pub fn from_raw(
        nms_top_k: i32,
        keep_top_k: i32,
        nms_thresh: f32,
        conf_thresh: f32,
        background_label: i32,
    ) -> Self {
        Self {
            nms_top_k: usize::try_from(nms_top_k).ok(),
            keep_top_k: usize::try_from(keep_top_k).ok(),
            nms_thresh,
            conf_thresh,
            background_label: usize::try_from(background_label).ok().filter(|&l| l > 0),
            ..Self::default()
        }
    }

    /// Returns true if the zero-based `class_index` is the background class.
    pub fn is_background(&self, class_index: usize) -> bool {
        self.background_label == Some(class_index + 1)
    }

    /// Rejects thresholds that would make every comparison false.
    pub fn validate(&self) -> MultiboxResult<()> {
        if self.nms_thresh.is_nan() {
            return Err(MultiboxError::InvalidInput("nms_thresh must not be NaN"));
        }
        if self.conf_thresh.is_nan() {
            return Err(MultiboxError::InvalidInput("conf_thresh must not be NaN"));
        }
        Ok(())
    }
}

//! Multibox is the decoding and selection stage of a single-shot multi-box
//! (SSD-style) object detector.
//!
//! Given raw per-anchor location offsets, per-class confidences, and a packed
//! set of anchor boxes with variances, it decodes boxes, filters by
//! confidence, runs greedy per-class NMS, caps detections per image, and
//! writes fixed-shape `[label, score, xmin, ymin, xmax, ymax]` rows. Optional
//! parallelism over images and classes is available via the `rayon` feature.

mod candidate;
pub mod decode;
pub mod detector;
pub mod extract;
pub mod geometry;
pub mod lowlevel;
pub mod output;
mod trace;
pub mod util;

pub use decode::{Anchor, AnchorSet, Variance};
pub use detector::{detect, DetectorConfig, ImageReport, MultiboxDetector};
pub use extract::MultiboxInput;
pub use geometry::BBox;
pub use output::{Detection, OutputLayout, DETECTION_COLUMNS};
pub use util::{MultiboxError, MultiboxResult};

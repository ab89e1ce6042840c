//! Low-level building blocks for custom post-processing pipelines.
//!
//! These expose the individual stages behind [`MultiboxDetector`](crate::MultiboxDetector):
//! geometry, decoding, score extraction, suppression, and top-K selection.
//! Most users should prefer the top-level detector API.

pub use crate::candidate::nms::{max_score_indices, nms_boxes, ScoredIndex, SuppressParams};
pub use crate::candidate::topk::{select_top_k, ClassSurvivors, TopKSelection};
pub use crate::decode::decode_box;
pub use crate::extract::ClassScores;
pub use crate::geometry::{area, intersect, overlap};
pub use crate::output::RowWriter;

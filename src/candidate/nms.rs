//! Per-class confidence filtering, pre-ranking, and greedy NMS.

use std::cmp::Ordering;

use crate::geometry::{overlap, BBox};
use crate::util::{MultiboxError, MultiboxResult};

/// Score paired with the anchor index it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredIndex {
    /// Class confidence.
    pub score: f32,
    /// Index into the anchor set.
    pub index: usize,
}

/// Thresholds and truncation for one class's suppression pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuppressParams {
    /// Candidates must score strictly above this value.
    pub conf_thresh: f32,
    /// A candidate is rejected if its IoU with any kept box exceeds this value.
    pub nms_thresh: f32,
    /// Keep at most this many candidates before NMS (`None` keeps all).
    pub nms_top_k: Option<usize>,
}

/// Sorts by descending score; ties (including `0.0` vs `-0.0`) keep their input order.
///
/// Callers only pass scores that survived a strict `>` filter, so none are NaN.
pub(crate) fn sort_desc_stable(items: &mut [ScoredIndex]) {
    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Keeps scores strictly above `conf_thresh`, ranked best-first and truncated to `top_k`.
pub fn max_score_indices(scores: &[f32], conf_thresh: f32, top_k: Option<usize>) -> Vec<ScoredIndex> {
    let mut pairs: Vec<ScoredIndex> = scores
        .iter()
        .enumerate()
        .filter(|(_, &score)| score > conf_thresh)
        .map(|(index, &score)| ScoredIndex { score, index })
        .collect();

    sort_desc_stable(&mut pairs);
    if let Some(k) = top_k {
        pairs.truncate(k);
    }
    pairs
}

/// Greedy non-maximum suppression over one class.
///
/// Candidates are visited best-first; each is kept only if its overlap with
/// every previously kept box is at most `nms_thresh`. The returned anchor
/// indices are in descending score order.
pub fn nms_boxes(
    boxes: &[BBox],
    scores: &[f32],
    params: &SuppressParams,
) -> MultiboxResult<Vec<usize>> {
    if boxes.len() != scores.len() {
        return Err(MultiboxError::ShapeMismatch {
            context: "class scores",
            expected: boxes.len(),
            got: scores.len(),
        });
    }

    let candidates = max_score_indices(scores, params.conf_thresh, params.nms_top_k);
    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let bbox = &boxes[candidate.index];
        let keep = kept
            .iter()
            .all(|&kept_idx| overlap(bbox, &boxes[kept_idx]) <= params.nms_thresh);
        if keep {
            kept.push(candidate.index);
        }
    }

    Ok(kept)
}

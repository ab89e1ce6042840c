//! Per-image cap on detections pooled across classes.

use crate::candidate::nms::{sort_desc_stable, ScoredIndex};
use crate::extract::ClassScores;
use crate::trace::trace_warn;

/// Anchor indices that survived suppression for one class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassSurvivors {
    /// Zero-based class index.
    pub class_index: usize,
    /// Surviving anchor indices, best score first.
    pub anchors: Vec<usize>,
}

/// Result of the per-image top-K selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TopKSelection {
    /// Survivors grouped by class in ascending class order.
    pub kept: Vec<ClassSurvivors>,
    /// Classes dropped because their score list could not be found.
    pub missing_classes: Vec<usize>,
}

impl TopKSelection {
    /// Total number of kept detections.
    pub fn len(&self) -> usize {
        self.kept.iter().map(|c| c.anchors.len()).sum()
    }

    /// Returns true if no detection was kept.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caps the pooled survivors of one image at `keep_top_k`.
///
/// When the pooled count fits (or `keep_top_k` is `None`) the input is
/// returned as-is. Otherwise all survivors are ranked by score, ties keeping
/// pool order, truncated, and regrouped by class in ascending order.
pub fn select_top_k(
    mut survivors: Vec<ClassSurvivors>,
    scores: &ClassScores,
    keep_top_k: Option<usize>,
) -> TopKSelection {
    survivors.sort_by_key(|s| s.class_index);
    let pooled: usize = survivors.iter().map(|s| s.anchors.len()).sum();
    let limit = match keep_top_k {
        Some(k) if pooled > k => k,
        _ => {
            return TopKSelection {
                kept: survivors,
                missing_classes: Vec::new(),
            }
        }
    };

    // `index` here addresses the flat pool; `owners` maps it back to (slot, anchor).
    let mut missing_classes = Vec::new();
    let mut owners: Vec<(usize, usize)> = Vec::with_capacity(pooled);
    let mut ranked: Vec<ScoredIndex> = Vec::with_capacity(pooled);
    for (slot, class) in survivors.iter().enumerate() {
        let Some(class_scores) = scores.class(class.class_index) else {
            trace_warn!("missing_class_scores", class = class.class_index);
            missing_classes.push(class.class_index);
            continue;
        };
        for &anchor in &class.anchors {
            let Some(&score) = class_scores.get(anchor) else {
                trace_warn!("anchor_out_of_range", class = class.class_index, anchor = anchor);
                continue;
            };
            ranked.push(ScoredIndex {
                score,
                index: owners.len(),
            });
            owners.push((slot, anchor));
        }
    }

    sort_desc_stable(&mut ranked);
    ranked.truncate(limit);

    let mut regrouped: Vec<Vec<usize>> = vec![Vec::new(); survivors.len()];
    for item in &ranked {
        let (slot, anchor) = owners[item.index];
        regrouped[slot].push(anchor);
    }

    let kept = survivors
        .iter()
        .zip(regrouped)
        .filter(|(_, anchors)| !anchors.is_empty())
        .map(|(class, anchors)| ClassSurvivors {
            class_index: class.class_index,
            anchors,
        })
        .collect();

    TopKSelection {
        kept,
        missing_classes,
    }
}

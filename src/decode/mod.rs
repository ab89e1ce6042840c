//! Anchor ingestion and SSD-style box decoding.
//!
//! The anchor buffer is packed as `2 * num_priors` rows of four values: the
//! first `num_priors` rows are anchor boxes, the next `num_priors` rows are the
//! per-anchor variances. The set is validated once and shared read-only by
//! every image in a batch.
//!
//! Offsets reuse the box fields: `xmin`/`ymin` carry center deltas and
//! `xmax`/`ymax` carry log-scale size deltas.

use crate::geometry::BBox;
use crate::util::{MultiboxError, MultiboxResult};

/// Values per box or variance row.
pub const BOX_DIM: usize = 4;

/// Per-anchor scale factors applied to the raw offsets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Variance(pub [f32; 4]);

impl Default for Variance {
    fn default() -> Self {
        Self([1.0; 4])
    }
}

/// Anchor box paired with its variance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    /// Reference box.
    pub bbox: BBox,
    /// Decoding scale factors.
    pub variance: Variance,
}

fn check_anchor(index: usize, bbox: &BBox) -> MultiboxResult<()> {
    let width = bbox.width();
    let height = bbox.height();
    // Written so that NaN extents are rejected as well.
    if !(width > 0.0 && width.is_finite() && height > 0.0 && height.is_finite()) {
        return Err(MultiboxError::DegenerateAnchor {
            index,
            width,
            height,
        });
    }
    Ok(())
}

/// Decodes one raw offset against an anchor.
///
/// Fails with [`MultiboxError::DegenerateAnchor`] (index 0) if the anchor has
/// a non-positive width or height.
pub fn decode_box(anchor: &BBox, variance: &Variance, offset: &BBox) -> MultiboxResult<BBox> {
    check_anchor(0, anchor)?;
    Ok(decode_unchecked(anchor, variance, offset))
}

fn decode_unchecked(anchor: &BBox, variance: &Variance, offset: &BBox) -> BBox {
    let [v0, v1, v2, v3] = variance.0;
    let prior_w = anchor.width();
    let prior_h = anchor.height();
    let (prior_cx, prior_cy) = anchor.center();

    let cx = v0 * offset.xmin * prior_w + prior_cx;
    let cy = v1 * offset.ymin * prior_h + prior_cy;
    let w = (v2 * offset.xmax).exp() * prior_w;
    let h = (v3 * offset.ymax).exp() * prior_h;
    BBox::from_center(cx, cy, w, h)
}

/// Validated, ordered set of anchors shared across a batch.
#[derive(Clone, Debug)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    /// Builds a set from already paired anchors, validating every box.
    pub fn new(anchors: Vec<Anchor>) -> MultiboxResult<Self> {
        for (index, anchor) in anchors.iter().enumerate() {
            check_anchor(index, &anchor.bbox)?;
        }
        Ok(Self { anchors })
    }

    /// Parses the packed `[2 * num_priors][4]` buffer (boxes, then variances).
    pub fn from_packed(priors: &[f32], num_priors: usize) -> MultiboxResult<Self> {
        let expected = num_priors
            .checked_mul(2 * BOX_DIM)
            .ok_or(MultiboxError::InvalidInput("num_priors overflows"))?;
        if priors.len() != expected {
            return Err(MultiboxError::ShapeMismatch {
                context: "priors",
                expected,
                got: priors.len(),
            });
        }

        let (boxes, variances) = priors.split_at(num_priors * BOX_DIM);
        let anchors = boxes
            .chunks_exact(BOX_DIM)
            .zip(variances.chunks_exact(BOX_DIM))
            .map(|(b, v)| Anchor {
                bbox: BBox::from_slice(b),
                variance: Variance([v[0], v[1], v[2], v[3]]),
            })
            .collect();
        Self::new(anchors)
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Returns true if the set holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Returns the anchor at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Anchor> {
        self.anchors.get(index)
    }

    /// Borrows all anchors in order.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Decodes one image's flat `[num_priors][4]` offsets into absolute boxes.
    pub fn decode_all(&self, offsets: &[f32]) -> MultiboxResult<Vec<BBox>> {
        let expected = self.anchors.len() * BOX_DIM;
        if offsets.len() != expected {
            return Err(MultiboxError::ShapeMismatch {
                context: "locations",
                expected,
                got: offsets.len(),
            });
        }
        Ok(self
            .anchors
            .iter()
            .zip(offsets.chunks_exact(BOX_DIM))
            .map(|(anchor, raw)| {
                decode_unchecked(&anchor.bbox, &anchor.variance, &BBox::from_slice(raw))
            })
            .collect())
    }
}

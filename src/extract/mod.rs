//! Borrowed batch input and per-image extraction.
//!
//! `MultiboxInput` is a read-only view over the three caller buffers with
//! declared shapes. Lengths are checked once, up front, with overflow-safe
//! arithmetic; per-image slices are then zero-copy.
//!
//! Confidences are anchor-major: the score for anchor `p`, class `c` sits at
//! offset `p * num_classes + c` within an image. `ClassScores` transposes that
//! into one contiguous score list per class.

use crate::decode::{AnchorSet, BOX_DIM};
use crate::util::{MultiboxError, MultiboxResult};

/// Borrowed view over one batch of raw detector outputs.
#[derive(Clone, Copy, Debug)]
pub struct MultiboxInput<'a> {
    locations: &'a [f32],
    confidences: &'a [f32],
    priors: &'a [f32],
    batch_size: usize,
    num_priors: usize,
    num_classes: usize,
}

impl<'a> MultiboxInput<'a> {
    /// Creates a view after validating every buffer against the declared shape.
    ///
    /// Expected lengths: `locations = batch_size * num_priors * 4`,
    /// `confidences = batch_size * num_priors * num_classes`,
    /// `priors = 2 * num_priors * 4`. A zero `batch_size` is allowed and
    /// produces no detections.
    pub fn new(
        locations: &'a [f32],
        confidences: &'a [f32],
        priors: &'a [f32],
        batch_size: usize,
        num_priors: usize,
        num_classes: usize,
    ) -> MultiboxResult<Self> {
        let dims_err = MultiboxError::InvalidDimensions {
            batch_size,
            num_priors,
            num_classes,
        };
        if num_priors == 0 || num_classes == 0 {
            return Err(dims_err);
        }

        let per_image_loc = num_priors
            .checked_mul(BOX_DIM)
            .ok_or_else(|| dims_err.clone())?;
        let per_image_conf = num_priors
            .checked_mul(num_classes)
            .ok_or_else(|| dims_err.clone())?;
        let loc_len = per_image_loc
            .checked_mul(batch_size)
            .ok_or_else(|| dims_err.clone())?;
        let conf_len = per_image_conf
            .checked_mul(batch_size)
            .ok_or_else(|| dims_err.clone())?;
        let prior_len = per_image_loc.checked_mul(2).ok_or(dims_err)?;

        check_len("locations", loc_len, locations.len())?;
        check_len("confidences", conf_len, confidences.len())?;
        check_len("priors", prior_len, priors.len())?;

        Ok(Self {
            locations,
            confidences,
            priors,
            batch_size,
            num_priors,
            num_classes,
        })
    }

    /// Number of images in the batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of anchors per image.
    pub fn num_priors(&self) -> usize {
        self.num_priors
    }

    /// Number of confidence classes, background included.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Parses and validates the packed anchor buffer.
    pub fn anchors(&self) -> MultiboxResult<AnchorSet> {
        AnchorSet::from_packed(self.priors, self.num_priors)
    }

    /// Raw `[num_priors][4]` offsets for `image`.
    pub fn locations(&self, image: usize) -> Option<&'a [f32]> {
        let stride = self.num_priors * BOX_DIM;
        image_slice(self.locations, image, stride, self.batch_size)
    }

    /// Raw `[num_priors][num_classes]` scores for `image`.
    pub fn confidences(&self, image: usize) -> Option<&'a [f32]> {
        let stride = self.num_priors * self.num_classes;
        image_slice(self.confidences, image, stride, self.batch_size)
    }
}

fn check_len(context: &'static str, expected: usize, got: usize) -> MultiboxResult<()> {
    if expected != got {
        return Err(MultiboxError::ShapeMismatch {
            context,
            expected,
            got,
        });
    }
    Ok(())
}

fn image_slice(data: &[f32], image: usize, stride: usize, batch_size: usize) -> Option<&[f32]> {
    if image >= batch_size {
        return None;
    }
    let start = image.checked_mul(stride)?;
    data.get(start..start.checked_add(stride)?)
}

/// Class-major score table for one image.
#[derive(Clone, Debug)]
pub struct ClassScores {
    num_priors: usize,
    num_classes: usize,
    scores: Vec<f32>,
}

impl ClassScores {
    /// Transposes one image's anchor-major confidences into per-class lists.
    pub fn from_anchor_major(
        confidences: &[f32],
        num_priors: usize,
        num_classes: usize,
    ) -> MultiboxResult<Self> {
        if num_classes == 0 {
            return Err(MultiboxError::InvalidInput("num_classes must be positive"));
        }
        let expected = num_priors
            .checked_mul(num_classes)
            .ok_or(MultiboxError::InvalidInput("score table overflows"))?;
        check_len("confidences", expected, confidences.len())?;

        let mut scores = vec![0.0f32; expected];
        for (p, row) in confidences.chunks_exact(num_classes).enumerate() {
            for (c, &score) in row.iter().enumerate() {
                scores[c * num_priors + p] = score;
            }
        }
        Ok(Self {
            num_priors,
            num_classes,
            scores,
        })
    }

    /// Number of classes in the table.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Scores for `class` indexed by anchor, or `None` if the class is absent.
    pub fn class(&self, class: usize) -> Option<&[f32]> {
        if class >= self.num_classes {
            return None;
        }
        let start = class * self.num_priors;
        self.scores.get(start..start + self.num_priors)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassScores, MultiboxInput};
    use crate::util::MultiboxError;

    #[test]
    fn class_scores_transpose_anchor_major_rows() {
        // 3 anchors x 2 classes
        let conf = [0.1, 0.9, 0.2, 0.8, 0.3, 0.7];
        let table = ClassScores::from_anchor_major(&conf, 3, 2).unwrap();
        assert_eq!(table.class(0).unwrap(), &[0.1, 0.2, 0.3]);
        assert_eq!(table.class(1).unwrap(), &[0.9, 0.8, 0.7]);
        assert!(table.class(2).is_none());
    }

    #[test]
    fn input_slices_images_without_copying() {
        let locations: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let confidences: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let priors = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let input = MultiboxInput::new(&locations, &confidences, &priors, 2, 2, 2).unwrap();
        assert_eq!(input.locations(1).unwrap(), &locations[8..16]);
        assert_eq!(input.confidences(1).unwrap(), &confidences[4..8]);
        assert!(input.locations(2).is_none());
    }

    #[test]
    fn input_rejects_mismatched_confidences() {
        let err = MultiboxInput::new(&[0.0; 4], &[0.0; 3], &[1.0; 8], 1, 1, 2)
            .err()
            .unwrap();
        assert_eq!(
            err,
            MultiboxError::ShapeMismatch {
                context: "confidences",
                expected: 2,
                got: 3,
            }
        );
    }
}

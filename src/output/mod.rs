//! Detection records and the fixed-shape output buffer.
//!
//! Each image owns a block of `out_height * 6` values. A detection row holds
//! `[label, score, xmin, ymin, xmax, ymax]`, where `label` is the zero-based
//! class index plus one. Rows past the last detection are never written, so
//! they keep whatever the caller initialized them to.

use crate::geometry::BBox;
use crate::trace::trace_warn;
use crate::util::{MultiboxError, MultiboxResult};

/// Number of columns in a detection row.
pub const DETECTION_COLUMNS: usize = 6;

/// Memory order of the per-image `out_height x 6` block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputLayout {
    /// Each column is a contiguous run of `out_height` values:
    /// `index = c * out_height + r`.
    #[default]
    ColumnMajor,
    /// Each row is a contiguous run of six values: `index = r * 6 + c`.
    RowMajor,
}

impl OutputLayout {
    /// Offset of `(row, col)` inside one image block.
    #[inline]
    pub fn offset(self, out_height: usize, row: usize, col: usize) -> usize {
        match self {
            OutputLayout::ColumnMajor => col * out_height + row,
            OutputLayout::RowMajor => row * DETECTION_COLUMNS + col,
        }
    }
}

/// One final detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    /// Zero-based class index into the confidence columns.
    pub class_index: usize,
    /// Class confidence.
    pub score: f32,
    /// Decoded box.
    pub bbox: BBox,
    /// Anchor the box was decoded from.
    pub anchor_index: usize,
}

impl Detection {
    /// One-based label written to the output; 0 is reserved.
    pub fn label(&self) -> usize {
        self.class_index + 1
    }

    /// The detection as an output row.
    pub fn to_row(&self) -> [f32; DETECTION_COLUMNS] {
        [
            self.label() as f32,
            self.score,
            self.bbox.xmin,
            self.bbox.ymin,
            self.bbox.xmax,
            self.bbox.ymax,
        ]
    }
}

/// Writes detection rows into one image's output block.
pub struct RowWriter<'a> {
    block: &'a mut [f32],
    out_height: usize,
    layout: OutputLayout,
    count: usize,
    clipped: usize,
}

impl<'a> RowWriter<'a> {
    /// Wraps an image block of at least `out_height * 6` values.
    ///
    /// A shorter block is rejected: `out_height` is the column stride, so it
    /// cannot be shrunk to fit.
    pub fn new(
        block: &'a mut [f32],
        out_height: usize,
        layout: OutputLayout,
    ) -> MultiboxResult<Self> {
        let needed = out_height
            .checked_mul(DETECTION_COLUMNS)
            .ok_or(MultiboxError::InvalidInput("out_height overflows"))?;
        if block.len() < needed {
            return Err(MultiboxError::ShapeMismatch {
                context: "output block",
                expected: needed,
                got: block.len(),
            });
        }
        Ok(Self {
            block,
            out_height,
            layout,
            count: 0,
            clipped: 0,
        })
    }

    /// Appends a row, or counts it as clipped once the block is full.
    pub fn push(&mut self, detection: &Detection) {
        if self.count >= self.out_height {
            if self.clipped == 0 {
                trace_warn!("output_rows_exhausted", out_height = self.out_height);
            }
            self.clipped += 1;
            return;
        }
        let row = detection.to_row();
        for (col, value) in row.into_iter().enumerate() {
            let idx = self.layout.offset(self.out_height, self.count, col);
            self.block[idx] = value;
        }
        self.count += 1;
    }

    /// Rows written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Rows that did not fit.
    pub fn clipped(&self) -> usize {
        self.clipped
    }
}

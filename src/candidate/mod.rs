//! Candidate selection and pruning.
//!
//! Per-class confidence filtering and greedy suppression live in `nms`; the
//! per-image cap across classes lives in `topk`.

pub(crate) mod nms;
pub(crate) mod topk;

use multibox::{
    detect, AnchorSet, BBox, DetectorConfig, MultiboxDetector, MultiboxError, MultiboxInput,
    OutputLayout,
};

const PRIORS_1: [f32; 8] = [0.0, 0.0, 10.0, 10.0, 0.1, 0.1, 0.2, 0.2];

#[test]
fn input_rejects_zero_priors_or_classes() {
    let err = MultiboxInput::new(&[], &[], &[], 1, 0, 2).err().unwrap();
    assert_eq!(
        err,
        MultiboxError::InvalidDimensions {
            batch_size: 1,
            num_priors: 0,
            num_classes: 2,
        }
    );

    let err = MultiboxInput::new(&[0.0; 4], &[], &PRIORS_1, 1, 1, 0)
        .err()
        .unwrap();
    assert!(matches!(err, MultiboxError::InvalidDimensions { .. }));
}

#[test]
fn input_rejects_mismatched_locations_and_priors() {
    let err = MultiboxInput::new(&[0.0; 5], &[0.0; 2], &PRIORS_1, 1, 1, 2)
        .err()
        .unwrap();
    assert_eq!(
        err,
        MultiboxError::ShapeMismatch {
            context: "locations",
            expected: 4,
            got: 5,
        }
    );

    let err = MultiboxInput::new(&[0.0; 4], &[0.0; 2], &PRIORS_1[..4], 1, 1, 2)
        .err()
        .unwrap();
    assert_eq!(
        err,
        MultiboxError::ShapeMismatch {
            context: "priors",
            expected: 8,
            got: 4,
        }
    );
}

#[test]
fn input_rejects_overflowing_shapes() {
    let err = MultiboxInput::new(&[], &[], &[], usize::MAX, 2, 2)
        .err()
        .unwrap();
    assert!(matches!(err, MultiboxError::InvalidDimensions { .. }));
}

#[test]
fn empty_batch_produces_no_reports() {
    let input = MultiboxInput::new(&[], &[], &PRIORS_1, 0, 1, 2).unwrap();
    let detector = MultiboxDetector::new();
    assert!(detector.detect(&input).unwrap().is_empty());
    assert!(detector.detect_into(&input, &mut [], 4, 6).unwrap().is_empty());
}

#[test]
fn zero_width_anchor_is_rejected_before_decoding() {
    let priors = [5.0, 0.0, 5.0, 10.0, 1.0, 1.0, 1.0, 1.0];
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &priors, 1, 1, 2).unwrap();
    let err = MultiboxDetector::new().detect(&input).err().unwrap();
    assert_eq!(
        err,
        MultiboxError::DegenerateAnchor {
            index: 0,
            width: 0.0,
            height: 10.0,
        }
    );

    let mut output = [0.0f32; 6];
    let err = detect(
        &mut output,
        &[0.0; 4],
        &[0.1, 0.9],
        &priors,
        10,
        10,
        2,
        0.5,
        0.5,
        1,
        1,
        6,
        1,
        1,
    )
    .err()
    .unwrap();
    assert!(matches!(err, MultiboxError::DegenerateAnchor { index: 0, .. }));
    assert_eq!(output, [0.0; 6]);
}

#[test]
fn nan_anchor_is_rejected() {
    let priors = [0.0, 0.0, f32::NAN, 10.0, 1.0, 1.0, 1.0, 1.0];
    let err = AnchorSet::from_packed(&priors, 1).err().unwrap();
    assert!(matches!(err, MultiboxError::DegenerateAnchor { index: 0, .. }));
}

#[test]
fn detect_into_validates_output_shape() {
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &PRIORS_1, 1, 1, 2).unwrap();
    let detector = MultiboxDetector::new();

    let mut output = vec![0.0f32; 12];
    let err = detector.detect_into(&input, &mut output, 2, 5).err().unwrap();
    assert_eq!(err, MultiboxError::InvalidOutputWidth { got: 5 });

    let err = detector.detect_into(&input, &mut output, 3, 6).err().unwrap();
    assert_eq!(
        err,
        MultiboxError::ShapeMismatch {
            context: "output",
            expected: 18,
            got: 12,
        }
    );
}

#[test]
fn zero_height_output_reports_everything_as_clipped() {
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &PRIORS_1, 1, 1, 2).unwrap();
    let reports = MultiboxDetector::new()
        .detect_into(&input, &mut [], 0, 6)
        .unwrap();
    assert_eq!(reports[0].detections, 0);
    assert_eq!(reports[0].clipped, 1);
}

#[test]
fn row_major_layout_writes_contiguous_rows() {
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &PRIORS_1, 1, 1, 2).unwrap();
    let detector = MultiboxDetector::new().with_config(DetectorConfig {
        layout: OutputLayout::RowMajor,
        ..DetectorConfig::default()
    });
    let mut output = vec![0.0f32; 12];
    let reports = detector.detect_into(&input, &mut output, 2, 6).unwrap();
    assert_eq!(reports[0].detections, 1);
    assert_eq!(&output[0..6], &[2.0, 0.9, 0.0, 0.0, 10.0, 10.0]);
    assert_eq!(&output[6..12], &[0.0; 6]);
}

#[test]
fn typed_detections_match_flat_rows() {
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &PRIORS_1, 1, 1, 2).unwrap();
    let dets = MultiboxDetector::new().detect(&input).unwrap();
    assert_eq!(dets[0].len(), 1);
    let det = dets[0][0];
    assert_eq!(det.label(), 2);
    assert_eq!(det.bbox, BBox::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(det.to_row(), [2.0, 0.9, 0.0, 0.0, 10.0, 10.0]);
}

#[test]
fn nan_threshold_is_rejected() {
    let input = MultiboxInput::new(&[0.0; 4], &[0.1, 0.9], &PRIORS_1, 1, 1, 2).unwrap();
    let detector = MultiboxDetector::new().with_config(DetectorConfig {
        nms_thresh: f32::NAN,
        ..DetectorConfig::default()
    });
    assert!(matches!(
        detector.detect(&input),
        Err(MultiboxError::InvalidInput(_))
    ));
}

//! Point-to-box matching of the GT boxes.

use crate::{
    common::*,
    dataset::{AnnotationId, Annotation, BoxAnnotation, Dataset, LabelId, PointAnnotation},
    error::{ValidationError, ValidationResult},
    utils::format_sequence,
    validation::DiscardLog,
};

/// GT box id to point id. Strictly one-to-one.
pub type BboxPointMapping = BTreeMap<AnnotationId, AnnotationId>;

/// Checks whether `(px, py)` lies in the box. Borders are inclusive.
pub fn point_in_box(px: f64, py: f64, bbox: &XYWH<f64>) -> bool {
    bbox.contains_point(&Point::new(px, py))
}

/// The outcome of [`match_boxes_to_points`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// `(box id, point id)` pairs in box order.
    pub matches: Vec<(AnnotationId, AnnotationId)>,
    /// Boxes without any candidate point.
    pub unmatched: Vec<AnnotationId>,
    /// Boxes with several candidate points.
    pub ambiguous: Vec<AnnotationId>,
}

/// Matches every box to the single point of the same label it contains.
///
/// Boxes are visited in input order. A matched point is consumed and is no candidate
/// for the following boxes. A box with several candidates is discarded and consumes
/// nothing.
pub fn match_boxes_to_points(boxes: &[BoxAnnotation], points: &[PointAnnotation]) -> MatchOutcome {
    let mut available = vec![true; points.len()];
    let mut outcome = MatchOutcome::default();

    for bbox in boxes {
        let candidates: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|&(index, point)| {
                available[index]
                    && point.label_id() == bbox.label_id()
                    && point_in_box(point.shape().x, point.shape().y, bbox.shape())
            })
            .map(|(index, _)| index)
            .collect();

        match candidates.as_slice() {
            [] => outcome.unmatched.push(bbox.id),
            &[index] => {
                available[index] = false;
                outcome.matches.push((bbox.id, points[index].id));
            }
            _ => outcome.ambiguous.push(bbox.id),
        }
    }

    outcome
}

/// The GT boxes that survived matching.
#[derive(Debug, Clone)]
pub struct MatchedGt {
    /// GT samples restricted to matched boxes. Samples without matches are dropped.
    pub dataset: Dataset,
    pub mapping: BboxPointMapping,
    /// Matched box counts per label id.
    pub class_counts: IndexMap<LabelId, usize>,
    pub log: DiscardLog,
}

/// Matches the GT boxes of every sample to the points of the sample with the same
/// identity and keeps only the matched boxes.
///
/// A sample with any box outside the image loses all of its boxes. The run fails with
/// [`ValidationError::InsufficientGroundTruth`] when fewer than
/// `(1 - max_discard_fraction) * total_boxes` boxes are matched, decided after all
/// samples are scanned.
///
/// `validation_log` holds the boxes dropped from `gt` before matching. They count as
/// discarded, so `total_boxes` is the number of input GT boxes.
pub fn prepare_gt(
    gt: &Dataset,
    points: &Dataset,
    validation_log: &DiscardLog,
    max_discard_fraction: f64,
    max_items: usize,
) -> ValidationResult<MatchedGt> {
    let labels = gt.labels();
    let mut matched_gt = gt.empty_like();
    let mut mapping = BboxPointMapping::new();
    let mut class_counts = IndexMap::new();
    let mut log = validation_log.excluded_only();

    for gt_sample in gt {
        let boxes: Vec<_> = gt_sample.boxes().cloned().collect();
        if boxes.is_empty() {
            continue;
        }
        log.total_count += boxes.len();

        let points_sample = points.get(&gt_sample.id, &gt_sample.subset);
        let image_size = gt_sample
            .image
            .size
            .or_else(|| points_sample.and_then(|sample| sample.image.size))
            .ok_or_else(|| {
                ValidationError::InvalidImageInfo(format!(
                    "Sample '{}': image size is unknown",
                    gt_sample.id
                ))
            })?;
        let frame = HW::from_hw([image_size.h() as f64, image_size.w() as f64]);

        if let Some(outside) = boxes.iter().find(|bbox| !bbox.shape().is_within(&frame)) {
            log.add(
                gt_sample.key(),
                format!(
                    "Sample '{}': all {} GT boxes skipped - bbox #{} ({}) has coordinates outside the image",
                    gt_sample.id,
                    boxes.len(),
                    outside.id,
                    labels.name_of(outside.label_id())
                ),
            );
            log.excluded_count += boxes.len();
            continue;
        }

        let sample_points: Vec<_> = points_sample
            .into_iter()
            .flat_map(|sample| sample.skeletons())
            .filter_map(|skeleton| skeleton.as_point())
            .collect();

        let outcome = match_boxes_to_points(&boxes, &sample_points);
        let label_of = |box_id: AnnotationId| {
            boxes
                .iter()
                .find(|bbox| bbox.id == box_id)
                .map(|bbox| labels.name_of(bbox.label_id()))
                .unwrap_or_default()
        };

        for &box_id in &outcome.unmatched {
            log.add(
                gt_sample.key(),
                format!(
                    "Sample '{}': GT bbox #{} ({}) skipped - no matching points found",
                    gt_sample.id,
                    box_id,
                    label_of(box_id)
                ),
            );
        }
        for &box_id in &outcome.ambiguous {
            log.add(
                gt_sample.key(),
                format!(
                    "Sample '{}': GT bbox #{} ({}) skipped - too many matching points found",
                    gt_sample.id,
                    box_id,
                    label_of(box_id)
                ),
            );
        }
        log.excluded_count += outcome.unmatched.len() + outcome.ambiguous.len();

        let matched_boxes: Vec<_> = outcome
            .matches
            .iter()
            .filter_map(|&(box_id, point_id)| {
                let bbox = boxes.iter().find(|bbox| bbox.id == box_id)?;
                mapping.insert(box_id, point_id);
                *class_counts.entry(bbox.label_id()).or_insert(0) += 1;
                Some(Annotation::Bbox(bbox.clone()))
            })
            .collect();

        if !matched_boxes.is_empty() {
            matched_gt.put(gt_sample.wrap(matched_boxes));
        }
    }

    log.log("Some GT boxes", max_items);

    let total_boxes = log.total_count;
    if (mapping.len() as f64) < (1.0 - max_discard_fraction) * total_boxes as f64 {
        return Err(ValidationError::InsufficientGroundTruth(format!(
            "too many GT boxes discarded ({} out of {}). \
             Please make sure each GT box matches exactly 1 point. Errors: {}",
            total_boxes - mapping.len(),
            total_boxes,
            log.summary(max_items, "; ")
        )));
    }

    info!(
        "GT counts per class to be used for validation: {}",
        format_sequence(
            class_counts
                .iter()
                .map(|(&label_id, count)| format!("{}: {}", labels.name_of(label_id), count)),
            max_items,
            ", "
        )
    );

    let labels_without_gt: Vec<_> = labels
        .top_level()
        .filter(|(label_id, _)| !class_counts.contains_key(label_id))
        .map(|(_, label)| label.name.as_str())
        .collect();
    if !labels_without_gt.is_empty() {
        warn!(
            "No matching GT boxes/points annotations found for some classes: {}",
            format_sequence(labels_without_gt, max_items, ", ")
        );
    }

    Ok(MatchedGt {
        dataset: matched_gt,
        mapping,
        class_counts,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dataset::{DatasetCategories, ImageInfo, Sample, SkeletonAnnotation},
        error::ErrorKind,
        validation::validate_gt_annotations,
    };

    fn bbox(id: u64, xywh: [f64; 4], label: usize) -> BoxAnnotation {
        BoxAnnotation::new(id, XYWH::from_xywh(xywh), label)
    }

    fn point(id: u64, x: f64, y: f64, label: usize) -> PointAnnotation {
        PointAnnotation::new(id, Point::new(x, y), label)
    }

    #[test]
    fn point_on_box_edge() {
        let rect = XYWH::from_xywh([10.0, 10.0, 20.0, 20.0]);
        assert!(point_in_box(10.0, 30.0, &rect));
        assert!(!point_in_box(9.99, 15.0, &rect));
    }

    #[test]
    fn label_mismatch_leaves_box_unmatched() {
        let boxes = [
            bbox(1, [10.0, 10.0, 20.0, 20.0], 0),
            bbox(2, [50.0, 50.0, 10.0, 10.0], 0),
            bbox(3, [100.0, 100.0, 5.0, 5.0], 0),
        ];
        let points = [
            point(11, 15.0, 15.0, 0),
            point(12, 55.0, 55.0, 1),
            point(13, 102.0, 102.0, 0),
        ];

        let outcome = match_boxes_to_points(&boxes, &points);
        assert_eq!(outcome.matches, vec![(1, 11), (3, 13)]);
        assert_eq!(outcome.unmatched, vec![2]);
        assert!(outcome.ambiguous.is_empty());
    }

    #[test]
    fn ambiguous_box_is_discarded() {
        let boxes = [bbox(1, [0.0, 0.0, 50.0, 50.0], 0)];
        let points = [point(11, 5.0, 5.0, 0), point(12, 40.0, 40.0, 0)];

        let outcome = match_boxes_to_points(&boxes, &points);
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.ambiguous, vec![1]);
    }

    #[test]
    fn consumed_point_is_not_reused() {
        let boxes = [
            bbox(1, [0.0, 0.0, 20.0, 20.0], 0),
            bbox(2, [5.0, 5.0, 20.0, 20.0], 0),
        ];
        let points = [point(11, 10.0, 10.0, 0)];

        let outcome = match_boxes_to_points(&boxes, &points);
        assert_eq!(outcome.matches, vec![(1, 11)]);
        assert_eq!(outcome.unmatched, vec![2]);
    }

    #[test]
    fn matching_is_one_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let boxes: Vec<_> = (0..10)
                .map(|id| {
                    let x = rng.gen_range(0.0..80.0);
                    let y = rng.gen_range(0.0..80.0);
                    let w = rng.gen_range(1.0..30.0);
                    let h = rng.gen_range(1.0..30.0);
                    bbox(id, [x, y, w, h], rng.gen_range(0..2))
                })
                .collect();
            let points: Vec<_> = (100..115)
                .map(|id| {
                    point(
                        id,
                        rng.gen_range(0.0..100.0),
                        rng.gen_range(0.0..100.0),
                        rng.gen_range(0..2),
                    )
                })
                .collect();

            let outcome = match_boxes_to_points(&boxes, &points);
            let box_ids: HashSet<_> = outcome.matches.iter().map(|&(b, _)| b).collect();
            let point_ids: HashSet<_> = outcome.matches.iter().map(|&(_, p)| p).collect();
            assert_eq!(box_ids.len(), outcome.matches.len());
            assert_eq!(point_ids.len(), outcome.matches.len());
            assert_eq!(
                outcome.matches.len() + outcome.unmatched.len() + outcome.ambiguous.len(),
                boxes.len()
            );
        }
    }

    fn dataset(samples: Vec<(&str, Vec<Annotation>)>) -> Dataset {
        let categories = DatasetCategories {
            labels: LabelCategories::from_names(["cat", "dog"]).unwrap(),
            points: Default::default(),
        };
        let mut dataset = Dataset::new(categories);
        for (id, annotations) in samples {
            dataset.put(Sample {
                id: id.into(),
                subset: "default".into(),
                image: ImageInfo {
                    path: format!("{}.jpg", id),
                    size: Some(ImageSize::from_hw([200, 200])),
                },
                original_key: 0,
                annotations,
            });
        }
        dataset
    }

    fn skeleton(id: u64, x: f64, y: f64, label: usize) -> Annotation {
        Annotation::Skeleton(SkeletonAnnotation::new(id, vec![Point::new(x, y)], label))
    }

    fn example_datasets() -> (Dataset, Dataset) {
        let gt = dataset(vec![(
            "a",
            vec![
                Annotation::Bbox(bbox(1, [10.0, 10.0, 20.0, 20.0], 0)),
                Annotation::Bbox(bbox(2, [50.0, 50.0, 10.0, 10.0], 0)),
                Annotation::Bbox(bbox(3, [100.0, 100.0, 5.0, 5.0], 0)),
            ],
        )]);
        let points = dataset(vec![(
            "a",
            vec![
                skeleton(11, 15.0, 15.0, 0),
                skeleton(12, 55.0, 55.0, 1),
                skeleton(13, 102.0, 102.0, 0),
            ],
        )]);
        (gt, points)
    }

    #[test]
    fn discard_threshold_is_checked_after_matching() {
        let (gt, points) = example_datasets();

        let matched = prepare_gt(&gt, &points, &DiscardLog::default(), 0.5, 5).unwrap();
        assert_eq!(matched.mapping.len(), 2);
        assert_eq!(matched.mapping[&1], 11);
        assert_eq!(matched.mapping[&3], 13);
        assert_eq!((matched.log.excluded_count, matched.log.total_count), (1, 3));
        assert_eq!(matched.class_counts.get(&0), Some(&2));
        assert_eq!(
            matched.dataset.get("a", "default").unwrap().annotations.len(),
            2
        );

        let err = prepare_gt(&gt, &points, &DiscardLog::default(), 0.2, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientGroundTruth);
    }

    #[test]
    fn out_of_image_box_discards_sample() {
        let gt = dataset(vec![
            (
                "a",
                vec![
                    Annotation::Bbox(bbox(1, [10.0, 10.0, 20.0, 20.0], 0)),
                    Annotation::Bbox(bbox(2, [190.0, 10.0, 20.0, 20.0], 0)),
                ],
            ),
            ("b", vec![Annotation::Bbox(bbox(3, [10.0, 10.0, 20.0, 20.0], 1))]),
            ("c", vec![]),
        ]);
        let points = dataset(vec![
            ("a", vec![skeleton(11, 15.0, 15.0, 0)]),
            ("b", vec![skeleton(13, 15.0, 15.0, 1)]),
        ]);

        let matched = prepare_gt(&gt, &points, &DiscardLog::default(), 0.7, 5).unwrap();
        assert_eq!(matched.mapping.len(), 1);
        assert_eq!(matched.log.excluded_count, 2);
        assert!(matched.dataset.get("a", "default").is_none());
        assert!(matched.dataset.get("b", "default").is_some());
    }

    #[test]
    fn boxes_dropped_by_validation_count_as_discarded() {
        let mut gt = dataset(vec![
            (
                "a",
                vec![
                    Annotation::Bbox(bbox(1, [10.0, 10.0, 20.0, 20.0], 0)),
                    Annotation::Bbox(bbox(2, [50.0, 50.0, 10.0, 10.0], 0)),
                ],
            ),
            (
                "b",
                vec![
                    Annotation::Bbox(bbox(1, [10.0, 10.0, 20.0, 20.0], 0)),
                    Annotation::Bbox(bbox(2, [50.0, 50.0, 10.0, 10.0], 0)),
                ],
            ),
        ]);
        let points = dataset(vec![("a", vec![skeleton(11, 15.0, 15.0, 0)])]);

        // half of the boxes repeat an id, which is within the threshold
        let validation_log = validate_gt_annotations(&mut gt, 0.5, 5).unwrap();
        assert_eq!(
            (validation_log.excluded_count, validation_log.total_count),
            (2, 4)
        );
        assert!(gt.get("b", "default").is_none());

        // one match out of the two remaining boxes would pass on its own
        let matched = prepare_gt(&gt, &points, &DiscardLog::default(), 0.5, 5).unwrap();
        assert_eq!(matched.mapping.len(), 1);

        // but it is one match out of four input boxes
        let err = prepare_gt(&gt, &points, &validation_log, 0.5, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientGroundTruth);
        assert!(err.message().contains("(3 out of 4)"));

        let matched = prepare_gt(&gt, &points, &validation_log, 0.75, 5).unwrap();
        assert_eq!((matched.log.excluded_count, matched.log.total_count), (3, 4));
        assert_eq!(matched.log.records.len(), 3);
    }

    #[test]
    fn matching_twice_gives_the_same_outcome() {
        let (gt, points) = example_datasets();

        for threshold in [0.2, 0.5] {
            let run = || {
                prepare_gt(
                    &gt.clone(),
                    &points.clone(),
                    &DiscardLog::default(),
                    threshold,
                    5,
                )
            };
            match (run(), run()) {
                (Ok(first), Ok(second)) => {
                    assert_eq!(first.log, second.log);
                    assert_eq!(first.mapping, second.mapping);
                    assert_eq!(first.class_counts, second.class_counts);
                }
                (Err(first), Err(second)) => {
                    assert_eq!(first.kind(), second.kind());
                    assert_eq!(first.message(), second.message());
                }
                _ => panic!("matching outcome changed between runs"),
            }
        }
    }
}

//! The pipeline stages. Every stage takes the outputs of the previous ones and returns a
//! new snapshot.

use crate::{
    common::*,
    config::{Config, ManifestConfig},
    dataset::{Annotation, BoxAnnotation, Dataset, DatasetCodec, DatasetFormat, ImageInfo, Sample},
    error::ValidationResult,
    layout::{build_job_layout, JobLayout},
    matching::{prepare_gt, BboxPointMapping, MatchedGt},
    platform::{AnnotationPlatform, TaskHandle},
    roi::{self, RoiFilenameMap, RoiInfo, RoiSizeEstimations},
    storage::StorageClient,
    utils::{compose_data_bucket_filename, filter_image_files, strip_bucket_prefix},
    validation::{
        validate_filenames, validate_gt_annotations, validate_label_set,
        validate_point_bounds, validate_point_categories, DiscardLog,
    },
};

/// The downloaded inputs of a run.
#[derive(Debug, Clone)]
pub struct RawInputs {
    /// Image filenames relative to the data prefix.
    pub data_filenames: Vec<String>,
    pub gt_data: Vec<u8>,
    pub points_data: Vec<u8>,
}

pub fn download_inputs(
    source: &dyn StorageClient,
    manifest: &ManifestConfig,
) -> Result<RawInputs> {
    let data_filenames = source
        .list_files(&manifest.data_prefix)
        .with_context(|| format!("failed to list data files under '{}'", manifest.data_prefix))?;
    let data_filenames =
        filter_image_files(strip_bucket_prefix(data_filenames, &manifest.data_prefix));

    let gt_data = source
        .download_file(&manifest.gt_key)
        .with_context(|| format!("failed to download GT annotations '{}'", manifest.gt_key))?;
    let points_data = source.download_file(&manifest.points_key).with_context(|| {
        format!(
            "failed to download point annotations '{}'",
            manifest.points_key
        )
    })?;

    info!(
        data_files = data_filenames.len(),
        gt_bytes = gt_data.len(),
        points_bytes = points_data.len(),
        "downloaded inputs"
    );

    Ok(RawInputs {
        data_filenames,
        gt_data,
        points_data,
    })
}

/// The parsed annotation datasets.
#[derive(Debug, Clone)]
pub struct ParsedInputs {
    pub gt: Dataset,
    pub points: Dataset,
}

/// Parses the annotation files through files in the `staging` directory.
pub fn parse_inputs(
    codec: &dyn DatasetCodec,
    raw: &RawInputs,
    manifest: &ManifestConfig,
    staging: &Path,
) -> Result<ParsedInputs> {
    let parse = |name: &str, data: &[u8], format: DatasetFormat| -> Result<Dataset> {
        let path = staging.join(name);
        std::fs::write(&path, data)
            .with_context(|| format!("failed to stage '{}'", path.display()))?;
        codec.import_from(&path, format)
    };

    let gt = parse("gt_annotations.json", &raw.gt_data, manifest.gt_format)?;
    let points = parse("point_annotations.json", &raw.points_data, manifest.points_format)?;
    info!(
        gt_samples = gt.len(),
        point_samples = points.len(),
        "parsed annotations"
    );

    Ok(ParsedInputs { gt, points })
}

fn filenames_of(dataset: &Dataset) -> HashSet<String> {
    dataset
        .iter()
        .map(|sample| sample.filename().to_string())
        .collect()
}

/// The cleaned GT and the boxes dropped from it.
#[derive(Debug, Clone)]
pub struct ValidatedGt {
    pub dataset: Dataset,
    pub log: DiscardLog,
}

/// Checks the GT files, labels and boxes.
pub fn validate_gt(
    mut gt: Dataset,
    data_filenames: &HashSet<String>,
    config: &Config,
) -> ValidationResult<ValidatedGt> {
    let max_items = config.validation.list_display_threshold;

    validate_filenames(
        data_filenames,
        &filenames_of(&gt),
        config.manifest.val_size,
        max_items,
    )?;
    validate_label_set(&mut gt, &config.manifest.labels, max_items)?;
    let log = validate_gt_annotations(
        &mut gt,
        config.validation.max_discarded_threshold.raw(),
        max_items,
    )?;

    Ok(ValidatedGt { dataset: gt, log })
}

/// Checks the point categories, labels, files and coordinates. Returns the cleaned points.
pub fn validate_points(
    mut points: Dataset,
    data_filenames: &HashSet<String>,
    config: &Config,
) -> ValidationResult<Dataset> {
    let max_items = config.validation.list_display_threshold;

    validate_point_categories(points.categories(), max_items)?;
    validate_label_set(&mut points, &config.manifest.labels, max_items)?;
    validate_filenames(data_filenames, &filenames_of(&points), 1, max_items)?;
    validate_point_bounds(
        &mut points,
        config.validation.max_discarded_threshold.raw(),
        max_items,
    )?;

    Ok(points)
}

pub fn match_gt(
    gt: &ValidatedGt,
    points: &Dataset,
    config: &Config,
) -> ValidationResult<MatchedGt> {
    prepare_gt(
        &gt.dataset,
        points,
        &gt.log,
        config.validation.max_discarded_threshold.raw(),
        config.validation.list_display_threshold,
    )
}

pub fn estimate_rois(
    matched: &MatchedGt,
    points: &Dataset,
    config: &Config,
) -> Result<RoiSizeEstimations> {
    config.roi.estimator().estimate(
        &matched.dataset,
        points,
        config.validation.list_display_threshold,
    )
}

pub fn extract_rois(
    points: &Dataset,
    estimations: &RoiSizeEstimations,
    config: &Config,
) -> Result<Vec<RoiInfo>> {
    let rois = config.roi.extractor().prepare_rois(points, estimations)?;
    info!(count = rois.len(), "computed point RoIs");
    Ok(rois)
}

pub fn mangle_filenames(rois: &[RoiInfo], config: &Config) -> RoiFilenameMap {
    roi::anonymize_filenames(
        rois.iter().map(|roi| roi.point_id),
        &config.roi.file_extension,
    )
}

/// The filenames to annotate and the GT decoys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPools {
    pub data: Vec<String>,
    pub gt: Vec<String>,
}

/// Splits the ROI filenames into GT decoys, which are the points backing a matched box,
/// and the points to annotate, which are the rest outside of the input GT images.
pub fn select_layout_pools(
    rois: &[RoiInfo],
    roi_filenames: &RoiFilenameMap,
    mapping: &BboxPointMapping,
    points: &Dataset,
    input_gt_filenames: &HashSet<String>,
) -> Result<LayoutPools> {
    let filename_of = |point_id| {
        roi_filenames
            .get(&point_id)
            .cloned()
            .ok_or_else(|| format_err!("no RoI filename for point #{}", point_id))
    };

    let gt_point_ids: IndexSet<_> = mapping.values().copied().collect();
    let gt = gt_point_ids
        .iter()
        .map(|&point_id| filename_of(point_id))
        .collect::<Result<Vec<_>>>()?;

    let image_filenames: HashMap<u64, &str> = points
        .iter()
        .map(|sample| (sample.original_key, sample.filename()))
        .collect();

    let mut data = vec![];
    for roi in rois {
        if gt_point_ids.contains(&roi.point_id) {
            continue;
        }
        let image = image_filenames
            .get(&roi.original_image_key)
            .ok_or_else(|| format_err!("unknown source image {}", roi.original_image_key))?;
        if input_gt_filenames.contains(*image) {
            continue;
        }
        data.push(filename_of(roi.point_id)?);
    }

    Ok(LayoutPools { data, gt })
}

pub fn build_layout<R>(pools: &LayoutPools, config: &Config, rng: &mut R) -> Result<JobLayout>
where
    R: Rng,
{
    let layout = build_job_layout(
        &pools.data,
        &pools.gt,
        config.manifest.job_size,
        config.manifest.val_size,
        rng,
    )?;
    info!(
        jobs = layout.len(),
        data = pools.data.len(),
        gt = pools.gt.len(),
        "built job layout"
    );
    Ok(layout)
}

/// Builds the GT dataset of the ROI images: one sample per matched box, named after the
/// ROI image, holding the box in crop coordinates.
pub fn build_gt_roi_dataset(
    matched: &MatchedGt,
    rois: &[RoiInfo],
    roi_filenames: &RoiFilenameMap,
    run_id: &str,
) -> Result<Dataset> {
    let rois_by_point: HashMap<_, _> = rois.iter().map(|roi| (roi.point_id, roi)).collect();
    let mut gt_roi = matched.dataset.empty_like();

    for sample in &matched.dataset {
        for bbox in sample.boxes() {
            let point_id = *matched
                .mapping
                .get(&bbox.id)
                .ok_or_else(|| format_err!("GT bbox #{} is not matched", bbox.id))?;
            let roi = rois_by_point
                .get(&point_id)
                .ok_or_else(|| format_err!("no RoI for point #{}", point_id))?;
            let filename = roi_filenames
                .get(&point_id)
                .ok_or_else(|| format_err!("no RoI filename for point #{}", point_id))?;
            let key = compose_data_bucket_filename(run_id, filename);

            let local_box = BoxAnnotation {
                id: bbox.id,
                label: &roi.to_local() * &bbox.label,
            };
            gt_roi.put(Sample {
                id: Path::new(&key).with_extension("").to_string_lossy().into_owned(),
                subset: sample.subset.clone(),
                image: ImageInfo {
                    path: key,
                    size: Some(ImageSize::try_from_hw([roi.roi_h, roi.roi_w])?),
                },
                original_key: gt_roi.len() as u64 + 1,
                annotations: vec![Annotation::Bbox(local_box)],
            });
        }
    }

    Ok(gt_roi)
}

/// Downloads the source images that have points, then crops, encodes and uploads their
/// RoIs. Returns the number of uploaded images.
pub fn upload_roi_images(
    source: &dyn StorageClient,
    oracle: &dyn StorageClient,
    points: &Dataset,
    rois: &[RoiInfo],
    roi_filenames: &RoiFilenameMap,
    config: &Config,
) -> Result<usize> {
    let rois_by_image: HashMap<u64, Vec<RoiInfo>> = rois
        .iter()
        .map(|roi| (roi.original_image_key, *roi))
        .into_group_map();
    let data_prefix = config.manifest.data_prefix.trim_matches('/');
    let mut uploaded = 0;

    for sample in points {
        let image_rois = match rois_by_image.get(&sample.original_key) {
            Some(image_rois) => image_rois,
            None => continue,
        };

        let key = if data_prefix.is_empty() {
            sample.filename().to_string()
        } else {
            format!("{}/{}", data_prefix, sample.filename())
        };
        let image = roi::decode_image(&source.download_file(&key)?)
            .with_context(|| format!("failed to load image '{}'", key))?;
        roi::check_image_size(sample.filename(), sample.image_size()?, &image)?;

        let encoded = roi::render_rois(
            &image,
            image_rois,
            &config.marker,
            &config.roi.file_extension,
        )?;
        for (roi, data) in izip!(image_rois, encoded) {
            let filename = roi_filenames
                .get(&roi.point_id)
                .ok_or_else(|| format_err!("no RoI filename for point #{}", roi.point_id))?;
            oracle.create_file(&compose_data_bucket_filename(&config.run_id, filename), &data)?;
            uploaded += 1;
        }
        debug!(image = key.as_str(), rois = image_rois.len(), "uploaded RoIs");
    }

    info!(count = uploaded, "uploaded RoI images");
    Ok(uploaded)
}

/// Creates one platform task per job, in layout order.
pub fn submit_layout(
    platform: &mut dyn AnnotationPlatform,
    bucket: &str,
    layout: &JobLayout,
    run_id: &str,
) -> Result<Vec<TaskHandle>> {
    layout
        .iter()
        .enumerate()
        .map(|(job_index, job)| {
            let keys: Vec<_> = job
                .iter()
                .map(|filename| compose_data_bucket_filename(run_id, filename))
                .collect();
            let handle = platform
                .create_task(bucket, job_index, &keys)
                .with_context(|| format!("failed to create task for job {}", job_index))?;
            debug!(task = handle.id.as_str(), job_index, "created task");
            Ok(handle)
        })
        .collect()
}

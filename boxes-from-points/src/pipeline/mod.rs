//! The task preparation pipeline.

mod stages;
pub use stages::*;

use crate::{
    common::*,
    config::Config,
    dataset::DatasetCodec,
    error::{ErrorKind, ValidationError},
    layout::JobLayout,
    meta::TaskMeta,
    platform::{AnnotationPlatform, TaskHandle},
    storage::StorageClient,
};

/// The states of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Downloading,
    Parsing,
    ValidatingGt,
    ValidatingPoints,
    Matching,
    EstimatingRoi,
    ExtractingRoi,
    Mangling,
    BuildingLayout,
    PersistingArtifacts,
    Submitting,
    Done,
    Failed,
}

impl Stage {
    /// The state that follows on success. Terminal states have none.
    pub fn next(self) -> Option<Self> {
        use Stage::*;
        let next = match self {
            Idle => Downloading,
            Downloading => Parsing,
            Parsing => ValidatingGt,
            ValidatingGt => ValidatingPoints,
            ValidatingPoints => Matching,
            Matching => EstimatingRoi,
            EstimatingRoi => ExtractingRoi,
            ExtractingRoi => Mangling,
            Mangling => BuildingLayout,
            BuildingLayout => PersistingArtifacts,
            PersistingArtifacts => Submitting,
            Submitting => Done,
            Done | Failed => return None,
        };
        Some(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Parsing => "parsing",
            Self::ValidatingGt => "validating GT",
            Self::ValidatingPoints => "validating points",
            Self::Matching => "matching",
            Self::EstimatingRoi => "estimating RoI",
            Self::ExtractingRoi => "extracting RoI",
            Self::Mangling => "mangling",
            Self::BuildingLayout => "building layout",
            Self::PersistingArtifacts => "persisting artifacts",
            Self::Submitting => "submitting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// A failed run, with the stage the failure happened in.
#[derive(Debug, thiserror::Error)]
#[error("task preparation failed while {stage}")]
pub struct PipelineFailure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

impl PipelineFailure {
    /// The validation failure kind, if the run was stopped by bad input data.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.validation_error().map(ValidationError::kind)
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.error.downcast_ref::<ValidationError>()
    }
}

/// The outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub layout: JobLayout,
    pub tasks: Vec<TaskHandle>,
    /// Keys of the persisted metadata files.
    pub artifacts: Vec<String>,
    pub roi_count: usize,
    pub gt_roi_count: usize,
    /// The visited states, ending with [`Stage::Done`].
    pub stages: Vec<Stage>,
}

/// Runs the stages in order and records the visited states.
#[derive(Debug)]
struct StageTracker {
    stage: Stage,
    history: Vec<Stage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: Stage::Idle,
            history: vec![Stage::Idle],
        }
    }

    fn advance(&mut self) -> Stage {
        let next = self.stage.next().unwrap_or(Stage::Failed);
        self.stage = next;
        self.history.push(next);
        next
    }

    /// Moves to the next stage and runs `f` in it.
    fn enter<T, F, E>(&mut self, f: F) -> Result<T, PipelineFailure>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<Error>,
    {
        let stage = self.advance();
        let _span = info_span!("stage", %stage).entered();
        debug!("stage started");

        f().map_err(|error| {
            let error = error.into();
            warn!("stage failed: {:#}", error);
            self.stage = Stage::Failed;
            self.history.push(Stage::Failed);
            PipelineFailure { stage, error }
        })
    }
}

/// Prepares and submits the annotation jobs of one run.
pub struct Pipeline<'a> {
    config: &'a Config,
    source: &'a dyn StorageClient,
    oracle: &'a dyn StorageClient,
    platform: &'a mut dyn AnnotationPlatform,
    codec: &'a dyn DatasetCodec,
    rng: StdRng,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        source: &'a dyn StorageClient,
        oracle: &'a dyn StorageClient,
        platform: &'a mut dyn AnnotationPlatform,
        codec: &'a dyn DatasetCodec,
    ) -> Self {
        Self {
            config,
            source,
            oracle,
            platform,
            codec,
            rng: config.rng(),
        }
    }

    /// Replaces the random source of job shuffling and decoy sampling.
    pub fn with_rng(self, rng: StdRng) -> Self {
        Self { rng, ..self }
    }

    pub fn run(self) -> Result<PipelineOutput, PipelineFailure> {
        let Self {
            config,
            source,
            oracle,
            platform,
            codec,
            mut rng,
        } = self;
        let manifest = &config.manifest;
        let run_id = config.run_id.as_str();

        let _span = info_span!("prepare", run_id).entered();
        let mut tracker = StageTracker::new();

        let raw = tracker.enter(|| download_inputs(source, manifest))?;

        let ParsedInputs { gt, points } = tracker.enter(|| -> Result<_> {
            let staging = tempfile::tempdir()?;
            parse_inputs(codec, &raw, manifest, staging.path())
        })?;

        let data_filenames: HashSet<String> = raw.data_filenames.iter().cloned().collect();
        let gt = tracker.enter(|| validate_gt(gt, &data_filenames, config))?;
        let points = tracker.enter(|| validate_points(points, &data_filenames, config))?;

        let matched = tracker.enter(|| match_gt(&gt, &points, config))?;
        let estimations = tracker.enter(|| estimate_rois(&matched, &points, config))?;
        let rois = tracker.enter(|| extract_rois(&points, &estimations, config))?;
        let roi_filenames = tracker.enter(|| Ok::<_, Error>(mangle_filenames(&rois, config)))?;

        let layout = tracker.enter(|| -> Result<_> {
            let input_gt_filenames: HashSet<String> =
                gt.dataset.iter().map(|sample| sample.filename().to_string()).collect();
            let pools = select_layout_pools(
                &rois,
                &roi_filenames,
                &matched.mapping,
                &points,
                &input_gt_filenames,
            )?;
            build_layout(&pools, config, &mut rng)
        })?;

        let (roi_count, gt_roi_count, artifacts) = tracker.enter(|| -> Result<_> {
            let gt_roi = build_gt_roi_dataset(&matched, &rois, &roi_filenames, run_id)?;
            let roi_count =
                upload_roi_images(source, oracle, &points, &rois, &roi_filenames, config)?;
            let meta = TaskMeta {
                points_data: &raw.points_data,
                gt: &matched.dataset,
                gt_roi: &gt_roi,
                bbox_point_mapping: &matched.mapping,
                rois: &rois,
                roi_filenames: &roi_filenames,
                job_layout: &layout,
            };
            let artifacts = meta.upload(oracle, codec, run_id)?;
            Ok((roi_count, gt_roi.len(), artifacts))
        })?;

        let tasks = tracker.enter(|| submit_layout(platform, oracle.bucket(), &layout, run_id))?;

        tracker.advance();
        info!(
            jobs = layout.len(),
            tasks = tasks.len(),
            rois = roi_count,
            "task preparation finished"
        );

        Ok(PipelineOutput {
            layout,
            tasks,
            artifacts,
            roi_count,
            gt_roi_count,
            stages: tracker.history,
        })
    }
}

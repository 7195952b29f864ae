//! Task metadata persisted next to the ROI images of a run.

use crate::{
    common::*,
    dataset::{Dataset, DatasetCodec, DatasetFormat},
    layout::JobLayout,
    matching::BboxPointMapping,
    roi::{RoiFilenameMap, RoiInfo},
    storage::StorageClient,
    utils::compose_data_bucket_filename,
};

pub const POINTS_FILENAME: &str = "points.json";
pub const GT_FILENAME: &str = "gt.json";
pub const BBOX_POINT_MAPPING_FILENAME: &str = "bbox_point_mapping.json";
pub const ROI_INFO_FILENAME: &str = "roi_info.json";
pub const ROI_FILENAMES_FILENAME: &str = "roi_filenames.json";
pub const GT_ROI_FILENAME: &str = "gt_roi.json";
pub const JOB_LAYOUT_FILENAME: &str = "job_layout.json";

/// Everything persisted about a prepared run.
#[derive(Debug, Clone, Copy)]
pub struct TaskMeta<'a> {
    /// The points annotation file as downloaded.
    pub points_data: &'a [u8],
    pub gt: &'a Dataset,
    pub gt_roi: &'a Dataset,
    pub bbox_point_mapping: &'a BboxPointMapping,
    pub rois: &'a [RoiInfo],
    pub roi_filenames: &'a RoiFilenameMap,
    pub job_layout: &'a JobLayout,
}

impl TaskMeta<'_> {
    /// Serializes the metadata into `(filename, content)` pairs.
    pub fn files(&self, codec: &dyn DatasetCodec) -> Result<Vec<(&'static str, Vec<u8>)>> {
        Ok(vec![
            (POINTS_FILENAME, self.points_data.to_vec()),
            (GT_FILENAME, codec.export(self.gt, DatasetFormat::CocoInstances)?),
            (
                BBOX_POINT_MAPPING_FILENAME,
                serde_json::to_vec(self.bbox_point_mapping)?,
            ),
            (ROI_INFO_FILENAME, serde_json::to_vec(self.rois)?),
            (ROI_FILENAMES_FILENAME, serde_json::to_vec(self.roi_filenames)?),
            (
                GT_ROI_FILENAME,
                codec.export(self.gt_roi, DatasetFormat::CocoInstances)?,
            ),
            (JOB_LAYOUT_FILENAME, serde_json::to_vec(self.job_layout)?),
        ])
    }

    /// Writes the metadata under the run prefix. Returns the written keys.
    pub fn upload(
        &self,
        storage: &dyn StorageClient,
        codec: &dyn DatasetCodec,
        run_id: &str,
    ) -> Result<Vec<String>> {
        self.files(codec)?
            .into_iter()
            .map(|(filename, data)| {
                let key = compose_data_bucket_filename(run_id, filename);
                storage
                    .create_file(&key, &data)
                    .with_context(|| format!("failed to upload '{}'", key))?;
                debug!(key = key.as_str(), size = data.len(), "uploaded task meta");
                Ok(key)
            })
            .collect()
    }
}

pub fn read_job_layout(storage: &dyn StorageClient, run_id: &str) -> Result<JobLayout> {
    read_json(storage, &compose_data_bucket_filename(run_id, JOB_LAYOUT_FILENAME))
}

pub fn read_roi_info(storage: &dyn StorageClient, run_id: &str) -> Result<Vec<RoiInfo>> {
    read_json(storage, &compose_data_bucket_filename(run_id, ROI_INFO_FILENAME))
}

pub fn read_roi_filenames(storage: &dyn StorageClient, run_id: &str) -> Result<RoiFilenameMap> {
    read_json(storage, &compose_data_bucket_filename(run_id, ROI_FILENAMES_FILENAME))
}

pub fn read_bbox_point_mapping(
    storage: &dyn StorageClient,
    run_id: &str,
) -> Result<BboxPointMapping> {
    read_json(
        storage,
        &compose_data_bucket_filename(run_id, BBOX_POINT_MAPPING_FILENAME),
    )
}

fn read_json<T>(storage: &dyn StorageClient, key: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let data = storage.download_file(key)?;
    serde_json::from_slice(&data).with_context(|| format!("failed to parse '{}'", key))
}

//! Submission of jobs to the annotation platform.

use crate::{common::*, storage::StorageClient, utils::compose_data_bucket_filename};

/// A task created on the annotation platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    pub job_index: usize,
}

/// The annotation platform, seen from the pipeline.
pub trait AnnotationPlatform {
    /// Creates one task holding the given files of the bucket.
    fn create_task(
        &mut self,
        bucket: &str,
        job_index: usize,
        filenames: &[String],
    ) -> Result<TaskHandle>;
}

/// The task description written by [`LocalTaskWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
    pub bucket: String,
    pub job_index: usize,
    pub filenames: Vec<String>,
}

/// Writes every task as a JSON file into `<run_id>/tasks/` of the storage.
pub struct LocalTaskWriter<'a> {
    storage: &'a dyn StorageClient,
    run_id: String,
}

impl<'a> LocalTaskWriter<'a> {
    pub fn new(storage: &'a dyn StorageClient, run_id: impl Into<String>) -> Self {
        Self {
            storage,
            run_id: run_id.into(),
        }
    }
}

impl AnnotationPlatform for LocalTaskWriter<'_> {
    fn create_task(
        &mut self,
        bucket: &str,
        job_index: usize,
        filenames: &[String],
    ) -> Result<TaskHandle> {
        let key = compose_data_bucket_filename(&self.run_id, &format!("tasks/{}.json", job_index));
        let task = TaskFile {
            bucket: bucket.to_string(),
            job_index,
            filenames: filenames.to_vec(),
        };
        self.storage
            .create_file(&key, &serde_json::to_vec_pretty(&task)?)?;
        Ok(TaskHandle { id: key, job_index })
    }
}

//! Object storage access.

use crate::common::*;

/// A bucket of files addressed by `/`-separated keys.
pub trait StorageClient {
    /// The bucket name, used to reference files on the annotation platform.
    fn bucket(&self) -> &str;

    /// Lists the keys of all files under `prefix`, sorted.
    fn list_files(&self, prefix: &str) -> Result<Vec<String>>;

    fn download_file(&self, key: &str) -> Result<Vec<u8>>;

    /// Creates or overwrites the file.
    fn create_file(&self, key: &str, data: &[u8]) -> Result<()>;
}

/// A bucket backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    bucket: String,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        ensure!(
            root.is_dir(),
            "storage root '{}' is not a directory",
            root.display()
        );
        let bucket = root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            root: root.to_owned(),
            bucket,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> Result<PathBuf> {
        let key = key.trim_start_matches('/');
        ensure!(
            Path::new(key)
                .components()
                .all(|comp| matches!(comp, std::path::Component::Normal(_))),
            "invalid storage key '{}'",
            key
        );
        Ok(self.root.join(key))
    }
}

impl StorageClient for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_matches('/');
        let root_pattern = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = if prefix.is_empty() {
            format!("{}/**/*", root_pattern)
        } else {
            format!("{}/{}/**/*", root_pattern, glob::Pattern::escape(prefix))
        };

        let mut keys: Vec<_> = glob::glob(&pattern)?
            .map(|entry| -> Result<_> {
                let path = entry?;
                if !path.is_file() {
                    return Ok(None);
                }
                let relative = path.strip_prefix(&self.root)?;
                let key = relative
                    .components()
                    .map(|comp| comp.as_os_str().to_string_lossy())
                    .join("/");
                Ok(Some(key))
            })
            .filter_map(|key| key.transpose())
            .collect::<Result<_>>()?;
        keys.sort();
        Ok(keys)
    }

    fn download_file(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_of(key)?;
        std::fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))
    }

    fn create_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data).with_context(|| format!("failed to write '{}'", path.display()))
    }
}

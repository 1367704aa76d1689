//! Transfer of dataset repositories to and from the Hugging Face Hub.
//!
//! ```text
//!   DatasetManager ──► HubTransfer ──► HubClient (hf-hub download,
//!        │                                     commit API upload)
//!        ▼
//!   AudioProcessor over the downloaded directory
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::AudioProcessor;
use crate::error::BoxError;

mod client;
mod commit;

pub use client::{HubClient, DEFAULT_ENDPOINT};
pub use commit::{collect_upload_files, UploadFile};

/// Directory under the download root used as the hf-hub cache.
pub const CACHE_DIR: &str = ".cache";

/// Default branch for downloads and commits.
pub const DEFAULT_REVISION: &str = "main";

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to download {repo_id}")]
    DownloadFailed {
        repo_id: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to upload to {repo_id}")]
    UploadFailed {
        repo_id: String,
        #[source]
        source: BoxError,
    },
    #[error("local path {} does not exist", .0.display())]
    LocalPathMissing(PathBuf),
    #[error("failed to read {}", .path.display())]
    WalkFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid ignore pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Kind of Hub repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RepoKind {
    #[default]
    Dataset,
    Model,
    Space,
}

impl RepoKind {
    /// Plural path segment used by the REST API (`/api/datasets/...`).
    pub fn api_segment(self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets",
            RepoKind::Model => "models",
            RepoKind::Space => "spaces",
        }
    }

    /// Prefix of the repository in git URLs; models have none.
    pub fn url_prefix(self) -> &'static str {
        match self {
            RepoKind::Dataset => "datasets/",
            RepoKind::Model => "",
            RepoKind::Space => "spaces/",
        }
    }
}

impl From<RepoKind> for hf_hub::RepoType {
    fn from(kind: RepoKind) -> Self {
        match kind {
            RepoKind::Dataset => hf_hub::RepoType::Dataset,
            RepoKind::Model => hf_hub::RepoType::Model,
            RepoKind::Space => hf_hub::RepoType::Space,
        }
    }
}

/// A repository snapshot (or single file) to fetch into `local_dir`.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub repo_id: String,
    pub local_dir: PathBuf,
    /// Fetch only this file instead of the whole repository.
    pub filename: Option<String>,
    pub repo_kind: RepoKind,
    pub revision: String,
    /// Glob patterns of repository files to skip.
    pub ignore_patterns: Vec<String>,
    /// Remove the download cache once the files are in place.
    pub no_cache: bool,
}

impl DownloadRequest {
    pub fn new(repo_id: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_id: repo_id.into(),
            local_dir: local_dir.into(),
            filename: None,
            repo_kind: RepoKind::Dataset,
            revision: DEFAULT_REVISION.to_string(),
            ignore_patterns: Vec::new(),
            no_cache: false,
        }
    }
}

/// A local file or directory to commit to a repository.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub local_path: PathBuf,
    pub repo_id: String,
    pub repo_kind: RepoKind,
    pub revision: String,
    pub commit_message: Option<String>,
}

impl UploadRequest {
    pub fn new(local_path: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            repo_id: repo_id.into(),
            repo_kind: RepoKind::Dataset,
            revision: DEFAULT_REVISION.to_string(),
            commit_message: None,
        }
    }
}

/// Moves repository content between the Hub and the local filesystem.
pub trait HubTransfer {
    /// Fetch the requested files and return their local paths.
    fn download(&self, request: &DownloadRequest) -> Result<Vec<PathBuf>, HubError>;

    fn upload(&self, request: &UploadRequest) -> Result<(), HubError>;
}

// ---------------------------------------------------------------------------
// DatasetManager
// ---------------------------------------------------------------------------

/// Downloads, uploads and opens datasets through a [`HubTransfer`].
pub struct DatasetManager<T: HubTransfer> {
    transfer: T,
}

impl DatasetManager<HubClient> {
    /// Manager backed by the real Hub, authenticated with `token`.
    pub fn with_token(token: Option<String>) -> Self {
        Self::new(HubClient::new(token))
    }
}

impl<T: HubTransfer> DatasetManager<T> {
    pub fn new(transfer: T) -> Self {
        Self { transfer }
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn download(&self, request: &DownloadRequest) -> Result<Vec<PathBuf>, HubError> {
        self.transfer.download(request)
    }

    pub fn upload(&self, request: &UploadRequest) -> Result<(), HubError> {
        if !request.local_path.exists() {
            return Err(HubError::LocalPathMissing(request.local_path.clone()));
        }
        self.transfer.upload(request)
    }

    /// Download a dataset and open a processor over the fetched data.
    ///
    /// With `filename` set the processor reads that file, otherwise every
    /// Parquet file under `local_dir`.
    pub fn fetch_and_open(&self, request: &DownloadRequest) -> Result<AudioProcessor, HubError> {
        self.download(request)?;
        let path = match &request.filename {
            Some(filename) => request.local_dir.join(filename),
            None => request.local_dir.clone(),
        };
        Ok(AudioProcessor::new(path))
    }
}

/// Path of `file` relative to `root`, with `/` separators as used by the Hub.
pub(crate) fn repo_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs::File;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BinaryArray, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::TempDir;

    use super::*;

    /// Writes a one-row dataset instead of talking to the network.
    #[derive(Default)]
    struct FakeHub {
        downloads: RefCell<Vec<String>>,
        uploads: RefCell<Vec<PathBuf>>,
    }

    impl HubTransfer for FakeHub {
        fn download(&self, request: &DownloadRequest) -> Result<Vec<PathBuf>, HubError> {
            self.downloads.borrow_mut().push(request.repo_id.clone());
            std::fs::create_dir_all(request.local_dir.join("data")).unwrap();
            let path = request.local_dir.join("data/train-00000.parquet");

            let schema = Arc::new(Schema::new(vec![
                Field::new("id", DataType::Utf8, false),
                Field::new("audio", DataType::Binary, false),
            ]));
            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(vec!["q1"])) as ArrayRef,
                    Arc::new(BinaryArray::from(vec![b"RIFF".as_ref()])),
                ],
            )
            .unwrap();
            let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
            writer.write(&batch).unwrap();
            writer.close().unwrap();
            Ok(vec![path])
        }

        fn upload(&self, request: &UploadRequest) -> Result<(), HubError> {
            self.uploads.borrow_mut().push(request.local_path.clone());
            Ok(())
        }
    }

    #[test]
    fn fetch_and_open_reads_downloaded_directory() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(FakeHub::default());
        let request = DownloadRequest::new("fixie-ai/llama-questions", dir.path());

        let processor = manager.fetch_and_open(&request).unwrap();
        let metadata = processor.get_metadata().unwrap();
        assert_eq!(metadata.total_files, 1);
        assert_eq!(metadata.total_bytes, 4);
        assert_eq!(
            manager.transfer().downloads.borrow().as_slice(),
            &["fixie-ai/llama-questions".to_string()]
        );
    }

    #[test]
    fn upload_requires_existing_path() {
        let dir = TempDir::new().unwrap();
        let manager = DatasetManager::new(FakeHub::default());

        let missing = UploadRequest::new(dir.path().join("nope"), "user/repo");
        assert!(matches!(
            manager.upload(&missing),
            Err(HubError::LocalPathMissing(_))
        ));
        assert!(manager.transfer().uploads.borrow().is_empty());

        let present = UploadRequest::new(dir.path(), "user/repo");
        manager.upload(&present).unwrap();
        assert_eq!(manager.transfer().uploads.borrow().len(), 1);
    }

    #[test]
    fn repo_paths_use_forward_slashes() {
        let root = Path::new("/tmp/ds");
        assert_eq!(
            repo_path(root, Path::new("/tmp/ds/data/train.parquet")).as_deref(),
            Some("data/train.parquet")
        );
        assert_eq!(repo_path(root, Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn repo_kind_urls() {
        assert_eq!(RepoKind::Dataset.api_segment(), "datasets");
        assert_eq!(RepoKind::Model.url_prefix(), "");
        assert_eq!(RepoKind::Space.url_prefix(), "spaces/");
    }
}

use std::fs;
use std::path::PathBuf;

use globset::{Glob, GlobSet, GlobSetBuilder};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::Repo;
use log::{debug, info};

use super::commit;
use super::{DownloadRequest, HubError, HubTransfer, UploadRequest, CACHE_DIR};
use crate::error::BoxError;

/// Public Hub endpoint used unless `HF_ENDPOINT` points elsewhere.
pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

const DEFAULT_LOG_TARGET: &str = "datasetplus::hub";

/// [`HubTransfer`] against a Hugging Face Hub endpoint.
///
/// Downloads go through the `hf-hub` client; uploads use the commit API
/// directly since `hf-hub` is read-only.
#[derive(Debug, Clone)]
pub struct HubClient {
    token: Option<String>,
    endpoint: String,
    progress: bool,
    retries: usize,
    log_target: String,
}

impl HubClient {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            progress: true,
            retries: 3,
            log_target: DEFAULT_LOG_TARGET.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn log_target(&self) -> &str {
        &self.log_target
    }

    fn fetch(&self, request: &DownloadRequest) -> Result<Vec<PathBuf>, BoxError> {
        let ignore = build_ignore_set(&request.ignore_patterns)?;
        fs::create_dir_all(&request.local_dir)?;
        let cache_dir = request.local_dir.join(CACHE_DIR);

        let api = ApiBuilder::new()
            .with_endpoint(self.endpoint.clone())
            .with_token(self.token.clone())
            .with_cache_dir(cache_dir.clone())
            .with_progress(self.progress)
            .with_retries(self.retries)
            .build()?;
        let repo = api.repo(Repo::with_revision(
            request.repo_id.clone(),
            request.repo_kind.into(),
            request.revision.clone(),
        ));

        let files = match &request.filename {
            Some(filename) => {
                info!(target: self.log_target.as_str(), "Downloading file: {filename}");
                vec![filename.clone()]
            }
            None => {
                let listing = repo.info()?;
                let all: Vec<String> = listing.siblings.into_iter().map(|s| s.rfilename).collect();
                let selected = select_files(all, &ignore);
                info!(
                    target: self.log_target.as_str(),
                    "Repository lists {} file(s) to fetch",
                    selected.len()
                );
                selected
            }
        };

        let mut local_paths = Vec::with_capacity(files.len());
        for file in files {
            let cached = repo.get(&file)?;
            let target = request.local_dir.join(&file);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&cached, &target)?;
            debug!(target: self.log_target.as_str(), "Downloaded {file}");
            local_paths.push(target);
        }

        if request.no_cache && cache_dir.exists() {
            fs::remove_dir_all(&cache_dir)?;
            debug!(
                target: self.log_target.as_str(),
                "Removed cache directory: {}",
                cache_dir.display()
            );
        }
        Ok(local_paths)
    }
}

impl HubTransfer for HubClient {
    fn download(&self, request: &DownloadRequest) -> Result<Vec<PathBuf>, HubError> {
        info!(
            target: self.log_target.as_str(),
            "Downloading {} to {}",
            request.repo_id,
            request.local_dir.display()
        );
        let paths = self.fetch(request).map_err(|source| {
            log::error!(
                target: self.log_target.as_str(),
                "Failed to download {}: {source}",
                request.repo_id
            );
            HubError::DownloadFailed {
                repo_id: request.repo_id.clone(),
                source,
            }
        })?;
        info!(target: self.log_target.as_str(), "Download complete");
        Ok(paths)
    }

    fn upload(&self, request: &UploadRequest) -> Result<(), HubError> {
        if !request.local_path.exists() {
            return Err(HubError::LocalPathMissing(request.local_path.clone()));
        }
        info!(
            target: self.log_target.as_str(),
            "Uploading {} to {}",
            request.local_path.display(),
            request.repo_id
        );
        commit::upload(self, request).map_err(|source| {
            log::error!(
                target: self.log_target.as_str(),
                "Failed to upload to {}: {source}",
                request.repo_id
            );
            HubError::UploadFailed {
                repo_id: request.repo_id.clone(),
                source,
            }
        })?;
        info!(target: self.log_target.as_str(), "Upload complete");
        Ok(())
    }
}

/// Compile ignore globs. Patterns match the repository path.
fn build_ignore_set(patterns: &[String]) -> Result<GlobSet, HubError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| HubError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| HubError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

/// Repository files not matched by any ignore glob, in listing order.
fn select_files(files: Vec<String>, ignore: &GlobSet) -> Vec<String> {
    files.into_iter().filter(|f| !ignore.is_match(f)).collect()
}

//! Hub commit API: preupload negotiation, LFS transfer and the NDJSON commit.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use super::client::HubClient;
use super::{repo_path, HubError, RepoKind, UploadRequest};
use crate::error::BoxError;

/// Bytes of each file sent to the preupload endpoint for type sniffing.
const SAMPLE_BYTES: usize = 512;

/// Files per preupload request.
const PREUPLOAD_CHUNK: usize = 250;

const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

/// A local file and the path it will have in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub local: PathBuf,
    pub path_in_repo: String,
}

/// Files to commit for `local_path`: a single file lands under its own
/// name, a directory is walked recursively with hidden entries skipped.
pub fn collect_upload_files(local_path: &Path) -> Result<Vec<UploadFile>, HubError> {
    if local_path.is_file() {
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| HubError::LocalPathMissing(local_path.to_path_buf()))?;
        return Ok(vec![UploadFile {
            local: local_path.to_path_buf(),
            path_in_repo: name.to_string(),
        }]);
    }
    if !local_path.is_dir() {
        return Err(HubError::LocalPathMissing(local_path.to_path_buf()));
    }

    let walker = WalkDir::new(local_path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with('.') && n != ".gitattributes")
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| HubError::WalkFailed {
            path: source.path().unwrap_or(local_path).to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(path_in_repo) = repo_path(local_path, entry.path()) {
            files.push(UploadFile {
                local: entry.into_path(),
                path_in_repo,
            });
        }
    }
    Ok(files)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PreuploadRequest<'a> {
    files: Vec<PreuploadFile<'a>>,
}

#[derive(Debug, Serialize)]
struct PreuploadFile<'a> {
    path: &'a str,
    sample: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadDecision>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadDecision {
    path: String,
    upload_mode: UploadMode,
    #[serde(default)]
    should_ignore: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UploadMode {
    Regular,
    Lfs,
}

#[derive(Debug, Serialize)]
struct LfsBatchRequest<'a> {
    operation: &'static str,
    transfers: [&'static str; 1],
    objects: &'a [LfsPointer],
    hash_algo: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LfsPointer {
    oid: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    oid: String,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<LfsObjectError>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LfsObjectError {
    code: i64,
    message: String,
}

/// One entry of the commit body.
#[derive(Debug, Clone, PartialEq)]
enum CommitOperation {
    Inline { path: String, content: Vec<u8> },
    Lfs { path: String, pointer: LfsPointer },
}

// ---------------------------------------------------------------------------
// Upload flow
// ---------------------------------------------------------------------------

pub(super) fn upload(client: &HubClient, request: &UploadRequest) -> Result<(), BoxError> {
    let files = collect_upload_files(&request.local_path)?;
    if files.is_empty() {
        return Err(format!("nothing to upload in {}", request.local_path.display()).into());
    }

    let mut operations = Vec::with_capacity(files.len());
    for chunk in files.chunks(PREUPLOAD_CHUNK) {
        let modes = preupload(client, request, chunk)?;
        let mut lfs_files = Vec::new();
        for file in chunk {
            match modes.get(file.path_in_repo.as_str()) {
                Some((_, true)) => debug!(target: client.log_target(), "Hub ignores {}", file.path_in_repo),
                Some((UploadMode::Lfs, false)) => lfs_files.push(file),
                _ => operations.push(CommitOperation::Inline {
                    path: file.path_in_repo.clone(),
                    content: fs::read(&file.local)?,
                }),
            }
        }
        for file in lfs_files {
            let pointer = lfs_pointer(&file.local)?;
            upload_lfs(client, request, file, &pointer)?;
            operations.push(CommitOperation::Lfs {
                path: file.path_in_repo.clone(),
                pointer,
            });
        }
    }

    let summary = request
        .commit_message
        .clone()
        .unwrap_or_else(|| default_commit_message(&request.local_path));
    let body = commit_body(&summary, &operations)?;
    let url = commit_url(client.endpoint(), request);
    debug!(
        target: client.log_target(),
        "Committing {} file(s) to {}",
        operations.len(),
        request.repo_id
    );
    authorized(client, ureq::post(&url))
        .content_type("application/x-ndjson")
        .send(body)?;
    Ok(())
}

fn preupload<'a>(
    client: &HubClient,
    request: &UploadRequest,
    files: &'a [UploadFile],
) -> Result<HashMap<&'a str, (UploadMode, bool)>, BoxError> {
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let (sample, size) = read_sample(&file.local)?;
        entries.push(PreuploadFile {
            path: &file.path_in_repo,
            sample: BASE64.encode(sample),
            size,
        });
    }

    let url = preupload_url(client.endpoint(), request);
    let parsed: PreuploadResponse = authorized(client, ureq::post(&url))
        .send_json(&PreuploadRequest { files: entries })?
        .body_mut()
        .read_json()?;

    let mut modes = HashMap::new();
    for decision in parsed.files {
        if let Some(file) = files.iter().find(|f| f.path_in_repo == decision.path) {
            modes.insert(
                file.path_in_repo.as_str(),
                (decision.upload_mode, decision.should_ignore),
            );
        }
    }
    Ok(modes)
}

fn upload_lfs(
    client: &HubClient,
    request: &UploadRequest,
    file: &UploadFile,
    pointer: &LfsPointer,
) -> Result<(), BoxError> {
    let batch = LfsBatchRequest {
        operation: "upload",
        transfers: ["basic"],
        objects: std::slice::from_ref(pointer),
        hash_algo: "sha256",
    };
    let url = lfs_batch_url(client.endpoint(), request.repo_kind, &request.repo_id);
    let response: LfsBatchResponse = authorized(client, ureq::post(&url))
        .header("Accept", LFS_CONTENT_TYPE)
        .content_type(LFS_CONTENT_TYPE)
        .send_json(&batch)?
        .body_mut()
        .read_json()?;

    let object = response
        .objects
        .into_iter()
        .find(|o| o.oid == pointer.oid)
        .ok_or_else(|| format!("LFS batch response has no entry for {}", file.path_in_repo))?;
    if let Some(err) = object.error {
        return Err(format!(
            "LFS rejected {} ({}): {}",
            file.path_in_repo, err.code, err.message
        )
        .into());
    }

    // No actions means the object is already stored.
    let Some(actions) = object.actions else {
        debug!(target: client.log_target(), "{} already in LFS", file.path_in_repo);
        return Ok(());
    };

    if let Some(upload) = actions.upload {
        if upload.header.contains_key("chunk_size") {
            return Err(format!("multipart LFS upload requested for {}", file.path_in_repo).into());
        }
        let mut put = ureq::put(&upload.href);
        for (name, value) in &upload.header {
            put = put.header(name.as_str(), value.as_str());
        }
        put.send(fs::read(&file.local)?)?;
        debug!(target: client.log_target(), "Uploaded {} to LFS", file.path_in_repo);
    }
    if let Some(verify) = actions.verify {
        let mut post = authorized(client, ureq::post(&verify.href));
        for (name, value) in &verify.header {
            post = post.header(name.as_str(), value.as_str());
        }
        post.send_json(pointer)?;
    }
    Ok(())
}

fn authorized<B>(client: &HubClient, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
    match client.token() {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

fn read_sample(path: &Path) -> io::Result<(Vec<u8>, u64)> {
    use std::io::Read;

    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut sample = Vec::with_capacity(SAMPLE_BYTES);
    file.take(SAMPLE_BYTES as u64).read_to_end(&mut sample)?;
    Ok((sample, size))
}

fn lfs_pointer(path: &Path) -> io::Result<LfsPointer> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    Ok(LfsPointer {
        oid: format!("{:x}", hasher.finalize()),
        size,
    })
}

fn default_commit_message(local_path: &Path) -> String {
    let name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("files");
    format!("Upload {name} with datasetplus")
}

fn commit_body(summary: &str, operations: &[CommitOperation]) -> Result<String, serde_json::Error> {
    let mut lines = Vec::with_capacity(operations.len() + 1);
    lines.push(serde_json::to_string(&json!({
        "key": "header",
        "value": { "summary": summary, "description": "" },
    }))?);
    for op in operations {
        let line = match op {
            CommitOperation::Inline { path, content } => json!({
                "key": "file",
                "value": { "content": BASE64.encode(content), "path": path, "encoding": "base64" },
            }),
            CommitOperation::Lfs { path, pointer } => json!({
                "key": "lfsFile",
                "value": { "path": path, "algo": "sha256", "oid": pointer.oid, "size": pointer.size },
            }),
        };
        lines.push(serde_json::to_string(&line)?);
    }
    Ok(lines.join("\n"))
}

fn preupload_url(endpoint: &str, request: &UploadRequest) -> String {
    format!(
        "{endpoint}/api/{}/{}/preupload/{}",
        request.repo_kind.api_segment(),
        request.repo_id,
        request.revision
    )
}

fn commit_url(endpoint: &str, request: &UploadRequest) -> String {
    format!(
        "{endpoint}/api/{}/{}/commit/{}",
        request.repo_kind.api_segment(),
        request.repo_id,
        request.revision
    )
}

fn lfs_batch_url(endpoint: &str, kind: RepoKind, repo_id: &str) -> String {
    format!(
        "{endpoint}/{}{repo_id}.git/info/lfs/objects/batch",
        kind.url_prefix()
    )
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::hub::CACHE_DIR;

    #[test]
    fn single_file_uses_its_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.parquet");
        fs::write(&path, b"PAR1").unwrap();

        let files = collect_upload_files(&path).unwrap();
        assert_eq!(
            files,
            vec![UploadFile {
                local: path,
                path_in_repo: "train.parquet".into()
            }]
        );
    }

    #[test]
    fn directory_walk_skips_hidden_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::create_dir_all(dir.path().join(CACHE_DIR)).unwrap();
        fs::write(dir.path().join("data/train.parquet"), b"x").unwrap();
        fs::write(dir.path().join("README.md"), b"y").unwrap();
        fs::write(dir.path().join(".gitattributes"), b"z").unwrap();
        fs::write(dir.path().join(".cache/blob"), b"cached").unwrap();

        let paths: Vec<String> = collect_upload_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|f| f.path_in_repo)
            .collect();
        assert_eq!(paths, vec![".gitattributes", "README.md", "data/train.parquet"]);
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            collect_upload_files(&dir.path().join("absent")),
            Err(HubError::LocalPathMissing(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn walk_errors_abort_collection() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/train.parquet"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("data/loop")).unwrap();

        assert!(matches!(
            collect_upload_files(dir.path()),
            Err(HubError::WalkFailed { .. })
        ));
    }

    #[test]
    fn pointer_hashes_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.bin");
        fs::write(&path, b"test content").unwrap();

        let pointer = lfs_pointer(&path).unwrap();
        assert_eq!(pointer.size, 12);
        assert_eq!(pointer.oid, format!("{:x}", Sha256::digest(b"test content")));
    }

    #[test]
    fn sample_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        fs::write(&path, vec![7u8; 2000]).unwrap();

        let (sample, size) = read_sample(&path).unwrap();
        assert_eq!(sample.len(), SAMPLE_BYTES);
        assert_eq!(size, 2000);
    }

    #[test]
    fn commit_body_is_ndjson() {
        let ops = vec![
            CommitOperation::Inline {
                path: "README.md".into(),
                content: b"hi".to_vec(),
            },
            CommitOperation::Lfs {
                path: "data/train.parquet".into(),
                pointer: LfsPointer {
                    oid: "abc".into(),
                    size: 10,
                },
            },
        ];
        let body = commit_body("Upload data", &ops).unwrap();
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Upload data");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["content"], "aGk=");
        assert_eq!(lines[1]["value"]["encoding"], "base64");
        assert_eq!(lines[2]["key"], "lfsFile");
        assert_eq!(lines[2]["value"]["oid"], "abc");
        assert_eq!(lines[2]["value"]["size"], 10);
    }

    #[test]
    fn endpoint_urls() {
        let request = UploadRequest::new("/tmp/x", "user/ds");
        assert_eq!(
            commit_url("https://huggingface.co", &request),
            "https://huggingface.co/api/datasets/user/ds/commit/main"
        );
        assert_eq!(
            preupload_url("https://huggingface.co", &request),
            "https://huggingface.co/api/datasets/user/ds/preupload/main"
        );
        assert_eq!(
            lfs_batch_url("https://huggingface.co", RepoKind::Model, "user/m"),
            "https://huggingface.co/user/m.git/info/lfs/objects/batch"
        );
    }

    #[test]
    fn preupload_response_parses() {
        let parsed: PreuploadResponse = serde_json::from_str(
            r#"{"files":[{"path":"a.parquet","uploadMode":"lfs","shouldIgnore":false},
                         {"path":"README.md","uploadMode":"regular"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.files[0].upload_mode, UploadMode::Lfs);
        assert_eq!(parsed.files[1].upload_mode, UploadMode::Regular);
        assert!(!parsed.files[1].should_ignore);
    }

    #[test]
    fn default_message_names_the_path() {
        assert_eq!(
            default_commit_message(Path::new("/data/llama_questions")),
            "Upload llama_questions with datasetplus"
        );
    }
}

//! Convenience utilities for Hugging Face Hub datasets: download and upload
//! repositories, and extract audio plus text columns from Parquet files.

pub mod audio;
pub mod data;
pub mod error;
pub mod hub;
pub mod logging;
pub mod scoring;

pub use audio::{AudioProcessor, DatasetSummary, ExtractOptions, MissingAudioPolicy};
pub use data::model::{CellValue, Table};
pub use error::{DatasetError, LoadError};
pub use hub::{DatasetManager, DownloadRequest, HubClient, HubError, HubTransfer, RepoKind, UploadRequest};

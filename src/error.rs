use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for loading, extracting and summarising datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to load dataset from {}", path.display())]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: LoadError,
    },
    #[error("schema of {} does not match {}: {details}", path.display(), reference.display())]
    SchemaMismatch {
        path: PathBuf,
        reference: PathBuf,
        details: String,
    },
    #[error("unknown column(s) {}; available: {}", missing.join(", "), available.join(", "))]
    UnknownColumn {
        missing: Vec<String>,
        available: Vec<String>,
    },
    #[error("failed to extract audio files: {context}")]
    ExtractionFailed {
        context: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to get metadata: {context}")]
    MetadataFailed {
        context: String,
        #[source]
        source: BoxError,
    },
}

/// Underlying cause of [`DatasetError::LoadFailed`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no parquet files found in {}", dir.display())]
    NoDataFiles { dir: PathBuf },
    #[error("unsupported file extension: .{0}")]
    UnsupportedExtension(String),
    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("decoding parquet file {}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },
    #[error("reading record batch from {}", path.display())]
    Arrow {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },
}

/// Problems with the shape of individual cells or columns.
#[derive(Debug, Error)]
pub enum CellError {
    #[error("row {row}: audio value is {found}, expected bytes or a struct with a `bytes` field")]
    MalformedAudio { row: usize, found: &'static str },
    #[error("no audio column found among: {}", .0.join(", "))]
    NoAudioColumn(Vec<String>),
    #[error("audio column `{0}` does not exist")]
    MissingAudioColumn(String),
}

impl DatasetError {
    pub(crate) fn extraction(
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        DatasetError::ExtractionFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn metadata(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DatasetError::MetadataFailed {
            context: context.into(),
            source: source.into(),
        }
    }
}

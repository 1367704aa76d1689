//! Audio extraction from Parquet-backed datasets.
//!
//! An [`AudioProcessor`] owns one dataset path and loads it on first use.
//! Extraction writes one directory per column:
//!
//! ```text
//! output_dir/
//!   wavs/{identifier}.wav
//!   {column}/{identifier}.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use arrow::record_batch::RecordBatch;
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::data::cell::is_audio_type;
use crate::data::loader::load_table;
use crate::data::model::{Table, RESERVED_PREFIX};
use crate::data::record::{audio_payload, row_identifier};
use crate::error::{CellError, DatasetError};

/// Default log target for processors that were not given one.
pub const DEFAULT_LOG_TARGET: &str = "datasetplus::audio";

/// Subdirectory of the output root receiving the audio files.
pub const AUDIO_DIR: &str = "wavs";

/// Column name tried first when no audio column is configured.
pub const DEFAULT_AUDIO_COLUMN: &str = "audio";

/// Rows included in [`DatasetSummary::sample`] by [`AudioProcessor::get_metadata`].
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// What to do with a row whose audio value is neither bytes nor a struct
/// carrying `bytes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingAudioPolicy {
    /// Log a warning and move on to the next row.
    #[default]
    Skip,
    /// Abort the extraction.
    Fail,
}

/// Options for [`AudioProcessor::extract_audio_files`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Text columns to extract. `None` extracts every column except the
    /// audio column and reserved `__`-prefixed ones.
    pub columns: Option<Vec<String>>,
    /// Process only the first `limit` rows.
    pub limit: Option<usize>,
    /// Column checked before `id`/`filename` when naming output files.
    pub id_column: Option<String>,
    pub missing_audio: MissingAudioPolicy,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            columns: None,
            limit: None,
            id_column: None,
            missing_audio: MissingAudioPolicy::Skip,
            progress: true,
        }
    }
}

/// On-demand snapshot of a dataset. Recomputed on every call.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub total_files: usize,
    /// Sum of the audio payload sizes across all rows.
    pub total_bytes: u64,
    pub columns: Vec<String>,
    pub audio_column: String,
    /// Leading rows of the table.
    pub sample: RecordBatch,
}

impl DatasetSummary {
    pub fn file_size_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

// ---------------------------------------------------------------------------
// AudioProcessor
// ---------------------------------------------------------------------------

/// Processes audio stored in a Parquet file or a directory of Parquet shards.
#[derive(Debug)]
pub struct AudioProcessor {
    path: PathBuf,
    audio_column: Option<String>,
    log_target: String,
    table: OnceLock<Table>,
}

impl AudioProcessor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            audio_column: None,
            log_target: DEFAULT_LOG_TARGET.to_string(),
            table: OnceLock::new(),
        }
    }

    /// Use `column` as the audio column instead of auto-detecting it.
    pub fn with_audio_column(mut self, column: impl Into<String>) -> Self {
        self.audio_column = Some(column.into());
        self
    }

    /// Emit log records under `target` instead of [`DEFAULT_LOG_TARGET`].
    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded table. Read from disk on first access, cached afterwards.
    pub fn table(&self) -> Result<&Table, DatasetError> {
        if let Some(table) = self.table.get() {
            return Ok(table);
        }
        let loaded = load_table(&self.path, &self.log_target).inspect_err(|err| {
            log::error!(target: self.log_target.as_str(), "Failed to read parquet data: {err}");
        })?;
        Ok(self.table.get_or_init(|| loaded))
    }

    /// Name of the column holding audio: the configured one, else `audio`,
    /// else the first binary or `bytes`-struct column.
    pub fn audio_column(&self) -> Result<String, DatasetError> {
        let table = self.table()?;
        if let Some(column) = &self.audio_column {
            if !table.has_column(column) {
                return Err(DatasetError::UnknownColumn {
                    missing: vec![column.clone()],
                    available: table.columns().to_vec(),
                });
            }
            return Ok(column.clone());
        }
        resolve_audio_column(table)
            .ok_or_else(|| {
                DatasetError::extraction(
                    "no audio column",
                    CellError::NoAudioColumn(table.columns().to_vec()),
                )
            })
    }

    /// Write every row's audio to `{output_dir}/wavs/{id}.wav` and each text
    /// column to `{output_dir}/{column}/{id}.txt`.
    ///
    /// Returns the written audio paths in row order. Requested columns are
    /// validated before anything touches the filesystem.
    pub fn extract_audio_files(
        &self,
        output_dir: impl AsRef<Path>,
        options: &ExtractOptions,
    ) -> Result<Vec<PathBuf>, DatasetError> {
        let output_dir = output_dir.as_ref();
        let table = self.table()?;
        let audio_column = self.audio_column()?;
        let text_columns = select_text_columns(table, &audio_column, options.columns.as_deref())?;

        let audio_dir = output_dir.join(AUDIO_DIR);
        fs::create_dir_all(&audio_dir).map_err(|err| {
            DatasetError::extraction(format!("creating {}", audio_dir.display()), err)
        })?;
        let text_dirs = text_columns
            .iter()
            .map(|column| {
                let dir = output_dir.join(column);
                fs::create_dir_all(&dir)
                    .map(|_| (column.as_str(), dir.clone()))
                    .map_err(|err| {
                        DatasetError::extraction(format!("creating {}", dir.display()), err)
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = options.limit.map_or(table.len(), |n| n.min(table.len()));
        info!(
            target: self.log_target.as_str(),
            "Extracting {total} rows from `{audio_column}` into {} (text columns: [{}])",
            output_dir.display(),
            text_columns.join(", ")
        );

        let progress = if options.progress {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        progress.set_message("Extracting audio files");

        let mut audio_files = Vec::with_capacity(total);
        for row in table.rows().take(total) {
            progress.inc(1);
            let identifier = row_identifier(&row, options.id_column.as_deref());

            let Some(value) = row.get(&audio_column) else {
                continue;
            };
            let bytes = match audio_payload(value, row.index) {
                Ok(bytes) => bytes,
                Err(err) => match options.missing_audio {
                    MissingAudioPolicy::Skip => {
                        warn!(target: self.log_target.as_str(), "Skipping `{identifier}`: {err}");
                        continue;
                    }
                    MissingAudioPolicy::Fail => {
                        return Err(DatasetError::extraction(
                            format!("row `{identifier}`"),
                            err,
                        ))
                    }
                },
            };

            let audio_path = audio_dir.join(format!("{identifier}.wav"));
            fs::write(&audio_path, bytes).map_err(|err| {
                DatasetError::extraction(format!("writing {}", audio_path.display()), err)
            })?;
            debug!(target: self.log_target.as_str(), "Extracted: {}", audio_path.display());

            for (column, dir) in &text_dirs {
                let Some(value) = row.get(column) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                let text_path = dir.join(format!("{identifier}.txt"));
                fs::write(&text_path, value.to_string()).map_err(|err| {
                    DatasetError::extraction(format!("writing {}", text_path.display()), err)
                })?;
            }

            audio_files.push(audio_path);
        }
        progress.finish_and_clear();

        info!(target: self.log_target.as_str(), "Extracted {} audio files", audio_files.len());
        Ok(audio_files)
    }

    /// Row count, total audio size, column names and the first
    /// [`DEFAULT_SAMPLE_ROWS`] rows.
    pub fn get_metadata(&self) -> Result<DatasetSummary, DatasetError> {
        self.summary(DEFAULT_SAMPLE_ROWS)
    }

    /// Like [`get_metadata`](Self::get_metadata) with a custom sample size.
    ///
    /// Unlike extraction, a malformed audio value anywhere fails the call.
    pub fn summary(&self, sample_rows: usize) -> Result<DatasetSummary, DatasetError> {
        let table = self.table()?;
        let audio_column = match self.audio_column() {
            Ok(column) => column,
            Err(DatasetError::ExtractionFailed { context, source }) => {
                return Err(DatasetError::MetadataFailed { context, source })
            }
            Err(other) => return Err(other),
        };

        let values = table
            .column_values(&audio_column)
            .ok_or_else(|| {
                DatasetError::metadata(
                    "no audio column",
                    CellError::MissingAudioColumn(audio_column.clone()),
                )
            })?;
        let mut total_bytes = 0u64;
        for (row, value) in values.enumerate() {
            let bytes = audio_payload(&value, row)
                .map_err(|err| DatasetError::metadata("summing audio sizes", err))?;
            total_bytes += bytes.len() as u64;
        }

        let sample = table
            .head(sample_rows)
            .map_err(|err| DatasetError::metadata("collecting sample rows", err))?;

        let summary = DatasetSummary {
            total_files: table.len(),
            total_bytes,
            columns: table.columns().to_vec(),
            audio_column,
            sample,
        };
        debug!(
            target: self.log_target.as_str(),
            "Retrieved metadata: {} rows, {:.2} MB, columns [{}]",
            summary.total_files,
            summary.file_size_mb(),
            summary.columns.join(", ")
        );
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

fn resolve_audio_column(table: &Table) -> Option<String> {
    if table.has_column(DEFAULT_AUDIO_COLUMN) {
        return Some(DEFAULT_AUDIO_COLUMN.to_string());
    }
    table
        .schema()
        .fields()
        .iter()
        .find(|f| is_audio_type(f.data_type()))
        .map(|f| f.name().clone())
}

/// Text columns to extract. An explicit list must name existing columns
/// only; otherwise every non-audio, non-reserved column is used.
fn select_text_columns(
    table: &Table,
    audio_column: &str,
    requested: Option<&[String]>,
) -> Result<Vec<String>, DatasetError> {
    match requested {
        Some(columns) => {
            let missing: Vec<String> = columns
                .iter()
                .filter(|c| !table.has_column(c))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(DatasetError::UnknownColumn {
                    missing,
                    available: table.columns().to_vec(),
                });
            }
            Ok(columns.to_vec())
        }
        None => Ok(table
            .columns()
            .iter()
            .filter(|c| c.as_str() != audio_column && !c.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, BinaryArray, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn table(columns: Vec<(&str, ArrayRef)>) -> Table {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let batch =
            RecordBatch::try_new(schema.clone(), columns.into_iter().map(|(_, a)| a).collect())
                .unwrap();
        Table::new(schema, vec![batch])
    }

    #[test]
    fn detects_named_audio_column_first() {
        let t = table(vec![
            ("blob", Arc::new(BinaryArray::from(vec![b"a".as_ref()])) as ArrayRef),
            ("audio", Arc::new(BinaryArray::from(vec![b"b".as_ref()])) as ArrayRef),
        ]);
        assert_eq!(resolve_audio_column(&t).as_deref(), Some("audio"));
    }

    #[test]
    fn detects_first_binary_column() {
        let t = table(vec![
            ("text", Arc::new(StringArray::from(vec!["x"])) as ArrayRef),
            ("speech", Arc::new(BinaryArray::from(vec![b"b".as_ref()])) as ArrayRef),
        ]);
        assert_eq!(resolve_audio_column(&t).as_deref(), Some("speech"));

        let no_audio = table(vec![("text", Arc::new(StringArray::from(vec!["x"])) as ArrayRef)]);
        assert_eq!(resolve_audio_column(&no_audio), None);
    }

    #[test]
    fn default_text_columns_skip_audio_and_reserved() {
        let t = table(vec![
            ("id", Arc::new(StringArray::from(vec!["a"])) as ArrayRef),
            ("audio", Arc::new(BinaryArray::from(vec![b"b".as_ref()])) as ArrayRef),
            ("transcript", Arc::new(StringArray::from(vec!["hi"])) as ArrayRef),
            ("__index_level_0__", Arc::new(StringArray::from(vec!["0"])) as ArrayRef),
        ]);
        assert_eq!(
            select_text_columns(&t, "audio", None).unwrap(),
            vec!["id".to_string(), "transcript".to_string()]
        );
    }

    #[test]
    fn explicit_columns_must_exist() {
        let t = table(vec![(
            "transcript",
            Arc::new(StringArray::from(vec!["hi"])) as ArrayRef,
        )]);
        let requested = vec!["transcript".to_string(), "phonemes".to_string()];
        match select_text_columns(&t, "audio", Some(&requested)) {
            Err(DatasetError::UnknownColumn { missing, .. }) => {
                assert_eq!(missing, vec!["phonemes".to_string()])
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn summary_size_in_megabytes() {
        let summary = DatasetSummary {
            total_files: 1,
            total_bytes: 3 * 1024 * 1024,
            columns: vec![],
            audio_column: "audio".into(),
            sample: RecordBatch::new_empty(Arc::new(Schema::empty())),
        };
        assert!((summary.file_size_mb() - 3.0).abs() < f64::EPSILON);
    }
}

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use walkdir::{DirEntry, WalkDir};

use super::model::Table;
use crate::error::{DatasetError, LoadError};

/// Extensions recognised as Parquet data files.
const DATA_EXTENSIONS: &[&str] = &["parquet", "pq"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a single Parquet file or from every Parquet file
/// under a directory.
///
/// Directory shards are concatenated in path order; all shards must share
/// the schema of the first one.
pub fn load_table(path: &Path, log_target: &str) -> Result<Table, DatasetError> {
    let files = if path.is_dir() {
        let files = find_data_files(path)?;
        if files.is_empty() {
            return Err(DatasetError::LoadFailed {
                path: path.to_path_buf(),
                source: LoadError::NoDataFiles {
                    dir: path.to_path_buf(),
                },
            });
        }
        files
    } else {
        if !is_data_file(path) {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(DatasetError::LoadFailed {
                path: path.to_path_buf(),
                source: LoadError::UnsupportedExtension(ext),
            });
        }
        vec![path.to_path_buf()]
    };

    info!(target: log_target, "Loading {} parquet file(s) from {}", files.len(), path.display());

    let mut reference: Option<(PathBuf, SchemaRef)> = None;
    let mut batches = Vec::new();

    for file in &files {
        let (schema, mut file_batches) = read_parquet(file).map_err(|source| {
            DatasetError::LoadFailed {
                path: file.clone(),
                source,
            }
        })?;
        debug!(
            target: log_target,
            "Read {} rows from {}",
            file_batches.iter().map(|b| b.num_rows()).sum::<usize>(),
            file.display()
        );

        match &reference {
            None => reference = Some((file.clone(), schema)),
            Some((first, expected)) => {
                if let Some(details) = schema_difference(expected, &schema) {
                    return Err(DatasetError::SchemaMismatch {
                        path: file.clone(),
                        reference: first.clone(),
                        details,
                    });
                }
            }
        }
        batches.append(&mut file_batches);
    }

    // `files` is non-empty, so a reference schema always exists here.
    let schema = match reference {
        Some((_, schema)) => schema,
        None => {
            return Err(DatasetError::LoadFailed {
                path: path.to_path_buf(),
                source: LoadError::NoDataFiles {
                    dir: path.to_path_buf(),
                },
            })
        }
    };

    // Later shards may carry different key/value metadata; rebuild every
    // batch against the reference schema so concatenation never trips on it.
    let batches = batches
        .into_iter()
        .map(|b| RecordBatch::try_new(schema.clone(), b.columns().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| DatasetError::LoadFailed {
            path: path.to_path_buf(),
            source: LoadError::Arrow {
                path: path.to_path_buf(),
                source,
            },
        })?;

    let table = Table::new(schema, batches);
    info!(
        target: log_target,
        "Loaded {} rows with columns [{}]",
        table.len(),
        table.columns().join(", ")
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Directory enumeration
// ---------------------------------------------------------------------------

/// Recursively list Parquet files under `dir`, sorted by path. Hidden
/// directories (including the `.cache` left by hub downloads) are skipped.
pub fn find_data_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            DatasetError::LoadFailed {
                path: dir.to_path_buf(),
                source: LoadError::Io {
                    path,
                    source: err.into(),
                },
            }
        })?;
        if entry.file_type().is_file() && is_data_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn is_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| DATA_EXTENSIONS.contains(&e.as_str()))
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

fn read_parquet(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|source| LoadError::Parquet {
            path: path.to_path_buf(),
            source,
        })?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    })?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| LoadError::Arrow {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((schema, batches))
}

/// Describe the first difference between two schemas, comparing field
/// names and data types in order. Returns `None` when they match.
fn schema_difference(expected: &SchemaRef, actual: &SchemaRef) -> Option<String> {
    let left = expected.fields();
    let right = actual.fields();
    if left.len() != right.len() {
        return Some(format!(
            "expected {} columns, found {}",
            left.len(),
            right.len()
        ));
    }
    left.iter()
        .zip(right.iter())
        .enumerate()
        .find_map(|(i, (a, b))| {
            if a.name() != b.name() {
                Some(format!(
                    "column {i} is named `{}`, expected `{}`",
                    b.name(),
                    a.name()
                ))
            } else if a.data_type() != b.data_type() {
                Some(format!(
                    "column `{}` has type {:?}, expected {:?}",
                    a.name(),
                    b.data_type(),
                    a.data_type()
                ))
            } else {
                None
            }
        })
}

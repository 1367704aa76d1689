use super::model::{CellValue, Row};
use crate::error::CellError;

/// Name of the struct field carrying the encoded audio payload.
pub const AUDIO_BYTES_FIELD: &str = "bytes";

/// Fields consulted, in order, for a row identifier.
pub const IDENTIFIER_FIELDS: &[&str] = &["id", "filename"];

/// Borrow the encoded audio payload out of a cell.
///
/// Accepts raw bytes, or a struct whose `bytes` field holds bytes. Anything
/// else (including a struct whose `bytes` field is null) is malformed.
pub fn audio_payload(value: &CellValue, row: usize) -> Result<&[u8], CellError> {
    match value {
        CellValue::Bytes(bytes) => Ok(bytes),
        CellValue::Struct(_) => match value.field(AUDIO_BYTES_FIELD) {
            Some(CellValue::Bytes(bytes)) => Ok(bytes),
            Some(other) => Err(CellError::MalformedAudio {
                row,
                found: other.kind(),
            }),
            None => Err(CellError::MalformedAudio {
                row,
                found: "struct without `bytes`",
            }),
        },
        other => Err(CellError::MalformedAudio {
            row,
            found: other.kind(),
        }),
    }
}

/// Resolve the base file name shared by every artifact derived from `row`.
///
/// Priority: the `preferred` column if given, then `id`, then `filename`,
/// then the zero-based row index. Null and empty values fall through. The
/// result is always a single path component (see [`path_component`]).
pub fn row_identifier(row: &Row<'_>, preferred: Option<&str>) -> String {
    preferred
        .into_iter()
        .chain(IDENTIFIER_FIELDS.iter().copied())
        .filter_map(|field| row.get(field))
        .filter(|value| !matches!(value, CellValue::Null))
        .find_map(|value| path_component(&value.to_string()))
        .unwrap_or_else(|| row.index.to_string())
}

/// Flatten `raw` into a file name that stays inside its parent directory.
///
/// Separators and NUL become `_`; a bare `.` or `..` has its dots replaced.
/// Returns `None` for an empty identifier.
pub fn path_component(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let flat: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    if flat == "." || flat == ".." {
        return Some(flat.replace('.', "_"));
    }
    Some(flat)
}

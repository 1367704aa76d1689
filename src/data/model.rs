use std::fmt;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use super::cell::cell_value;

/// Columns whose name starts with this prefix are internal bookkeeping
/// (e.g. pandas' `__index_level_0__`) and never extracted by default.
pub const RESERVED_PREFIX: &str = "__";

// ---------------------------------------------------------------------------
// CellValue – a single decoded cell
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the Arrow types found in
/// Hub datasets.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Struct value; fields keep their schema order.
    Struct(Vec<(String, CellValue)>),
    List(Vec<CellValue>),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Unsigned(u) => write!(f, "{u}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            CellValue::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            CellValue::List(items) => {
                write!(f, "[")?;
                for (i, value) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    /// `true` for values that carry no content: null, empty text, empty
    /// bytes, empty lists and structs. Numbers and booleans always count as
    /// content.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.is_empty(),
            CellValue::Bytes(b) => b.is_empty(),
            CellValue::Struct(fields) => fields.is_empty(),
            CellValue::List(items) => items.is_empty(),
            CellValue::Integer(_)
            | CellValue::Unsigned(_)
            | CellValue::Float(_)
            | CellValue::Bool(_) => false,
        }
    }

    /// Look up a named field of a struct value.
    pub fn field(&self, name: &str) -> Option<&CellValue> {
        match self {
            CellValue::Struct(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Short human-readable name of the value's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CellValue::String(_) => "string",
            CellValue::Integer(_) | CellValue::Unsigned(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::Bool(_) => "bool",
            CellValue::Bytes(_) => "bytes",
            CellValue::Struct(_) => "struct",
            CellValue::List(_) => "list",
            CellValue::Null => "null",
        }
    }
}

// ---------------------------------------------------------------------------
// Row – one decoded row of the table
// ---------------------------------------------------------------------------

/// One row of the table, values aligned with [`Table::columns`].
#[derive(Debug, Clone)]
pub struct Row<'a> {
    /// Zero-based position of the row in the whole table.
    pub index: usize,
    columns: &'a [String],
    values: Vec<CellValue>,
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }
}

// ---------------------------------------------------------------------------
// Table – the complete loaded dataset
// ---------------------------------------------------------------------------

/// Immutable tabular view over one or more Parquet files.
///
/// Rows are kept as the Arrow record batches they were read in and decoded
/// on iteration, so the audio payloads are held in memory once.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    columns: Vec<String>,
    batches: Vec<RecordBatch>,
    num_rows: usize,
}

impl Table {
    /// Build a table from batches that all share `schema`.
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        let columns = schema.fields().iter().map(|f| f.name().clone()).collect();
        let num_rows = batches.iter().map(|b| b.num_rows()).sum();
        Table {
            schema,
            columns,
            batches,
            num_rows,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Ordered column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.num_rows
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Iterate rows in table order, decoding every cell.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        let columns = self.columns.as_slice();
        let mut offset = 0usize;
        self.batches.iter().flat_map(move |batch| {
            let start = offset;
            offset += batch.num_rows();
            (0..batch.num_rows()).map(move |row| Row {
                index: start + row,
                columns,
                values: batch
                    .columns()
                    .iter()
                    .map(|col| cell_value(col.as_ref(), row))
                    .collect(),
            })
        })
    }

    /// Iterate the decoded values of a single column in table order.
    pub fn column_values<'a>(
        &'a self,
        column: &str,
    ) -> Option<impl Iterator<Item = CellValue> + 'a> {
        let idx = self.schema.index_of(column).ok()?;
        Some(self.batches.iter().flat_map(move |batch| {
            let col = batch.column(idx);
            (0..batch.num_rows()).map(move |row| cell_value(col.as_ref(), row))
        }))
    }

    /// The first `n` rows as a single record batch.
    pub fn head(&self, n: usize) -> Result<RecordBatch, ArrowError> {
        let mut taken = Vec::new();
        let mut remaining = n;
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let len = batch.num_rows().min(remaining);
            taken.push(batch.slice(0, len));
            remaining -= len;
        }
        concat_batches(&self.schema, &taken)
    }
}

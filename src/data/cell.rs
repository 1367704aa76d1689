use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::util::display::array_value_to_string;

use super::model::CellValue;

// ---------------------------------------------------------------------------
// Arrow → CellValue
// ---------------------------------------------------------------------------

/// Decode a single cell from an Arrow column at a given row.
///
/// Nested structs and lists are decoded recursively. Types without a
/// dedicated variant are rendered with Arrow's display formatter.
pub fn cell_value(col: &dyn Array, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Null => CellValue::Null,
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Binary => CellValue::Bytes(col.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => CellValue::Bytes(col.as_binary::<i64>().value(row).to_vec()),
        DataType::FixedSizeBinary(_) => {
            CellValue::Bytes(col.as_fixed_size_binary().value(row).to_vec())
        }
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        DataType::Int8 => CellValue::Integer(col.as_primitive::<Int8Type>().value(row) as i64),
        DataType::Int16 => CellValue::Integer(col.as_primitive::<Int16Type>().value(row) as i64),
        DataType::Int32 => CellValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => CellValue::Unsigned(col.as_primitive::<UInt8Type>().value(row) as u64),
        DataType::UInt16 => {
            CellValue::Unsigned(col.as_primitive::<UInt16Type>().value(row) as u64)
        }
        DataType::UInt32 => {
            CellValue::Unsigned(col.as_primitive::<UInt32Type>().value(row) as u64)
        }
        DataType::UInt64 => CellValue::Unsigned(col.as_primitive::<UInt64Type>().value(row)),
        DataType::Float16 => {
            CellValue::Float(col.as_primitive::<Float16Type>().value(row).to_f64())
        }
        DataType::Float32 => {
            CellValue::Float(col.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Struct(fields) => {
            let s = col.as_struct();
            let values = fields
                .iter()
                .zip(s.columns())
                .map(|(field, child)| (field.name().clone(), cell_value(child.as_ref(), row)))
                .collect();
            CellValue::Struct(values)
        }
        DataType::List(_) => list_value(col.as_list::<i32>().value(row).as_ref()),
        DataType::LargeList(_) => list_value(col.as_list::<i64>().value(row).as_ref()),
        other => match array_value_to_string(col, row) {
            Ok(text) => CellValue::String(text),
            Err(_) => CellValue::String(format!("<{other:?}>")),
        },
    }
}

fn list_value(items: &dyn Array) -> CellValue {
    CellValue::List((0..items.len()).map(|i| cell_value(items, i)).collect())
}

/// Whether a column of this type can hold an audio payload: raw binary,
/// or a struct with a binary `bytes` child.
pub fn is_audio_type(data_type: &DataType) -> bool {
    match data_type {
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => true,
        DataType::Struct(fields) => fields.iter().any(|f| {
            f.name() == "bytes"
                && matches!(f.data_type(), DataType::Binary | DataType::LargeBinary)
        }),
        _ => false,
    }
}

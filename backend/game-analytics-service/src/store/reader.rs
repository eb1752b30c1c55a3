//! Dataset decoding
//!
//! Parquet files (and directories of parquet parts) are decoded through the
//! arrow reader. Anything without the parquet magic is treated as CSV with a
//! header row.
use arrow_array::{
    Array, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, RecordBatch, StringArray, UInt16Array, UInt32Array,
    UInt64Array, UInt8Array,
};
use arrow_schema::{DataType, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{Scalar, Table};

const PARQUET_MAGIC: &[u8; 4] = b"PAR1";

/// pandas writes its index as extra columns with this prefix
const PANDAS_INDEX_PREFIX: &str = "__index_level_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Parquet,
    ParquetDir,
    Csv,
}

/// Decide how to read `path` by looking at what is on disk
pub fn detect_format(path: &Path) -> Result<SourceFormat> {
    let metadata = fs::metadata(path).map_err(|e| {
        AppError::DataUnavailable(format!("{}: {}", path.display(), e))
    })?;

    if metadata.is_dir() {
        return Ok(SourceFormat::ParquetDir);
    }

    let mut magic = [0u8; 4];
    let mut file = File::open(path)
        .map_err(|e| AppError::DataUnavailable(format!("{}: {}", path.display(), e)))?;
    let read = file.read(&mut magic)?;

    if read == PARQUET_MAGIC.len() && &magic == PARQUET_MAGIC {
        Ok(SourceFormat::Parquet)
    } else {
        Ok(SourceFormat::Csv)
    }
}

pub fn read_table(path: &Path) -> Result<Table> {
    match detect_format(path)? {
        SourceFormat::Parquet => read_parquet_file(path),
        SourceFormat::ParquetDir => read_parquet_dir(path),
        SourceFormat::Csv => read_csv(path),
    }
}

fn read_parquet_dir(dir: &Path) -> Result<Table> {
    let mut parts: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| AppError::DataUnavailable(format!("{}: {}", dir.display(), e)))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !n.starts_with('.') && !n.starts_with('_'))
                .unwrap_or(false)
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        return Err(AppError::DataUnavailable(format!(
            "{}: directory contains no parquet parts",
            dir.display()
        )));
    }

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for part in &parts {
        let table = read_parquet_file(part)?;
        match &columns {
            None => columns = Some(table.columns().to_vec()),
            Some(existing) if existing.as_slice() != table.columns() => {
                return Err(AppError::SchemaMismatch(format!(
                    "{}: columns differ from earlier parts",
                    part.display()
                )));
            }
            Some(_) => {}
        }
        rows.extend(table.raw_rows().iter().cloned());
    }

    Table::new(columns.unwrap_or_default(), rows)
}

pub fn read_parquet_file(path: &Path) -> Result<Table> {
    let file = File::open(path)
        .map_err(|e| AppError::DataUnavailable(format!("{}: {}", path.display(), e)))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let (keep, names) = data_columns(builder.schema());
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        append_batch(&batch, &keep, &mut rows).map_err(|e| annotate(e, path))?;
    }

    debug!(path = %path.display(), rows = rows.len(), "decoded parquet file");
    Table::with_schema(names, rows)
}

fn data_columns(schema: &Schema) -> (Vec<usize>, Arc<Vec<String>>) {
    let mut keep = Vec::new();
    let mut names = Vec::new();
    for (idx, field) in schema.fields().iter().enumerate() {
        if field.name().starts_with(PANDAS_INDEX_PREFIX) {
            continue;
        }
        keep.push(idx);
        names.push(field.name().clone());
    }
    (keep, Arc::new(names))
}

fn append_batch(batch: &RecordBatch, keep: &[usize], rows: &mut Vec<Vec<Scalar>>) -> Result<()> {
    let arrays: Vec<&dyn Array> = keep.iter().map(|&i| batch.column(i).as_ref()).collect();
    for row in 0..batch.num_rows() {
        let mut values = Vec::with_capacity(arrays.len());
        for array in &arrays {
            values.push(scalar_at(*array, row)?);
        }
        rows.push(values);
    }
    Ok(())
}

macro_rules! downcast_value {
    ($array:expr, $ty:ty, $row:expr) => {
        $array
            .as_any()
            .downcast_ref::<$ty>()
            .map(|a| a.value($row))
            .ok_or_else(|| {
                AppError::SchemaMismatch(format!("unexpected array for {:?}", $array.data_type()))
            })?
    };
}

fn scalar_at(array: &dyn Array, row: usize) -> Result<Scalar> {
    if array.is_null(row) {
        return Ok(Scalar::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Scalar::Null,
        DataType::Boolean => Scalar::Bool(downcast_value!(array, BooleanArray, row)),
        DataType::Int8 => Scalar::Int(downcast_value!(array, Int8Array, row).into()),
        DataType::Int16 => Scalar::Int(downcast_value!(array, Int16Array, row).into()),
        DataType::Int32 => Scalar::Int(downcast_value!(array, Int32Array, row).into()),
        DataType::Int64 => Scalar::Int(downcast_value!(array, Int64Array, row)),
        DataType::UInt8 => Scalar::Int(downcast_value!(array, UInt8Array, row).into()),
        DataType::UInt16 => Scalar::Int(downcast_value!(array, UInt16Array, row).into()),
        DataType::UInt32 => Scalar::Int(downcast_value!(array, UInt32Array, row).into()),
        DataType::UInt64 => {
            let v = downcast_value!(array, UInt64Array, row);
            i64::try_from(v)
                .map(Scalar::Int)
                .unwrap_or(Scalar::Float(v as f64))
        }
        DataType::Float32 => Scalar::Float(downcast_value!(array, Float32Array, row).into()),
        DataType::Float64 => Scalar::Float(downcast_value!(array, Float64Array, row)),
        DataType::Utf8 => Scalar::Str(downcast_value!(array, StringArray, row).to_string()),
        DataType::LargeUtf8 => {
            Scalar::Str(downcast_value!(array, LargeStringArray, row).to_string())
        }
        other => {
            return Err(AppError::SchemaMismatch(format!(
                "unsupported column type {:?}",
                other
            )))
        }
    };

    Ok(value)
}

fn annotate(err: AppError, path: &Path) -> AppError {
    match err {
        AppError::SchemaMismatch(msg) => {
            AppError::SchemaMismatch(format!("{}: {}", path.display(), msg))
        }
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvKind {
    Int,
    Float,
    Bool,
    Str,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Narrowest kind every non-empty cell of a column parses as
fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> CsvKind {
    let mut int = true;
    let mut float = true;
    let mut boolean = true;
    for cell in cells.filter(|c| !c.is_empty()) {
        int &= cell.parse::<i64>().is_ok();
        float &= cell.parse::<f64>().is_ok();
        boolean &= parse_bool(cell).is_some();
        if !int && !float && !boolean {
            return CsvKind::Str;
        }
    }
    if int {
        CsvKind::Int
    } else if float {
        CsvKind::Float
    } else if boolean {
        CsvKind::Bool
    } else {
        CsvKind::Str
    }
}

fn convert_cell(raw: &str, kind: CsvKind) -> Scalar {
    if raw.is_empty() {
        return Scalar::Null;
    }
    match kind {
        CsvKind::Int => raw.parse().map(Scalar::Int).unwrap_or(Scalar::Null),
        CsvKind::Float => raw.parse().map(Scalar::Float).unwrap_or(Scalar::Null),
        CsvKind::Bool => parse_bool(raw).map(Scalar::Bool).unwrap_or(Scalar::Null),
        CsvKind::Str => Scalar::Str(raw.to_string()),
    }
}

pub fn read_csv(path: &Path) -> Result<Table> {
    // Ragged rows reach the length check below instead of failing as I/O
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AppError::DataUnavailable(format!("{}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(AppError::SchemaMismatch(format!(
                "{}: record has {} fields, header has {}",
                path.display(),
                record.len(),
                headers.len()
            )));
        }
        records.push(record);
    }

    // An unnamed first column is the index pandas writes by default
    let skip_first = headers.first().map(|h| h.is_empty()).unwrap_or(false);
    let start = usize::from(skip_first);

    let kinds: Vec<CsvKind> = (start..headers.len())
        .map(|col| infer_kind(records.iter().map(|r| &r[col])))
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            (start..headers.len())
                .zip(&kinds)
                .map(|(col, kind)| convert_cell(&record[col], *kind))
                .collect()
        })
        .collect();

    debug!(path = %path.display(), rows = records.len(), "decoded csv file");
    Table::new(headers[start..].to_vec(), rows)
}

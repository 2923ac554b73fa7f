use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, instrument};

use super::{ColumnKind, Dataset, Value};
use crate::constants::{is_na_token, ALLOWED_SOURCE_EXTENSIONS};
use crate::error::{EtlError, Result};

/// Label used for sources that are not backed by a file path
const READER_SOURCE: &str = "<reader>";

/// True when the path carries an accepted source extension (case-insensitive).
pub fn is_allowed_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ALLOWED_SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Load a whole CSV file into memory. The first row is the header.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|e| EtlError::source_load(&label, e))?;
    let dataset = parse_dataset(file).map_err(|message| EtlError::source_load(&label, message))?;
    debug!(
        "Read {} rows x {} columns from {}",
        dataset.row_count(),
        dataset.column_count(),
        label
    );
    Ok(dataset)
}

pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<Dataset> {
    parse_dataset(reader).map_err(|message| EtlError::source_load(READER_SOURCE, message))
}

/// Write the dataset with a header row and no index column.
pub fn write_csv(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    write_csv_to_writer(dataset, file)?;
    debug!("Wrote {} rows to {}", dataset.row_count(), path.display());
    Ok(())
}

pub fn write_csv_to_writer<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(dataset.columns())?;
    for row in dataset.rows() {
        wtr.write_record(row.iter().map(Value::to_field))?;
    }
    wtr.flush()?;
    Ok(())
}

fn parse_dataset<R: Read>(reader: R) -> std::result::Result<Dataset, String> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let header: Vec<String> = rdr
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_owned)
        .collect();
    if header.is_empty() || header.iter().all(String::is_empty) {
        return Err("no columns to parse".to_string());
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| e.to_string())?;
        raw_rows.push(record.iter().map(str::to_owned).collect());
    }

    let kinds: Vec<ColumnKind> = (0..header.len())
        .map(|idx| infer_kind(raw_rows.iter().filter_map(|row| row.get(idx))))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(kinds.iter().copied())
                .map(|(raw, kind)| to_value(raw, kind))
                .collect()
        })
        .collect();

    Dataset::from_rows(header, rows).map_err(|e| e.to_string())
}

/// Integer only when every cell is an integer and none is missing; any other
/// all-numeric column widens to float; anything else stays text.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a String>) -> ColumnKind {
    let mut any_cell = false;
    let mut saw_missing = false;
    let mut all_integer = true;
    for raw in cells {
        any_cell = true;
        if is_na_token(raw) {
            saw_missing = true;
            continue;
        }
        match Value::parse_numeric(raw) {
            Some(Value::Integer(_)) => {}
            Some(_) => all_integer = false,
            None => return ColumnKind::Text,
        }
    }
    if !any_cell {
        ColumnKind::Text
    } else if all_integer && !saw_missing {
        ColumnKind::Integer
    } else {
        ColumnKind::Float
    }
}

fn to_value(raw: String, kind: ColumnKind) -> Value {
    if is_na_token(&raw) {
        return Value::Missing;
    }
    match (kind, Value::parse_numeric(&raw)) {
        (ColumnKind::Integer, Some(v)) => v,
        (ColumnKind::Float, Some(v)) => v.as_f64().map(Value::Float).unwrap_or(Value::Missing),
        _ => Value::Text(raw),
    }
}

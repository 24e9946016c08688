// CSV import/export: mapping files and row-set dumps

use std::io::{Read, Write};
use std::path::Path;

use settlegrid_recon::{Grid, Mapping, RowSet};

use crate::error::IoError;

pub const MAPPING_HEADERS: [&str; 2] = ["order_key", "catalog_key"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read file and convert to UTF-8 if needed.
///
/// A UTF-8 BOM is stripped. Files saved by Korean Excel are often EUC-KR
/// (CP949); those are decoded with the EUC-KR fallback.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let bytes = bytes.strip_prefix(UTF8_BOM).map(<[u8]>::to_vec).unwrap_or(bytes);
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = encoding_rs::EUC_KR.decode(&bytes);
            if had_errors {
                log::warn!("{}: not valid UTF-8 or EUC-KR; some characters were replaced", path.display());
            }
            Ok(decoded.into_owned())
        }
    }
}

/// Parse a mapping file. An empty `catalog_key` means "not matched".
///
/// Rows with a blank `order_key` are ignored; a repeated order key keeps its
/// last row.
pub fn mapping_from_str(content: &str) -> Result<Mapping, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| IoError::Csv(format!("mapping file has no '{name}' column")))
    };
    let order_col = position(MAPPING_HEADERS[0])?;
    let catalog_col = position(MAPPING_HEADERS[1])?;

    let mut mapping = Mapping::new();
    for record in reader.records() {
        let record = record?;
        let order_key = record.get(order_col).unwrap_or("").trim();
        if order_key.is_empty() {
            continue;
        }
        let target = record
            .get(catalog_col)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if mapping.insert(order_key.to_string(), target).is_some() {
            log::warn!("mapping file lists '{order_key}' more than once; the last row wins");
        }
    }
    Ok(mapping)
}

pub fn read_mapping(path: &Path) -> Result<Mapping, IoError> {
    mapping_from_str(&read_file_as_utf8(path)?)
}

/// Write a mapping template, one order key per row, with a BOM so
/// spreadsheet apps open it as UTF-8.
pub fn write_mapping(path: &Path, mapping: &Mapping) -> Result<(), IoError> {
    let mut writer = bom_writer(path)?;
    writer.write_record(MAPPING_HEADERS)?;
    for (order_key, target) in mapping {
        writer.write_record([order_key.as_str(), target.as_deref().unwrap_or("")])?;
    }
    writer.flush().map_err(|e| IoError::Write(e.to_string()))?;
    Ok(())
}

/// Labels then data rows.
pub fn write_row_set<W: Write>(out: W, rows: &RowSet) -> Result<(), IoError> {
    write_grid(out, &rows.to_grid())
}

/// Raw grid dump. Rows may have different widths.
pub fn write_grid<W: Write>(out: W, grid: &Grid) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(out);
    for row in grid {
        writer.write_record(row.iter().map(|c| c.display()))?;
    }
    writer.flush().map_err(|e| IoError::Write(e.to_string()))?;
    Ok(())
}

pub fn export_row_set(path: &Path, rows: &RowSet) -> Result<(), IoError> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| IoError::Write(format!("{}: {e}", path.display())))?;
    file.write_all(UTF8_BOM)
        .map_err(|e| IoError::Write(e.to_string()))?;
    write_row_set(file, rows)
}

fn bom_writer(path: &Path) -> Result<csv::Writer<std::fs::File>, IoError> {
    let mut file = std::fs::File::create(path)
        .map_err(|e| IoError::Write(format!("{}: {e}", path.display())))?;
    file.write_all(UTF8_BOM)
        .map_err(|e| IoError::Write(e.to_string()))?;
    Ok(csv::Writer::from_writer(file))
}

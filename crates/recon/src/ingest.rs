//! Order ingestion: concatenate per-file row-sets, tagging provenance.
//!
//! Decoding happens outside this crate; each source arrives as a decoded
//! row-set or the reason it could not be decoded. A failed file is recorded
//! and skipped, the rest of the batch still loads.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{CellValue, Outcome, RowSet, SOURCE_FILE_COLUMN};

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xls", "xlsm", "ods"];

/// One order file as handed over by the decoder.
#[derive(Debug)]
pub struct SourceFile {
    pub name: String,
    pub rows: Result<RowSet, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub name: String,
    /// Rows loaded from this file, or why it was skipped.
    pub outcome: Outcome<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub rows: RowSet,
    pub files: Vec<SourceOutcome>,
}

impl IngestReport {
    pub fn loaded_files(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_applied()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.files.iter().filter(|f| !f.outcome.is_applied())
    }
}

pub fn is_spreadsheet_name(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        SPREADSHEET_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    })
}

/// Concatenate sources in order. Columns are the union in first-seen order;
/// each file's rows gain a `__source_file__` column holding the file name.
pub fn concat_sources<I>(sources: I) -> IngestReport
where
    I: IntoIterator<Item = SourceFile>,
{
    let mut report = IngestReport::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for source in sources {
        let outcome = if !is_spreadsheet_name(&source.name) {
            Outcome::skipped("not a spreadsheet file")
        } else {
            match source.rows {
                Ok(rows) => {
                    let count = rows.len();
                    append(&mut report.rows, &mut positions, rows, &source.name);
                    Outcome::Applied(count)
                }
                Err(reason) => Outcome::Skipped { reason },
            }
        };

        if let Outcome::Skipped { ref reason } = outcome {
            log::warn!("skipping order file '{}': {reason}", source.name);
        }
        report.files.push(SourceOutcome {
            name: source.name,
            outcome,
        });
    }

    log::info!(
        "loaded {} order rows from {} of {} files",
        report.rows.len(),
        report.loaded_files(),
        report.files.len()
    );
    report
}

fn append(target: &mut RowSet, positions: &mut HashMap<String, usize>, rows: RowSet, name: &str) {
    let mut columns = rows.columns;
    columns.push(SOURCE_FILE_COLUMN.to_string());

    let mapping: Vec<usize> = columns
        .into_iter()
        .map(|col| {
            *positions.entry(col.clone()).or_insert_with(|| {
                target.columns.push(col);
                target.columns.len() - 1
            })
        })
        .collect();

    let width = target.columns.len();
    for row in target.rows.iter_mut() {
        row.resize(width, CellValue::Empty);
    }

    for row in rows.rows {
        let mut out = vec![CellValue::Empty; width];
        let tagged = row.into_iter().chain(std::iter::once(CellValue::from(name)));
        for (cell, &pos) in tagged.zip(&mapping) {
            out[pos] = cell;
        }
        target.rows.push(out);
    }
}

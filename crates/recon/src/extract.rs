//! Catalog table extraction.
//!
//! Catalog sheets carry a title block, notes and merged header cells above the
//! real table, and footnotes below it. Extraction finds the header row, repairs
//! the column labels, and keeps the first contiguous run of numbered rows.
//! Any structural mismatch yields an empty row-set rather than an error; the
//! caller falls back to showing the raw grid.

use std::collections::HashSet;

use crate::model::{CellValue, Grid, RowSet};

/// Only the top of the sheet is searched for the header.
pub const HEADER_SCAN_ROWS: usize = 30;

const NO_MARKER: &str = "NO";
const CATEGORY_MARKERS: [&str; 2] = ["카테고리", "분류"];
const REQUIRED_MARKERS: [&str; 3] = ["NO", "카테고리", "상품명"];
const CONTINUATION_MARKER: char = '_';
const UNNAMED_PREFIX: &str = "Unnamed";
const MERGE_ARTIFACT_COLUMNS: [&str; 2] = ["상품명_", "구성_"];

/// Extract the catalog table from a raw grid. Empty result = no usable table.
pub fn extract(grid: &Grid) -> RowSet {
    if grid.is_empty() {
        return RowSet::default();
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);

    let (labels, body) = match find_header_row(grid) {
        Some(idx) => {
            log::debug!("catalog header found at row {idx}");
            let raw = (0..width).map(|c| cell_at(&grid[idx], c).display());
            (dedupe_labels(raw), &grid[idx + 1..])
        }
        None => {
            log::warn!(
                "no catalog header within the first {HEADER_SCAN_ROWS} rows; using the first row as labels"
            );
            let raw = (0..width).map(|c| {
                let label = cell_at(&grid[0], c).trimmed();
                if label.is_empty() {
                    format!("{UNNAMED_PREFIX}: {c}")
                } else {
                    label
                }
            });
            (dedupe_labels(raw), &grid[1..])
        }
    };

    let Some(no_idx) = locate_no_column(&labels) else {
        log::warn!("catalog table has no '{NO_MARKER}' column");
        return RowSet::default();
    };
    let mut labels = labels;
    labels[no_idx] = NO_MARKER.to_string();

    let Some((start, end)) = numbered_run(body, no_idx) else {
        log::warn!("catalog table has no numbered rows");
        return RowSet::default();
    };
    log::debug!("catalog rows {start}..{end} of {} kept", body.len());

    let keep: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| !is_dropped_column(label))
        .map(|(i, _)| i)
        .collect();

    let mut out = RowSet::new(keep.iter().map(|&i| labels[i].clone()).collect());
    for row in &body[start..end] {
        out.push_row(keep.iter().map(|&c| cell_at(row, c).clone()).collect());
    }
    out
}

/// First row within the scan window that looks like the catalog header.
///
/// Accepts `NO` with a category marker, or any two of the required markers.
pub fn find_header_row(grid: &Grid) -> Option<usize> {
    grid.iter().take(HEADER_SCAN_ROWS).position(|row| {
        let values: HashSet<String> = row.iter().map(CellValue::trimmed).collect();
        let exact = values.contains(NO_MARKER)
            && CATEGORY_MARKERS.iter().any(|m| values.contains(*m));
        let loose = REQUIRED_MARKERS
            .iter()
            .filter(|m| values.contains(**m))
            .count()
            >= 2;
        exact || loose
    })
}

/// Trim labels, turn blanks into continuations of the previous label, then
/// suffix exact duplicates until every label is unique.
pub fn dedupe_labels<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut used = HashSet::new();
    let mut last_non_empty: Option<String> = None;
    let mut out = Vec::new();

    for label in raw {
        let mut s = label.trim().to_string();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") {
            s = match &last_non_empty {
                Some(prev) => format!("{prev}{CONTINUATION_MARKER}"),
                None => CONTINUATION_MARKER.to_string(),
            };
        } else {
            last_non_empty = Some(s.clone());
        }
        while used.contains(&s) {
            s.push(CONTINUATION_MARKER);
        }
        used.insert(s.clone());
        out.push(s);
    }
    out
}

fn locate_no_column(labels: &[String]) -> Option<usize> {
    if let Some(idx) = labels.iter().position(|l| l == NO_MARKER) {
        return Some(idx);
    }
    labels
        .first()
        .filter(|l| l.trim().to_uppercase() == NO_MARKER)
        .map(|_| 0)
}

/// `[start, end)` of the first maximal run of rows with a numeric NO cell.
fn numbered_run(body: &[Vec<CellValue>], no_idx: usize) -> Option<(usize, usize)> {
    let is_numbered = |row: &Vec<CellValue>| cell_at(row, no_idx).as_number().is_some();
    let start = body.iter().position(is_numbered)?;
    let end = body[start..]
        .iter()
        .position(|row| !is_numbered(row))
        .map_or(body.len(), |rel| start + rel);
    Some((start, end))
}

fn is_dropped_column(label: &str) -> bool {
    label.starts_with(UNNAMED_PREFIX)
        || label.trim_matches(CONTINUATION_MARKER).trim().is_empty()
        || MERGE_ARTIFACT_COLUMNS.contains(&label)
}

fn cell_at(row: &[CellValue], col: usize) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    row.get(col).unwrap_or(&EMPTY)
}

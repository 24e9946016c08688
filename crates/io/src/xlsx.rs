// Spreadsheet decoding (xlsx, xls, xlsm, ods) into grids and row-sets

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use settlegrid_recon::ingest::{concat_sources, is_spreadsheet_name, IngestReport, SourceFile};
use settlegrid_recon::{CellValue, Grid, RowSet};

use crate::error::IoError;

/// Decode one sheet of a workbook file into a raw grid.
///
/// Grid coordinates match sheet coordinates: a range that starts below or
/// right of A1 is padded with empty cells.
pub fn read_grid(path: &Path, sheet: usize) -> Result<Grid, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    sheet_grid(&mut workbook, sheet)
}

/// Decode one sheet of an in-memory workbook.
pub fn grid_from_bytes(bytes: &[u8], sheet: usize) -> Result<Grid, IoError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| IoError::Open {
        path: "<memory>".into(),
        message: e.to_string(),
    })?;
    sheet_grid(&mut workbook, sheet)
}

/// Sheet names in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>, IoError> {
    let workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(workbook.sheet_names())
}

fn sheet_grid<RS: Read + Seek>(workbook: &mut Sheets<RS>, sheet: usize) -> Result<Grid, IoError> {
    let count = workbook.sheet_names().len();
    let range = workbook
        .worksheet_range_at(sheet)
        .ok_or_else(|| IoError::Sheet {
            sheet: sheet.to_string(),
            message: format!("no such sheet; the workbook has {count}"),
        })?
        .map_err(|e| IoError::Sheet {
            sheet: sheet.to_string(),
            message: e.to_string(),
        })?;
    Ok(range_to_grid(&range))
}

fn range_to_grid(range: &Range<Data>) -> Grid {
    let Some((start_row, start_col)) = range.start() else {
        return Grid::new();
    };

    let mut grid: Grid = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut out = vec![CellValue::Empty; start_col as usize];
        out.extend(row.iter().map(to_cell));
        grid.push(out);
    }
    grid
}

fn to_cell(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        // Stored as TRUE/FALSE text, like a spreadsheet shows it
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => CellValue::text(format!("#{e:?}")),
        // Dates stay serial numbers
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from(s.as_str()),
    }
}

/// First row as labels, remaining non-blank rows as data.
///
/// Blank labels become `Unnamed: {i}`; repeated labels get `.1`, `.2`, ...
pub fn grid_to_row_set(grid: &Grid) -> RowSet {
    let Some((header, body)) = grid.split_first() else {
        return RowSet::default();
    };
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);

    let mut seen: HashMap<String, usize> = HashMap::new();
    let labels = (0..width)
        .map(|i| {
            let label = header.get(i).map(CellValue::trimmed).unwrap_or_default();
            let label = if label.is_empty() {
                format!("Unnamed: {i}")
            } else {
                label
            };
            let n = seen.entry(label.clone()).or_insert(0);
            let out = if *n == 0 {
                label
            } else {
                format!("{label}.{n}")
            };
            *n += 1;
            out
        })
        .collect();

    let mut rows = RowSet::new(labels);
    for row in body.iter().filter(|r| !r.iter().all(CellValue::is_empty)) {
        rows.push_row(row.clone());
    }
    rows
}

/// Decode the first sheet of a workbook as a labelled row-set.
pub fn read_row_set(path: &Path) -> Result<RowSet, IoError> {
    read_grid(path, 0).map(|grid| grid_to_row_set(&grid))
}

/// Decode and concatenate order files. A file that fails to decode is
/// recorded as skipped; the rest still load.
pub fn load_order_files<P: AsRef<Path>>(paths: &[P]) -> IngestReport {
    let sources = paths.iter().map(|p| {
        let path = p.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let rows = if is_spreadsheet_name(&name) {
            read_row_set(path).map_err(|e| e.to_string())
        } else {
            Err("not a spreadsheet file".to_string())
        };
        SourceFile { name, rows }
    });
    concat_sources(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use settlegrid_recon::model::SOURCE_FILE_COLUMN;
    use settlegrid_recon::Outcome;

    fn order_workbook(rows: &[(&str, &str, f64)]) -> Vec<u8> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        for (c, label) in ["주문번호", "상품명", "수량"].iter().enumerate() {
            ws.write_string(0, c as u16, *label).unwrap();
        }
        for (r, (id, name, qty)) in rows.iter().enumerate() {
            let r = r as u32 + 1;
            ws.write_string(r, 0, *id).unwrap();
            ws.write_string(r, 1, *name).unwrap();
            ws.write_number(r, 2, *qty).unwrap();
        }
        wb.save_to_buffer().unwrap()
    }

    #[test]
    fn test_grid_keeps_sheet_coordinates() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(2, 1, "NO").unwrap();
        ws.write_number(3, 1, 1).unwrap();
        ws.write_boolean(3, 2, true).unwrap();
        let bytes = wb.save_to_buffer().unwrap();

        let grid = grid_from_bytes(&bytes, 0).unwrap();
        assert_eq!(grid.len(), 4);
        assert!(grid[0].is_empty());
        assert_eq!(grid[2][1], CellValue::text("NO"));
        assert_eq!(grid[3][0], CellValue::Empty);
        assert_eq!(grid[3][1], CellValue::Number(1.0));
        assert_eq!(grid[3][2], CellValue::text("TRUE"));
    }

    #[test]
    fn test_missing_sheet_is_an_error() {
        let bytes = order_workbook(&[]);
        assert!(matches!(grid_from_bytes(&bytes, 3), Err(IoError::Sheet { .. })));
    }

    #[test]
    fn test_sheet_names_in_workbook_order() {
        let mut wb = Workbook::new();
        wb.add_worksheet().set_name("상품표").unwrap();
        wb.add_worksheet().set_name("메모").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.xlsx");
        wb.save(&path).unwrap();

        assert_eq!(sheet_names(&path).unwrap(), vec!["상품표", "메모"]);
        let err = read_grid(&path, 2).unwrap_err();
        assert!(err.to_string().contains("the workbook has 2"));
    }

    #[test]
    fn test_row_set_labels_are_repaired() {
        let grid = vec![
            vec![CellValue::text("a"), CellValue::Empty, CellValue::text("a")],
            vec![CellValue::Number(1.0)],
            vec![],
            vec![CellValue::Number(2.0), CellValue::text("x")],
        ];
        let rows = grid_to_row_set(&grid);
        assert_eq!(rows.columns, vec!["a", "Unnamed: 1", "a.1"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.cell(1, 1), &CellValue::text("x"));
    }

    #[test]
    fn test_load_order_files_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("발주서_250601_셀러_사과.xlsx");
        std::fs::write(&good, order_workbook(&[("A", "사과", 2.0), ("B", "배", 1.0)])).unwrap();
        let broken = dir.path().join("broken.xlsx");
        std::fs::write(&broken, b"not a workbook").unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();

        let report = load_order_files(&[good, broken, notes]);
        assert_eq!(report.loaded_files(), 1);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(
            report.rows.columns,
            vec!["주문번호", "상품명", "수량", SOURCE_FILE_COLUMN]
        );
        assert_eq!(report.rows.cell(0, 3), &CellValue::text("발주서_250601_셀러_사과.xlsx"));
        assert_eq!(report.rows.cell(1, 2), &CellValue::Number(1.0));

        assert!(matches!(report.files[1].outcome, Outcome::Skipped { .. }));
        assert_eq!(
            report.files[2].outcome,
            Outcome::Skipped {
                reason: "not a spreadsheet file".into()
            }
        );
    }
}

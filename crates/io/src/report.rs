// Settlement report workbook: a formatted summary sheet plus a raw dump

use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use settlegrid_recon::config::ReportConfig;
use settlegrid_recon::model::FINANCE_COLUMNS;
use settlegrid_recon::{CellValue, FinanceRow, SettledRowSet};

use crate::error::IoError;

pub const RAW_SHEET_NAME: &str = "raw";

const BAND_LABEL: &str = "정산내역";
const SUBTOTAL_LABEL: &str = "소계";
const TOTAL_LABEL: &str = "계";
const FINAL_LABEL: &str = "실 정산액";

// Zero-based sheet coordinates. The table spans columns B..H.
const FIRST_COL: u16 = 1;
const LAST_COL: u16 = FIRST_COL + FINANCE_COLUMNS.len() as u16 - 1;
const TITLE_ROW: u32 = 1;
const BRAND_ROW: u32 = 2;
const DIVIDER_ROW: u32 = 3;
const BAND_ROW: u32 = 5;
const HEADER_ROW: u32 = 6;
const DATA_ROW: u32 = 7;

// Column offsets (from B) summed in the subtotal row: quantity, sale total, settlement.
const QUANTITY_OFFSET: u16 = 2;
const SALE_TOTAL_OFFSET: u16 = 4;
const SETTLEMENT_OFFSET: u16 = 6;

const COLUMN_WIDTHS: [f64; 7] = [22.0, 38.0, 10.0, 14.0, 20.0, 16.0, 18.0];

const GREY: u32 = 0x808080;
const LIGHT_GREY: u32 = 0xEDEDED;
const TOTAL_FILL: u32 = 0xFFD966;
const FINAL_FILL: u32 = 0xFFC000;
const AMOUNT_FORMAT: &str = "#,##0";
const CURRENCY_FORMAT: &str = "₩#,##0";

/// Row positions of one summary sheet, derived from the row and note counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLayout {
    pub rows: u32,
    pub subtotal_row: u32,
    pub total_row: u32,
    pub final_row: u32,
    pub notes_row: u32,
    pub closing_divider_row: u32,
}

impl SummaryLayout {
    pub fn new(rows: usize, notes: usize) -> Self {
        let rows = rows as u32;
        let subtotal_row = DATA_ROW + rows;
        let total_row = subtotal_row + 1;
        let final_row = total_row + 3;
        let notes_row = final_row + 2;
        Self {
            rows,
            subtotal_row,
            total_row,
            final_row,
            notes_row,
            closing_divider_row: notes_row + notes as u32,
        }
    }

    /// `SUM` over the data rows of one column, or `None` when there are none.
    fn sum(&self, col: u16) -> Option<String> {
        (self.rows > 0).then(|| {
            format!(
                "=SUM({}:{})",
                cell_ref(DATA_ROW, col),
                cell_ref(DATA_ROW + self.rows - 1, col)
            )
        })
    }

    /// Thick outer border around the band..total block.
    fn frame(&self, format: &Format, row: u32, first_col: u16, last_col: u16) -> Format {
        let mut f = format.clone();
        if first_col == FIRST_COL {
            f = f.set_border_left(FormatBorder::Medium);
        }
        if last_col == LAST_COL {
            f = f.set_border_right(FormatBorder::Medium);
        }
        if row == BAND_ROW {
            f = f.set_border_top(FormatBorder::Medium);
        }
        if row == self.total_row {
            f = f.set_border_bottom(FormatBorder::Medium);
        }
        f
    }
}

struct Styles {
    title: Format,
    brand: Format,
    divider: Format,
    band: Format,
    header: Format,
    label: Format,
    text: Format,
    amount: Format,
    subtotal_label: Format,
    subtotal_amount: Format,
    total_label: Format,
    total_amount: Format,
    final_label: Format,
    final_amount: Format,
    raw_header: Format,
}

impl Styles {
    fn new() -> Self {
        let thin = Format::new().set_border(FormatBorder::Thin);
        let amount = thin
            .clone()
            .set_num_format(AMOUNT_FORMAT)
            .set_align(FormatAlign::Right)
            .set_align(FormatAlign::VerticalCenter);
        let centered_bold = thin
            .clone()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let thick = Format::new().set_border(FormatBorder::Medium);

        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(25)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            brand: Format::new().set_font_size(10),
            divider: Format::new().set_border_bottom(FormatBorder::Medium),
            band: Format::new()
                .set_bold()
                .set_font_size(10)
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(GREY))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            header: centered_bold
                .clone()
                .set_background_color(Color::RGB(LIGHT_GREY)),
            label: thin
                .clone()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            text: thin.clone().set_align(FormatAlign::VerticalCenter),
            subtotal_label: centered_bold
                .clone()
                .set_background_color(Color::RGB(LIGHT_GREY)),
            subtotal_amount: amount
                .clone()
                .set_background_color(Color::RGB(LIGHT_GREY)),
            total_label: centered_bold
                .clone()
                .set_background_color(Color::RGB(TOTAL_FILL)),
            total_amount: amount
                .clone()
                .set_background_color(Color::RGB(TOTAL_FILL)),
            final_label: thick
                .clone()
                .set_bold()
                .set_font_size(12)
                .set_background_color(Color::RGB(FINAL_FILL))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            final_amount: thick
                .set_bold()
                .set_num_format(CURRENCY_FORMAT)
                .set_align(FormatAlign::Right)
                .set_align(FormatAlign::VerticalCenter),
            amount,
            raw_header: Format::new().set_bold(),
        }
    }
}

/// Builds the settlement report workbook.
pub struct ReportAssembler {
    config: ReportConfig,
}

impl ReportAssembler {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Workbook bytes: the summary sheet, then the `raw` settled-row dump.
    pub fn assemble(&self, summary: &[FinanceRow], settled: &SettledRowSet) -> Result<Vec<u8>, IoError> {
        let styles = Styles::new();
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet().set_name(&self.config.sheet_name)?;
        self.write_summary(sheet, summary, &styles)?;

        let raw = workbook.add_worksheet().set_name(RAW_SHEET_NAME)?;
        write_raw(raw, settled, &styles)?;

        Ok(workbook.save_to_buffer()?)
    }

    /// Assemble and write to `path`.
    pub fn write(&self, path: &Path, summary: &[FinanceRow], settled: &SettledRowSet) -> Result<(), IoError> {
        let bytes = self.assemble(summary, settled)?;
        std::fs::write(path, bytes)
            .map_err(|e| IoError::Write(format!("{}: {e}", path.display())))?;
        log::info!("report written to {}", path.display());
        Ok(())
    }

    fn write_summary(&self, ws: &mut Worksheet, summary: &[FinanceRow], s: &Styles) -> Result<(), IoError> {
        let layout = SummaryLayout::new(summary.len(), self.config.notes.len());

        // Title block
        ws.merge_range(TITLE_ROW, FIRST_COL, TITLE_ROW, LAST_COL, &self.config.title, &s.title)?;
        if let Some(brand) = &self.config.brand {
            ws.write_string_with_format(BRAND_ROW, FIRST_COL, brand, &s.brand)?;
        }
        divider(ws, DIVIDER_ROW, &s.divider)?;

        // Band and column header
        ws.merge_range(
            BAND_ROW,
            FIRST_COL,
            BAND_ROW,
            LAST_COL,
            BAND_LABEL,
            &layout.frame(&s.band, BAND_ROW, FIRST_COL, LAST_COL),
        )?;
        for (i, label) in FINANCE_COLUMNS.iter().enumerate() {
            let col = FIRST_COL + i as u16;
            ws.write_string_with_format(HEADER_ROW, col, *label, &layout.frame(&s.header, HEADER_ROW, col, col))?;
        }

        // Data rows. The product label column is one merged cell when it spans rows.
        let merge_label = summary.len() >= 2;
        for (i, row) in summary.iter().enumerate() {
            let r = DATA_ROW + i as u32;
            for (j, cell) in row.cells().iter().enumerate() {
                let col = FIRST_COL + j as u16;
                if j == 0 && merge_label {
                    continue;
                }
                let base = match j {
                    0 => &s.label,
                    1 => &s.text,
                    _ => &s.amount,
                };
                write_cell(ws, r, col, cell, &layout.frame(base, r, col, col))?;
            }
        }
        if merge_label {
            let last = DATA_ROW + layout.rows - 1;
            ws.merge_range(
                DATA_ROW,
                FIRST_COL,
                last,
                FIRST_COL,
                &summary[0].product_label,
                &layout.frame(&s.label, DATA_ROW, FIRST_COL, FIRST_COL),
            )?;
        }

        // Subtotal
        let sub = layout.subtotal_row;
        ws.merge_range(
            sub,
            FIRST_COL,
            sub,
            FIRST_COL + 1,
            SUBTOTAL_LABEL,
            &layout.frame(&s.subtotal_label, sub, FIRST_COL, FIRST_COL + 1),
        )?;
        for offset in QUANTITY_OFFSET..=SETTLEMENT_OFFSET {
            let col = FIRST_COL + offset;
            let format = layout.frame(&s.subtotal_amount, sub, col, col);
            if matches!(offset, QUANTITY_OFFSET | SALE_TOTAL_OFFSET | SETTLEMENT_OFFSET) {
                write_sum(ws, sub, col, layout.sum(col), &format)?;
            } else {
                ws.write_blank(sub, col, &format)?;
            }
        }

        // Grand total
        let total = layout.total_row;
        let settlement_col = FIRST_COL + SETTLEMENT_OFFSET;
        ws.merge_range(
            total,
            FIRST_COL,
            total,
            LAST_COL - 1,
            TOTAL_LABEL,
            &layout.frame(&s.total_label, total, FIRST_COL, LAST_COL - 1),
        )?;
        write_sum(
            ws,
            total,
            LAST_COL,
            layout.sum(settlement_col),
            &layout.frame(&s.total_amount, total, LAST_COL, LAST_COL),
        )?;

        // Final amount box
        let fin = layout.final_row;
        ws.merge_range(fin, FIRST_COL, fin, FIRST_COL + 1, FINAL_LABEL, &s.final_label)?;
        ws.merge_range(fin, FIRST_COL + 2, fin, LAST_COL, "", &s.final_amount)?;
        write_sum(ws, fin, FIRST_COL + 2, layout.sum(settlement_col), &s.final_amount)?;

        divider(ws, fin + 1, &s.divider)?;
        for (i, note) in self.config.notes.iter().enumerate() {
            ws.write_string(layout.notes_row + i as u32, FIRST_COL, note)?;
        }
        divider(ws, layout.closing_divider_row, &s.divider)?;

        for (i, width) in COLUMN_WIDTHS.iter().enumerate() {
            ws.set_column_width(FIRST_COL + i as u16, *width)?;
        }
        Ok(())
    }
}

fn write_raw(ws: &mut Worksheet, settled: &SettledRowSet, s: &Styles) -> Result<(), IoError> {
    let rows = settled.to_row_set();
    for (c, label) in rows.columns.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, label, &s.raw_header)?;
    }
    let plain = Format::new();
    for (r, row) in rows.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                write_cell(ws, r as u32 + 1, c as u16, cell, &plain)?;
            }
        }
    }
    Ok(())
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &CellValue, format: &Format) -> Result<(), IoError> {
    match cell {
        CellValue::Empty => ws.write_blank(row, col, format)?,
        CellValue::Text(t) => ws.write_string_with_format(row, col, t, format)?,
        CellValue::Number(n) => ws.write_number_with_format(row, col, *n, format)?,
    };
    Ok(())
}

fn write_sum(ws: &mut Worksheet, row: u32, col: u16, formula: Option<String>, format: &Format) -> Result<(), IoError> {
    match formula {
        Some(f) => ws.write_formula_with_format(row, col, f.as_str(), format)?,
        None => ws.write_number_with_format(row, col, 0, format)?,
    };
    Ok(())
}

fn divider(ws: &mut Worksheet, row: u32, format: &Format) -> Result<(), IoError> {
    for col in FIRST_COL..=LAST_COL {
        ws.write_blank(row, col, format)?;
    }
    Ok(())
}

/// A1-style reference for zero-based coordinates.
fn cell_ref(row: u32, col: u16) -> String {
    format!("{}{}", col_to_letter(col), row + 1)
}

/// Column index to letters (0 = A, 25 = Z, 26 = AA).
fn col_to_letter(col: u16) -> String {
    let mut out = String::new();
    let mut n = col as u32 + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        out.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out
}

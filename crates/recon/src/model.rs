use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Catalog column holding the product name.
pub const CATALOG_PRODUCT_FIELD: &str = "상품명";
/// Catalog column holding the composition (option) of a product.
pub const CATALOG_COMPOSITION_FIELD: &str = "구성";
/// Catalog column holding the group-buy sale price per unit.
pub const CATALOG_SALE_PRICE_FIELD: &str = "공구판매가";
/// Catalog column holding the supply (cost) price per unit, VAT included.
pub const CATALOG_COST_PRICE_FIELD: &str = "공급가(vat포함)";
/// Provenance column appended to every ingested order row.
pub const SOURCE_FILE_COLUMN: &str = "__source_file__";

/// Derived columns appended to the order columns of a settled row-set.
pub const SETTLED_COLUMNS: [&str; 8] = [
    "매칭상품",
    "공구판매가",
    "공급가(vat포함)",
    "공급가합계(vat포함)",
    "공구판매가합계(vat포함)",
    "정산금액(vat포함)",
    "배송비",
    "도서산간배송비",
];

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// An untyped scalar decoded from a spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            Self::Number(n) => n.is_nan(),
        }
    }

    /// Display string. Integral numbers print without a fraction.
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) if n.is_nan() => String::new(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }

    pub fn trimmed(&self) -> String {
        self.display().trim().to_string()
    }

    /// Numeric coercion. Text is trimmed and parsed; anything else is `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Empty => return None,
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Numeric coercion with absent values mapped to zero.
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

/// A raw 2-D cell grid, as decoded from a spreadsheet. No schema.
pub type Grid = Vec<Vec<CellValue>>;

// ---------------------------------------------------------------------------
// Row-sets
// ---------------------------------------------------------------------------

/// Labelled rows. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row, padding with empty cells or truncating to the column count.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(row);
    }

    /// Cell at `(row, col)`, or an empty cell when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Header row followed by the data rows.
    pub fn to_grid(&self) -> Grid {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.columns.iter().map(|c| CellValue::from(c.as_str())).collect());
        grid.extend(self.rows.iter().cloned());
        grid
    }
}

/// Best-effort step result: applied with a payload, or skipped with a cause.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<T> {
    Applied(T),
    Skipped { reason: String },
}

impl<T> Outcome<T> {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// One order row enriched with its catalog match and monetary fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettledRow {
    /// Original order-row cells, aligned with `SettledRowSet::columns`.
    pub fields: Vec<CellValue>,
    pub matched_catalog_key: Option<String>,
    pub unit_sale_price: f64,
    pub unit_cost_price: f64,
    pub line_cost_total: f64,
    pub line_sale_total: f64,
    pub settlement_amount: f64,
    pub shipping_fee: i64,
    pub remote_area_fee: i64,
}

/// Data-quality findings surfaced alongside a settlement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// Several catalog rows share one key; the first one in catalog order is used.
    DuplicateCatalogKey { key: String, rows: usize },
    /// The catalog lacks the columns needed to build keys; nothing can match.
    CatalogKeyColumnsMissing,
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateCatalogKey { key, rows } => {
                write!(f, "catalog key '{key}' appears in {rows} rows; using the first")
            }
            Self::CatalogKeyColumnsMissing => write!(
                f,
                "catalog has no '{CATALOG_PRODUCT_FIELD}'/'{CATALOG_COMPOSITION_FIELD}' columns; no rows can match"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettledRowSet {
    /// Original order columns.
    pub columns: Vec<String>,
    pub rows: Vec<SettledRow>,
    pub warnings: Vec<DataWarning>,
    /// `None` when shipping is not configured; otherwise rows charged or why skipped.
    pub shipping: Option<Outcome<usize>>,
    /// `None` when no remote-area column is configured.
    pub remote_area: Option<Outcome<usize>>,
}

impl SettledRowSet {
    /// Order columns followed by the derived settlement columns.
    pub fn output_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .cloned()
            .chain(SETTLED_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }

    /// Flatten into a plain row-set for dumps and CSV export.
    pub fn to_row_set(&self) -> RowSet {
        let mut out = RowSet::new(self.output_columns());
        for row in &self.rows {
            let mut cells = row.fields.clone();
            cells.resize(self.columns.len(), CellValue::Empty);
            cells.push(
                row.matched_catalog_key
                    .as_deref()
                    .map(CellValue::from)
                    .unwrap_or(CellValue::Empty),
            );
            cells.push(row.unit_sale_price.into());
            cells.push(row.unit_cost_price.into());
            cells.push(row.line_cost_total.into());
            cells.push(row.line_sale_total.into());
            cells.push(row.settlement_amount.into());
            cells.push(row.shipping_fee.into());
            cells.push(row.remote_area_fee.into());
            out.push_row(cells);
        }
        out
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

// ---------------------------------------------------------------------------
// Finance summary
// ---------------------------------------------------------------------------

/// Fixed header of the finance summary, in display order.
pub const FINANCE_COLUMNS: [&str; 7] = [
    "상품명",
    "옵션",
    "수량",
    "공구판매가",
    "공구판매가합계(vat포함)",
    "공급가(vat포함)",
    "정산금액(vat포함)",
];

/// Option label of the synthetic shipping row.
pub const SHIPPING_LABEL: &str = "배송비";
/// Option label of the synthetic remote-area surcharge row.
pub const REMOTE_AREA_LABEL: &str = "도서산간배송비";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceRowKind {
    Product,
    Shipping,
    RemoteArea,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceRow {
    pub kind: FinanceRowKind,
    pub product_label: String,
    pub option_label: String,
    pub quantity: i64,
    pub unit_sale_price: i64,
    pub sale_total: i64,
    pub unit_cost_price: i64,
    pub settlement_amount: i64,
}

impl FinanceRow {
    /// Cells in `FINANCE_COLUMNS` order.
    pub fn cells(&self) -> [CellValue; 7] {
        [
            CellValue::from(self.product_label.as_str()),
            CellValue::from(self.option_label.as_str()),
            self.quantity.into(),
            self.unit_sale_price.into(),
            self.sale_total.into(),
            self.unit_cost_price.into(),
            self.settlement_amount.into(),
        ]
    }
}

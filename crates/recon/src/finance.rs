//! Finance summary: one row per matched catalog key plus synthetic rows for
//! shipping and remote-area fees.

use std::collections::BTreeMap;

use crate::model::{
    FinanceRow, FinanceRowKind, SettledRow, SettledRowSet, REMOTE_AREA_LABEL, SHIPPING_LABEL,
};
use crate::settlement::prorate;

#[derive(Debug, Default)]
struct Group {
    unit_sale_price: f64,
    unit_cost_price: f64,
    quantity: f64,
    sale_total: f64,
}

impl Group {
    fn start(row: &SettledRow) -> Self {
        Self {
            unit_sale_price: row.unit_sale_price,
            unit_cost_price: row.unit_cost_price,
            ..Default::default()
        }
    }

    fn add(&mut self, row: &SettledRow, quantity: f64) {
        self.quantity += quantity;
        self.sale_total += row.line_sale_total;
    }

    fn into_row(self, product_label: &str, option_label: String) -> FinanceRow {
        // Prices are taken from the group's first row and not re-validated.
        let unit_cost_price = self.unit_cost_price.trunc() as i64;
        FinanceRow {
            kind: FinanceRowKind::Product,
            product_label: product_label.to_string(),
            option_label,
            quantity: self.quantity.trunc() as i64,
            unit_sale_price: self.unit_sale_price.trunc() as i64,
            sale_total: self.sale_total.round_ties_even() as i64,
            unit_cost_price,
            // Recomputed from the unit price, not summed from line totals.
            settlement_amount: (unit_cost_price as f64 * self.quantity).round_ties_even() as i64,
        }
    }
}

/// Summarize settled rows.
///
/// Groups are ordered by catalog key; unmatched rows form one trailing group
/// with an empty option label. `remote_area_fee_sale` overrides the sale-side
/// remote-area fee when positive; otherwise it is reverse-derived from the
/// average charged (seller-side) fee.
pub fn aggregate(
    settled: &SettledRowSet,
    product_label: &str,
    quantity_column: &str,
    shipping_fee_sale: Option<i64>,
    seller_ratio: i64,
    remote_area_fee_sale: Option<i64>,
) -> Vec<FinanceRow> {
    let ratio = seller_ratio.clamp(0, 100);
    let qty_idx = settled.column_index(quantity_column);
    let quantity_of = |row: &SettledRow| {
        qty_idx
            .and_then(|i| row.fields.get(i))
            .map_or(0.0, |c| c.number_or_zero())
    };

    let mut matched: BTreeMap<&str, Group> = BTreeMap::new();
    let mut unmatched: Option<Group> = None;
    for row in &settled.rows {
        let group = match row.matched_catalog_key.as_deref() {
            Some(key) => matched.entry(key).or_insert_with(|| Group::start(row)),
            None => unmatched.get_or_insert_with(|| Group::start(row)),
        };
        group.add(row, quantity_of(row));
    }

    let mut out: Vec<FinanceRow> = matched
        .into_iter()
        .map(|(key, g)| g.into_row(product_label, key.to_string()))
        .collect();
    if let Some(g) = unmatched {
        out.push(g.into_row(product_label, String::new()));
    }

    let shipped = settled.rows.iter().filter(|r| r.shipping_fee > 0).count() as i64;
    if shipped > 0 {
        let sale = shipping_fee_sale.unwrap_or(0);
        out.push(fee_row(
            FinanceRowKind::Shipping,
            product_label,
            SHIPPING_LABEL,
            shipped,
            sale,
            prorate(sale as f64, ratio),
        ));
    }

    let remote_fees: Vec<i64> = settled
        .rows
        .iter()
        .map(|r| r.remote_area_fee)
        .filter(|f| *f > 0)
        .collect();
    if !remote_fees.is_empty() {
        let sale = match remote_area_fee_sale {
            Some(fee) if fee > 0 => fee,
            _ => derive_remote_sale_fee(&remote_fees, ratio),
        };
        out.push(fee_row(
            FinanceRowKind::RemoteArea,
            product_label,
            REMOTE_AREA_LABEL,
            remote_fees.len() as i64,
            sale,
            prorate(sale as f64, ratio),
        ));
    }

    out
}

/// Sale-side fee from the average seller-side fee actually charged.
fn derive_remote_sale_fee(positive_fees: &[i64], ratio: i64) -> i64 {
    let avg = positive_fees.iter().sum::<i64>() as f64 / positive_fees.len() as f64;
    if ratio > 0 {
        (avg / (ratio as f64 / 100.0)).round_ties_even() as i64
    } else {
        avg.round_ties_even() as i64
    }
}

fn fee_row(
    kind: FinanceRowKind,
    product_label: &str,
    label: &str,
    count: i64,
    sale_unit: i64,
    cost_unit: i64,
) -> FinanceRow {
    FinanceRow {
        kind,
        product_label: product_label.to_string(),
        option_label: label.to_string(),
        quantity: count,
        unit_sale_price: sale_unit,
        sale_total: sale_unit * count,
        unit_cost_price: cost_unit,
        settlement_amount: cost_unit * count,
    }
}

/// Grand total of the settlement column.
pub fn settlement_total(rows: &[FinanceRow]) -> i64 {
    rows.iter().map(|r| r.settlement_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn row(key: Option<&str>, qty: f64, sale: f64, cost: f64) -> SettledRow {
        SettledRow {
            fields: vec![CellValue::Number(qty)],
            matched_catalog_key: key.map(str::to_string),
            unit_sale_price: sale,
            unit_cost_price: cost,
            line_cost_total: cost * qty,
            line_sale_total: sale * qty,
            settlement_amount: cost * qty,
            shipping_fee: 0,
            remote_area_fee: 0,
        }
    }

    fn set(rows: Vec<SettledRow>) -> SettledRowSet {
        SettledRowSet {
            columns: vec!["수량".into()],
            rows,
            ..Default::default()
        }
    }

    #[test]
    fn groups_by_catalog_key() {
        let s = set(vec![
            row(Some("B(1)"), 2.0, 1000.0, 800.0),
            row(Some("A(1)"), 1.0, 500.0, 400.0),
            row(Some("B(1)"), 3.0, 1000.0, 800.0),
        ]);
        let rows = aggregate(&s, "셀러X사과", "수량", None, 100, None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].option_label, "A(1)");
        assert_eq!(rows[1].option_label, "B(1)");
        assert_eq!(rows[1].quantity, 5);
        assert_eq!(rows[1].sale_total, 5000);
        assert_eq!(rows[1].settlement_amount, 4000);
        assert!(rows.iter().all(|r| r.product_label == "셀러X사과"));
    }

    #[test]
    fn settlement_is_unit_cost_times_total_quantity() {
        // Non-uniform pricing inside one group: the summary uses the first
        // row's unit cost, so it diverges from the sum of line totals.
        let s = set(vec![
            row(Some("A(1)"), 2.0, 1000.0, 700.0),
            row(Some("A(1)"), 3.0, 1000.0, 900.0),
        ]);
        let rows = aggregate(&s, "p", "수량", None, 100, None);
        let g = &rows[0];
        assert_eq!(g.unit_cost_price, 700);
        assert_eq!(g.quantity, 5);
        assert_eq!(g.settlement_amount, g.unit_cost_price * g.quantity);
        let line_sum: f64 = s.rows.iter().map(|r| r.line_cost_total).sum();
        assert_ne!(g.settlement_amount as f64, line_sum);
    }

    #[test]
    fn unmatched_rows_form_a_trailing_group() {
        let s = set(vec![
            row(None, 4.0, 0.0, 0.0),
            row(Some("A(1)"), 1.0, 500.0, 400.0),
        ]);
        let rows = aggregate(&s, "p", "수량", None, 100, None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].option_label, "");
        assert_eq!(rows[1].quantity, 4);
        assert_eq!(rows[1].settlement_amount, 0);
    }

    #[test]
    fn shipping_row_counts_charged_orders() {
        let mut a = row(Some("A(1)"), 1.0, 500.0, 400.0);
        a.shipping_fee = 1500;
        let b = row(Some("A(1)"), 1.0, 500.0, 400.0);
        let mut c = row(Some("A(1)"), 1.0, 500.0, 400.0);
        c.shipping_fee = 1500;
        let rows = aggregate(&set(vec![a, b, c]), "p", "수량", Some(3000), 50, None);
        let ship = rows.last().unwrap();
        assert_eq!(ship.kind, FinanceRowKind::Shipping);
        assert_eq!(ship.option_label, SHIPPING_LABEL);
        assert_eq!(ship.quantity, 2);
        assert_eq!(ship.unit_sale_price, 3000);
        assert_eq!(ship.sale_total, 6000);
        assert_eq!(ship.unit_cost_price, 1500);
        assert_eq!(ship.settlement_amount, 3000);
    }

    #[test]
    fn no_fee_rows_without_charges() {
        let rows = aggregate(
            &set(vec![row(Some("A(1)"), 1.0, 500.0, 400.0)]),
            "p",
            "수량",
            Some(3000),
            100,
            Some(5000),
        );
        assert!(rows.iter().all(|r| r.kind == FinanceRowKind::Product));
    }

    #[test]
    fn remote_area_override_is_used_directly() {
        let mut a = row(Some("A(1)"), 1.0, 500.0, 400.0);
        a.remote_area_fee = 2500;
        let rows = aggregate(&set(vec![a]), "p", "수량", None, 50, Some(5000));
        let remote = rows.last().unwrap();
        assert_eq!(remote.kind, FinanceRowKind::RemoteArea);
        assert_eq!(remote.unit_sale_price, 5000);
        assert_eq!(remote.unit_cost_price, 2500);
    }

    #[test]
    fn remote_area_sale_fee_is_reverse_derived() {
        let mut a = row(Some("A(1)"), 1.0, 500.0, 400.0);
        a.remote_area_fee = 1500;
        let mut b = row(Some("A(1)"), 1.0, 500.0, 400.0);
        b.remote_area_fee = 2500;
        let rows = aggregate(&set(vec![a, b]), "p", "수량", None, 50, Some(0));
        let remote = rows.last().unwrap();
        assert_eq!(remote.quantity, 2);
        assert_eq!(remote.unit_sale_price, 4000);
        assert_eq!(remote.sale_total, 8000);
        assert_eq!(remote.unit_cost_price, 2000);
        assert_eq!(remote.settlement_amount, 4000);
    }

    #[test]
    fn total_sums_every_row() {
        let mut a = row(Some("A(1)"), 2.0, 500.0, 400.0);
        a.shipping_fee = 3000;
        let rows = aggregate(&set(vec![a]), "p", "수량", Some(3000), 100, None);
        assert_eq!(settlement_total(&rows), 800 + 3000);
    }
}

//! Settlement: join order rows to the catalog through the confirmed match
//! table, price every line, and apply order-level shipping and remote-area
//! fees.
//!
//! Fees are charged at most once per order (the first row of each order id in
//! source order), except remote-area fees in raw mode, which are recorded per
//! row. A fee column that cannot be computed degrades to zeros and is reported
//! as `Outcome::Skipped`; settlement itself never fails.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::{RemoteAreaMode, SettleOptions};
use crate::keys::KeyColumns;
use crate::model::{
    DataWarning, Outcome, RowSet, SettledRow, SettledRowSet, CATALOG_COST_PRICE_FIELD,
    CATALOG_SALE_PRICE_FIELD,
};
use crate::registry::MatchPair;

/// Settle every order row. Unmatched rows are kept with zero amounts.
pub fn settle(
    orders: &RowSet,
    catalog: &RowSet,
    match_table: &[MatchPair],
    options: &SettleOptions,
) -> SettledRowSet {
    let columns = &options.columns;
    let mut warnings = Vec::new();

    // 1) order key -> matched catalog key
    let order_keys: Vec<String> =
        match KeyColumns::resolve(orders, &columns.product, columns.option.as_deref()) {
            Some(key_cols) => orders.rows.iter().map(|r| key_cols.key_of(r)).collect(),
            None => {
                log::warn!("order column '{}' not found; no row can match", columns.product);
                vec![String::new(); orders.len()]
            }
        };
    let targets: HashMap<&str, &str> = match_table
        .iter()
        .map(|p| (p.order_key.as_str(), p.catalog_key.as_str()))
        .collect();

    // 2) catalog key -> first catalog row
    let catalog_index = index_catalog(catalog, &mut warnings);
    let sale_idx = catalog.column_index(CATALOG_SALE_PRICE_FIELD);
    let cost_idx = catalog.column_index(CATALOG_COST_PRICE_FIELD);
    let price = |row: Option<usize>, col: Option<usize>| match (row, col) {
        (Some(r), Some(c)) => catalog.cell(r, c).number_or_zero(),
        _ => 0.0,
    };

    // 3) per-line amounts
    let qty_idx = orders.column_index(&columns.quantity);
    let mut rows: Vec<SettledRow> = Vec::with_capacity(orders.len());
    for (i, fields) in orders.rows.iter().enumerate() {
        let matched = targets.get(order_keys[i].as_str()).map(|k| k.to_string());
        let catalog_row = matched
            .as_deref()
            .and_then(|k| catalog_index.get(k).copied());
        let unit_sale_price = price(catalog_row, sale_idx);
        let unit_cost_price = price(catalog_row, cost_idx);
        let quantity = qty_idx.map_or(0.0, |c| orders.cell(i, c).number_or_zero());
        let line_cost_total = unit_cost_price * quantity;

        rows.push(SettledRow {
            fields: fields.clone(),
            matched_catalog_key: matched,
            unit_sale_price,
            unit_cost_price,
            line_cost_total,
            line_sale_total: unit_sale_price * quantity,
            settlement_amount: line_cost_total,
            shipping_fee: 0,
            remote_area_fee: 0,
        });
    }

    // 4) shipping, 5) remote-area surcharge
    let sale_prices: Vec<f64> = rows.iter().map(|r| r.unit_sale_price).collect();
    let shipping = shipping_fees(orders, &sale_prices, options)
        .map(|outcome| apply_fees(outcome, &mut rows, "shipping", |r, fee| r.shipping_fee = fee));
    let remote_area = remote_area_fees(orders, options).map(|outcome| {
        apply_fees(outcome, &mut rows, "remote-area", |r, fee| r.remote_area_fee = fee)
    });

    let matched = rows.iter().filter(|r| r.matched_catalog_key.is_some()).count();
    log::info!("settled {} order rows, {matched} matched", rows.len());

    SettledRowSet {
        columns: orders.columns.clone(),
        rows,
        warnings,
        shipping,
        remote_area,
    }
}

/// `round(amount * ratio / 100)`, half to even.
pub fn prorate(amount: f64, ratio: i64) -> i64 {
    (amount * ratio as f64 / 100.0).round_ties_even() as i64
}

fn index_catalog(catalog: &RowSet, warnings: &mut Vec<DataWarning>) -> HashMap<String, usize> {
    let Some(key_cols) = KeyColumns::catalog(catalog) else {
        if !catalog.is_empty() {
            log::warn!("{}", DataWarning::CatalogKeyColumnsMissing);
            warnings.push(DataWarning::CatalogKeyColumnsMissing);
        }
        return HashMap::new();
    };

    let mut index = HashMap::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (i, row) in catalog.rows.iter().enumerate() {
        let key = key_cols.key_of(row);
        *counts.entry(key.clone()).or_default() += 1;
        index.entry(key).or_insert(i);
    }

    for (key, rows) in counts.into_iter().filter(|(_, n)| *n > 1) {
        let warning = DataWarning::DuplicateCatalogKey { key, rows };
        log::warn!("{warning}");
        warnings.push(warning);
    }
    index
}

fn apply_fees(
    outcome: Outcome<Vec<i64>>,
    rows: &mut [SettledRow],
    what: &str,
    set: impl Fn(&mut SettledRow, i64),
) -> Outcome<usize> {
    match outcome {
        Outcome::Applied(fees) => {
            let mut charged = 0;
            for (row, fee) in rows.iter_mut().zip(fees) {
                if fee > 0 {
                    charged += 1;
                }
                set(row, fee);
            }
            log::debug!("{what} fee charged on {charged} rows");
            Outcome::Applied(charged)
        }
        Outcome::Skipped { reason } => {
            log::warn!("{what} fee skipped: {reason}");
            Outcome::Skipped { reason }
        }
    }
}

/// Trimmed order id per row; blank ids belong to no order.
fn order_ids(orders: &RowSet, order_idx: usize) -> Vec<Option<String>> {
    (0..orders.len())
        .map(|i| Some(orders.cell(i, order_idx).trimmed()).filter(|id| !id.is_empty()))
        .collect()
}

/// Whether each row is the first row of its order, in source order.
fn first_of_order(ids: &[Option<String>]) -> Vec<bool> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.as_deref().is_some_and(|id| seen.insert(id)))
        .collect()
}

fn shipping_fees(
    orders: &RowSet,
    sale_prices: &[f64],
    options: &SettleOptions,
) -> Option<Outcome<Vec<i64>>> {
    let shipping = options.shipping.as_ref()?;
    let order_column = &options.columns.order_id;
    let Some(order_idx) = orders.column_index(order_column) else {
        return Some(Outcome::skipped(format!("order id column '{order_column}' not found")));
    };

    let ids = order_ids(orders, order_idx);

    // Unweighted: the raw per-line sale price, summed over the order's lines.
    let mut order_sums: HashMap<&str, f64> = HashMap::new();
    for (id, sale) in ids.iter().zip(sale_prices) {
        if let Some(id) = id {
            *order_sums.entry(id.as_str()).or_default() += sale;
        }
    }

    let fee = prorate(shipping.fee as f64, options.ratio());
    let threshold = shipping.condition_amount as f64;
    let fees = ids
        .iter()
        .zip(first_of_order(&ids))
        .map(|(id, first)| match id {
            Some(id) if first && order_sums.get(id.as_str()).is_some_and(|s| *s < threshold) => fee,
            _ => 0,
        })
        .collect();
    Some(Outcome::Applied(fees))
}

fn remote_area_fees(orders: &RowSet, options: &SettleOptions) -> Option<Outcome<Vec<i64>>> {
    let remote = options.remote_area.as_ref()?;
    let Some(col) = orders.column_index(&remote.column) else {
        return Some(Outcome::skipped(format!(
            "remote-area column '{}' not found",
            remote.column
        )));
    };
    let ratio = options.ratio();

    match remote.mode {
        RemoteAreaMode::Raw => {
            let fees = (0..orders.len())
                .map(|i| {
                    orders
                        .cell(i, col)
                        .as_number()
                        .map_or(0, |amount| prorate(amount, ratio))
                })
                .collect();
            Some(Outcome::Applied(fees))
        }
        RemoteAreaMode::Flag => {
            let order_column = &options.columns.order_id;
            let Some(order_idx) = orders.column_index(order_column) else {
                return Some(Outcome::skipped(format!(
                    "order id column '{order_column}' not found"
                )));
            };
            let Some(marker) = remote.flag_text.as_deref().filter(|t| !t.is_empty()) else {
                return Some(Outcome::skipped("no flag text configured"));
            };
            let Some(fee) = remote.fee else {
                return Some(Outcome::skipped("no remote-area fee configured"));
            };

            let fee = prorate(fee as f64, ratio);
            let ids = order_ids(orders, order_idx);
            let fees = first_of_order(&ids)
                .into_iter()
                .enumerate()
                .map(|(i, first)| {
                    if first && orders.cell(i, col).display().contains(marker) {
                        fee
                    } else {
                        0
                    }
                })
                .collect();
            Some(Outcome::Applied(fees))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRoles, RemoteAreaConfig, ShippingConfig};
    use crate::model::CellValue;

    fn catalog() -> RowSet {
        let mut rs = RowSet::new(
            ["NO", "상품명", "구성", "공구판매가", "공급가(vat포함)"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let rows: [(&str, &str, f64, f64); 3] = [
            ("X", "1개", 10000.0, 8000.0),
            ("Y", "1개", 5000.0, 4000.0),
            ("Z", "1개", 30000.0, 25000.0),
        ];
        for (i, (name, comp, sale, cost)) in rows.iter().enumerate() {
            rs.push_row(vec![
                CellValue::Number((i + 1) as f64),
                CellValue::text(*name),
                CellValue::text(*comp),
                CellValue::Number(*sale),
                CellValue::Number(*cost),
            ]);
        }
        rs
    }

    /// Rows of `(order id, product, qty, remote marker)`.
    fn orders(rows: &[(&str, &str, &str, &str)]) -> RowSet {
        let mut rs = RowSet::new(
            ["주문번호", "상품", "수량", "도서산간"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for (id, item, qty, remote) in rows {
            rs.push_row(vec![
                CellValue::from(*id),
                CellValue::from(*item),
                CellValue::from(*qty),
                CellValue::from(*remote),
            ]);
        }
        rs
    }

    fn table() -> Vec<MatchPair> {
        ["X", "Y", "Z"]
            .iter()
            .map(|k| MatchPair {
                order_key: k.to_string(),
                catalog_key: format!("{k}(1개)"),
            })
            .collect()
    }

    fn options() -> SettleOptions {
        SettleOptions::new(ColumnRoles {
            product: "상품".into(),
            option: None,
            quantity: "수량".into(),
            order_id: "주문번호".into(),
        })
    }

    fn with_shipping(fee: i64, condition_amount: i64, ratio: i64) -> SettleOptions {
        let mut o = options();
        o.seller_ratio = ratio;
        o.shipping = Some(ShippingConfig {
            fee,
            condition_amount,
        });
        o
    }

    fn with_remote(mode: RemoteAreaMode, fee: Option<i64>, ratio: i64) -> SettleOptions {
        let mut o = options();
        o.seller_ratio = ratio;
        o.remote_area = Some(RemoteAreaConfig {
            column: "도서산간".into(),
            mode,
            flag_text: Some("도서".into()),
            fee,
        });
        o
    }

    #[test]
    fn line_amounts_follow_catalog_prices() {
        let out = settle(&orders(&[("A", "X", "2", "")]), &catalog(), &table(), &options());
        let row = &out.rows[0];
        assert_eq!(row.matched_catalog_key.as_deref(), Some("X(1개)"));
        assert_eq!(row.unit_sale_price, 10000.0);
        assert_eq!(row.unit_cost_price, 8000.0);
        assert_eq!(row.line_sale_total, 20000.0);
        assert_eq!(row.line_cost_total, 16000.0);
        assert_eq!(row.settlement_amount, row.line_cost_total);
        assert!(out.shipping.is_none());
        assert!(out.remote_area.is_none());
    }

    #[test]
    fn unmatched_rows_are_kept_with_zero_amounts() {
        let out = settle(
            &orders(&[("A", "X", "1", ""), ("A", "W", "3", "")]),
            &catalog(),
            &table(),
            &options(),
        );
        assert_eq!(out.rows.len(), 2);
        let row = &out.rows[1];
        assert_eq!(row.matched_catalog_key, None);
        assert_eq!(row.unit_sale_price, 0.0);
        assert_eq!(row.line_cost_total, 0.0);
    }

    #[test]
    fn non_numeric_quantity_is_zero() {
        let out = settle(&orders(&[("A", "X", "두개", "")]), &catalog(), &table(), &options());
        assert_eq!(out.rows[0].line_sale_total, 0.0);
    }

    #[test]
    fn matched_keys_come_from_the_match_table() {
        let table = table();
        let out = settle(
            &orders(&[("A", "X", "1", ""), ("B", "Q", "1", ""), ("C", "Z", "1", "")]),
            &catalog(),
            &table,
            &options(),
        );
        for row in &out.rows {
            if let Some(ref key) = row.matched_catalog_key {
                assert!(table.iter().any(|p| &p.catalog_key == key));
            }
        }
    }

    #[test]
    fn target_missing_from_catalog_keeps_key_with_zero_price() {
        let table = vec![MatchPair {
            order_key: "X".into(),
            catalog_key: "X(2개)".into(),
        }];
        let out = settle(&orders(&[("A", "X", "1", "")]), &catalog(), &table, &options());
        assert_eq!(out.rows[0].matched_catalog_key.as_deref(), Some("X(2개)"));
        assert_eq!(out.rows[0].unit_cost_price, 0.0);
    }

    #[test]
    fn duplicate_catalog_keys_use_first_row_and_warn() {
        let mut cat = catalog();
        cat.push_row(vec![
            CellValue::Number(4.0),
            CellValue::text("X"),
            CellValue::text("1개"),
            CellValue::Number(99999.0),
            CellValue::Number(99999.0),
        ]);
        let out = settle(&orders(&[("A", "X", "1", "")]), &cat, &table(), &options());
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].unit_sale_price, 10000.0);
        assert_eq!(
            out.warnings,
            vec![DataWarning::DuplicateCatalogKey {
                key: "X(1개)".into(),
                rows: 2
            }]
        );
    }

    #[test]
    fn shipping_charged_on_first_row_below_threshold() {
        let out = settle(
            &orders(&[("A", "X", "2", ""), ("A", "Y", "1", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        assert_eq!(out.rows[0].shipping_fee, 3000);
        assert_eq!(out.rows[1].shipping_fee, 0);
        assert_eq!(out.shipping, Some(Outcome::Applied(1)));
    }

    #[test]
    fn shipping_uses_unweighted_sale_sum() {
        // 10000 * 3 units would clear the threshold; the unweighted sum does not.
        let out = settle(
            &orders(&[("A", "X", "3", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        assert_eq!(out.rows[0].shipping_fee, 3000);
    }

    #[test]
    fn shipping_not_charged_at_threshold() {
        let out = settle(
            &orders(&[("A", "X", "1", ""), ("A", "X", "1", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        assert!(out.rows.iter().all(|r| r.shipping_fee == 0));
    }

    #[test]
    fn shipping_at_most_once_per_order() {
        let out = settle(
            &orders(&[
                ("A", "X", "1", ""),
                ("B", "Y", "1", ""),
                ("A", "Y", "1", ""),
                ("B", "Y", "1", ""),
                ("C", "Z", "1", ""),
            ]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        let fees: Vec<i64> = out.rows.iter().map(|r| r.shipping_fee).collect();
        assert_eq!(fees, vec![3000, 3000, 0, 0, 0]);
    }

    #[test]
    fn shipping_prorated_by_seller_ratio() {
        let out = settle(
            &orders(&[("A", "Y", "1", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 33),
        );
        assert_eq!(out.rows[0].shipping_fee, 990);
    }

    #[test]
    fn shipping_skipped_without_order_column() {
        let mut opts = with_shipping(3000, 20000, 100);
        opts.columns.order_id = "없는열".into();
        let out = settle(&orders(&[("A", "Y", "1", "")]), &catalog(), &table(), &opts);
        assert!(matches!(out.shipping, Some(Outcome::Skipped { .. })));
        assert_eq!(out.rows[0].shipping_fee, 0);
    }

    #[test]
    fn padded_order_ids_group_as_one_order() {
        let out = settle(
            &orders(&[("A ", "Y", "1", ""), (" A", "Y", "1", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        let fees: Vec<i64> = out.rows.iter().map(|r| r.shipping_fee).collect();
        assert_eq!(fees, vec![3000, 0]);
    }

    #[test]
    fn blank_order_ids_never_pay_shipping() {
        let out = settle(
            &orders(&[("", "Y", "1", "")]),
            &catalog(),
            &table(),
            &with_shipping(3000, 20000, 100),
        );
        assert_eq!(out.rows[0].shipping_fee, 0);
    }

    #[test]
    fn flag_mode_charges_first_flagged_row_only() {
        let out = settle(
            &orders(&[("B", "X", "1", "도서산간"), ("B", "Y", "1", "도서산간")]),
            &catalog(),
            &table(),
            &with_remote(RemoteAreaMode::Flag, Some(1000), 50),
        );
        assert_eq!(out.rows[0].remote_area_fee, 500);
        assert_eq!(out.rows[1].remote_area_fee, 0);
    }

    #[test]
    fn flag_mode_ignores_flags_after_first_row() {
        let out = settle(
            &orders(&[("B", "X", "1", ""), ("B", "Y", "1", "도서산간")]),
            &catalog(),
            &table(),
            &with_remote(RemoteAreaMode::Flag, Some(1000), 50),
        );
        assert!(out.rows.iter().all(|r| r.remote_area_fee == 0));
        assert_eq!(out.remote_area, Some(Outcome::Applied(0)));
    }

    #[test]
    fn flag_mode_without_fee_is_skipped() {
        let out = settle(
            &orders(&[("B", "X", "1", "도서산간")]),
            &catalog(),
            &table(),
            &with_remote(RemoteAreaMode::Flag, None, 100),
        );
        assert!(matches!(out.remote_area, Some(Outcome::Skipped { .. })));
        assert_eq!(out.rows[0].remote_area_fee, 0);
    }

    #[test]
    fn raw_mode_charges_every_row_with_a_value() {
        let out = settle(
            &orders(&[("C", "X", "1", "3000"), ("C", "Y", "1", "3000"), ("D", "Y", "1", "")]),
            &catalog(),
            &table(),
            &with_remote(RemoteAreaMode::Raw, None, 50),
        );
        let fees: Vec<i64> = out.rows.iter().map(|r| r.remote_area_fee).collect();
        assert_eq!(fees, vec![1500, 1500, 0]);
    }

    #[test]
    fn missing_remote_column_degrades_to_zero() {
        let mut opts = with_remote(RemoteAreaMode::Raw, None, 100);
        if let Some(ref mut r) = opts.remote_area {
            r.column = "없는열".into();
        }
        let out = settle(&orders(&[("C", "X", "1", "3000")]), &catalog(), &table(), &opts);
        assert!(matches!(out.remote_area, Some(Outcome::Skipped { .. })));
        assert_eq!(out.rows[0].remote_area_fee, 0);
    }

    #[test]
    fn prorate_rounds_half_to_even() {
        assert_eq!(prorate(25.0, 10), 2);
        assert_eq!(prorate(35.0, 10), 4);
        assert_eq!(prorate(3000.0, 100), 3000);
    }

    #[test]
    fn output_columns_extend_order_columns() {
        let out = settle(&orders(&[("A", "X", "1", "")]), &catalog(), &table(), &options());
        let cols = out.output_columns();
        assert_eq!(cols[..4], ["주문번호", "상품", "수량", "도서산간"]);
        assert_eq!(cols.len(), 12);
        assert_eq!(cols[4], "매칭상품");
        assert_eq!(cols[9], "정산금액(vat포함)");
    }
}

//! One reconciliation session: loaded data, the confirmed mapping, and the
//! results derived from them.
//!
//! The session owns the only state that lives across pipeline steps. Saving
//! a mapping replaces the previous one and invalidates derived results;
//! `reset` clears the mapping and every derived result at once.

use crate::config::SettleOptions;
use crate::error::ReconError;
use crate::finance;
use crate::keys::{self, KeyColumns};
use crate::model::{FinanceRow, RowSet, SettledRowSet};
use crate::registry::{self, Mapping, MatchRegistry};
use crate::settlement;
use crate::suggest;

#[derive(Debug)]
pub struct ReconSession {
    options: SettleOptions,
    orders: RowSet,
    catalog: RowSet,
    registry: MatchRegistry,
    settled: Option<SettledRowSet>,
    summary: Option<Vec<FinanceRow>>,
}

impl ReconSession {
    /// Start a session. Fails when there are no order rows or a configured
    /// order column is missing.
    pub fn new(options: SettleOptions, orders: RowSet, catalog: RowSet) -> Result<Self, ReconError> {
        if orders.is_empty() {
            return Err(ReconError::NoOrderData);
        }
        options.validate()?;
        options.ensure_columns(&orders)?;
        if catalog.is_empty() {
            log::warn!("catalog is empty; every order row will be unmatched");
        }

        Ok(Self {
            options,
            orders,
            catalog,
            registry: MatchRegistry::new(),
            settled: None,
            summary: None,
        })
    }

    pub fn options(&self) -> &SettleOptions {
        &self.options
    }

    pub fn orders(&self) -> &RowSet {
        &self.orders
    }

    pub fn catalog(&self) -> &RowSet {
        &self.catalog
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.registry
    }

    /// Sorted distinct order keys.
    pub fn order_keys(&self) -> Vec<String> {
        let c = &self.options.columns;
        KeyColumns::resolve(&self.orders, &c.product, c.option.as_deref())
            .map(|cols| keys::unique_keys(&self.orders, cols))
            .unwrap_or_default()
    }

    /// Sorted distinct catalog keys.
    pub fn catalog_keys(&self) -> Vec<String> {
        keys::catalog_keys(&self.catalog)
    }

    /// Mapping template prefilled with suggestions.
    pub fn suggest_mapping(&self) -> Mapping {
        suggest::suggest_mapping(&self.order_keys(), &self.catalog_keys())
    }

    /// Replace the confirmed mapping. Returns the number of matched order keys.
    ///
    /// Rejects targets that are not catalog keys and catalog keys selected
    /// more than once; the previous mapping stays in place on rejection.
    pub fn save_mapping(&mut self, mapping: Mapping) -> Result<usize, ReconError> {
        let mapping = registry::normalize(mapping);
        let catalog_keys = self.catalog_keys();
        let unknown = mapping
            .values()
            .flatten()
            .find(|t| catalog_keys.binary_search(*t).is_err());
        if let Some(target) = unknown {
            return Err(ReconError::UnknownCatalogKey(target.clone()));
        }

        let matched = self.registry.save(mapping)?.len();
        self.settled = None;
        self.summary = None;
        Ok(matched)
    }

    /// Run settlement against the current match table.
    pub fn settle(&mut self) -> &SettledRowSet {
        self.summary = None;
        let settled = settlement::settle(
            &self.orders,
            &self.catalog,
            self.registry.match_table(),
            &self.options,
        );
        self.settled.insert(settled)
    }

    /// Finance summary, settling first when needed.
    pub fn summarize(&mut self, product_label: &str) -> &[FinanceRow] {
        self.results(product_label).1
    }

    /// Settled rows and their finance summary.
    pub fn results(&mut self, product_label: &str) -> (&SettledRowSet, &[FinanceRow]) {
        let settled: &SettledRowSet = self.settled.get_or_insert_with(|| {
            settlement::settle(
                &self.orders,
                &self.catalog,
                self.registry.match_table(),
                &self.options,
            )
        });
        let rows = finance::aggregate(
            settled,
            product_label,
            &self.options.columns.quantity,
            self.options.shipping.as_ref().map(|s| s.fee),
            self.options.ratio(),
            self.options.remote_area.as_ref().and_then(|r| r.fee),
        );
        (settled, self.summary.insert(rows).as_slice())
    }

    pub fn settled(&self) -> Option<&SettledRowSet> {
        self.settled.as_ref()
    }

    pub fn summary(&self) -> Option<&[FinanceRow]> {
        self.summary.as_deref()
    }

    /// Clear the mapping and all derived results.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.settled = None;
        self.summary = None;
        log::debug!("session reset");
    }
}
